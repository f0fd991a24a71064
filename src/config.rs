//! Stream options: chunk sizing, pool depth, seeding, worker threads.

use crate::error::{ReaderError, Result};

/// Reader configuration.
#[derive(Clone, Debug)]
pub struct StreamOptions {
    chunk_capacity: usize,
    buffer_count: usize,
    eager_init: bool,
    threads: Option<usize>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            chunk_capacity: 64 * 1024,
            buffer_count: 16,
            eager_init: true,
            threads: None,
        }
    }
}

impl StreamOptions {
    /// Bytes translated per chunk (one chunk per buffer per cycle).
    pub fn chunk_capacity(mut self, n: usize) -> Self {
        self.chunk_capacity = n;
        self
    }
    /// Pool depth, which is also the number of chunks per cycle.
    pub fn buffer_count(mut self, n: usize) -> Self {
        self.buffer_count = n;
        self
    }
    /// Read the first `k-1` bytes at construction (default: true).
    pub fn eager_init(mut self, yes: bool) -> Self {
        self.eager_init = yes;
        self
    }
    /// Run translation on a dedicated pool of `n` threads instead of the
    /// global rayon pool.
    pub fn threads(mut self, n: usize) -> Self {
        self.threads = Some(n);
        self
    }

    pub fn buffer_count_value(&self) -> usize {
        self.buffer_count
    }
    pub fn is_eager(&self) -> bool {
        self.eager_init
    }
    pub(crate) fn thread_count(&self) -> Option<usize> {
        self.threads
    }

    /// Chunk capacity after validation, floor-raised to `k-1`.
    pub(crate) fn effective_chunk(&self, k: usize) -> usize {
        let floor = k.saturating_sub(1);
        if self.chunk_capacity < floor {
            log::warn!(
                "chunk capacity {} raised to k-1 = {}",
                self.chunk_capacity,
                floor
            );
            floor
        } else {
            self.chunk_capacity
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.chunk_capacity == 0 {
            return Err(ReaderError::Config("chunk capacity must be at least 1".into()));
        }
        if self.buffer_count == 0 {
            return Err(ReaderError::Config("buffer count must be at least 1".into()));
        }
        if self.threads == Some(0) {
            return Err(ReaderError::Config("thread count must be at least 1".into()));
        }
        Ok(())
    }
}
