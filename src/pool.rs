//! Fixed pool of packed k-mer buffers cycling free -> used -> borrowed.
//!
//! Buffers move by value, so a buffer is always in exactly one place and
//! cannot be recycled twice. Both queues are rings sized to the pool at
//! construction and never grow.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{ReaderError, Result};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Fixed-capacity array of packed k-mers with a consumption cursor.
///
/// Invariant: `cursor <= size <= capacity`.
#[derive(Debug)]
pub struct KmerBuffer {
    owner: u64,
    data: Box<[u64]>,
    size: usize,
    cursor: usize,
}

impl KmerBuffer {
    fn new(owner: u64, capacity: usize) -> Self {
        Self {
            owner,
            data: vec![0u64; capacity].into_boxed_slice(),
            size: 0,
            cursor: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Valid entries written by the translator.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Entries already consumed.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Unconsumed k-mers, `[cursor, size)`.
    pub fn kmers(&self) -> &[u64] {
        &self.data[self.cursor..self.size]
    }

    /// Mark `n` more entries as consumed (clamped to `size`).
    pub fn consume(&mut self, n: usize) {
        self.cursor = (self.cursor + n).min(self.size);
    }

    pub fn is_drained(&self) -> bool {
        self.cursor == self.size
    }

    /// Copy as many unconsumed k-mers as fit into `dest`; advances the cursor.
    pub(crate) fn drain_into(&mut self, dest: &mut [u64]) -> usize {
        let n = dest.len().min(self.size - self.cursor);
        dest[..n].copy_from_slice(&self.data[self.cursor..self.cursor + n]);
        self.cursor += n;
        n
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [u64] {
        &mut self.data
    }

    pub(crate) fn set_filled(&mut self, size: usize) {
        debug_assert!(size <= self.data.len());
        self.size = size;
        self.cursor = 0;
    }

    fn reset(&mut self) {
        self.size = 0;
        self.cursor = 0;
    }
}

/// Snapshot of where the pool's buffers currently are.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolCounts {
    pub free: usize,
    pub used: usize,
    pub borrowed: usize,
}

impl PoolCounts {
    pub fn total(&self) -> usize {
        self.free + self.used + self.borrowed
    }
}

pub(crate) struct BufferPool {
    id: u64,
    count: usize,
    free: VecDeque<KmerBuffer>,
    used: VecDeque<KmerBuffer>,
    borrowed: usize,
}

impl BufferPool {
    pub fn new(count: usize, capacity: usize) -> Self {
        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
        let mut free = VecDeque::with_capacity(count);
        for _ in 0..count {
            free.push_back(KmerBuffer::new(id, capacity));
        }
        Self {
            id,
            count,
            free,
            used: VecDeque::with_capacity(count),
            borrowed: 0,
        }
    }

    pub fn counts(&self) -> PoolCounts {
        PoolCounts {
            free: self.free.len(),
            used: self.used.len(),
            borrowed: self.borrowed,
        }
    }

    pub fn has_used(&self) -> bool {
        !self.used.is_empty()
    }

    /// Move `n` free buffers into `out` for a fill cycle.
    pub fn take_free(&mut self, n: usize, out: &mut Vec<KmerBuffer>) -> Result<()> {
        if self.free.len() < n {
            return Err(ReaderError::PoolExhausted {
                needed: n,
                free: self.free.len(),
            });
        }
        out.extend(self.free.drain(..n));
        Ok(())
    }

    /// Queue filled buffers in order.
    pub fn push_used(&mut self, filled: impl IntoIterator<Item = KmerBuffer>) {
        self.used.extend(filled);
        debug_assert!(self.free.len() + self.used.len() + self.borrowed <= self.count);
    }

    /// Give back buffers taken by [`take_free`](Self::take_free) unfilled.
    pub fn restore_free(&mut self, bufs: impl IntoIterator<Item = KmerBuffer>) {
        for mut buf in bufs {
            buf.reset();
            self.free.push_back(buf);
        }
    }

    /// Hand out the oldest filled buffer.
    pub fn pop_used(&mut self) -> Option<KmerBuffer> {
        let buf = self.used.pop_front()?;
        self.borrowed += 1;
        Some(buf)
    }

    /// Put a partially consumed buffer back at the head of the used queue.
    pub fn requeue(&mut self, buf: KmerBuffer) {
        debug_assert_eq!(buf.owner, self.id);
        self.borrowed -= 1;
        self.used.push_front(buf);
    }

    /// Return a borrowed buffer to the free queue.
    pub fn recycle(&mut self, mut buf: KmerBuffer) -> Result<()> {
        if buf.owner != self.id || self.borrowed == 0 {
            return Err(ReaderError::ForeignBuffer);
        }
        buf.reset();
        self.borrowed -= 1;
        self.free.push_back(buf);
        debug_assert_eq!(self.counts().total(), self.count);
        Ok(())
    }
}
