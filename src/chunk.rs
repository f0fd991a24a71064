//! Overlap-preserving chunk ingestion and the read-ahead worker.
//!
//! Scratch layout after a fill: `[tail (k-1) | new bytes (n)]`. The tail is
//! the last `k-1` bytes of the previous scratch, so windows spanning a read
//! boundary are rebuilt exactly once.

use std::io;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};

use crate::error::{ReaderError, Result};
use crate::source::{CharSource, read_full};

/// Pulls bytes from a source into a caller-owned scratch region.
pub struct ChunkReader<S> {
    source: S,
    tail: Vec<u8>,
    remaining: u64,
    finished: bool,
}

impl<S: CharSource> ChunkReader<S> {
    /// `overlap` is `k-1`; `declared_len` bounds every read from `source`.
    pub fn new(source: S, overlap: usize, declared_len: u64) -> Self {
        Self {
            source,
            tail: vec![0u8; overlap],
            remaining: declared_len,
            finished: false,
        }
    }

    /// Read the first `k-1` bytes into the tail.
    pub fn seed(&mut self) -> io::Result<usize> {
        let want = (self.tail.len() as u64).min(self.remaining) as usize;
        let got = read_full(&mut self.source, &mut self.tail[..want])?;
        self.remaining -= got as u64;
        Ok(got)
    }

    pub fn overlap(&self) -> usize {
        self.tail.len()
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Fill `scratch` (tail first) and return the number of new bytes.
    ///
    /// Zero means the declared length is exhausted or the source ended.
    pub fn fill_scratch(&mut self, scratch: &mut [u8]) -> io::Result<usize> {
        let overlap = self.tail.len();
        debug_assert!(scratch.len() >= overlap);
        scratch[..overlap].copy_from_slice(&self.tail);

        let room = (scratch.len() - overlap) as u64;
        let want = room.min(self.remaining) as usize;
        let read = read_full(&mut self.source, &mut scratch[overlap..overlap + want])?;
        self.remaining -= read as u64;

        if read == 0 {
            self.finished = true;
            return Ok(0);
        }

        // New tail: the last `overlap` bytes of tail+new.
        let end = overlap + read;
        self.tail.copy_from_slice(&scratch[end - overlap..end]);
        Ok(read)
    }
}

/// Result of one background fill: the scratch comes back with the count.
pub(crate) struct ScratchFill {
    pub scratch: Vec<u8>,
    pub read: io::Result<usize>,
}

/// One dedicated I/O thread running [`ChunkReader::fill_scratch`] on request.
///
/// The scratch buffer travels with each request and returns with the
/// result, so at most one read is ever in flight.
pub(crate) struct ReadAhead {
    requests: Option<Sender<Vec<u8>>>,
    results: Receiver<ScratchFill>,
    pending: bool,
    handle: Option<JoinHandle<()>>,
}

impl ReadAhead {
    pub fn spawn<S: CharSource>(mut chunk: ChunkReader<S>) -> Result<Self> {
        let (req_tx, req_rx) = bounded::<Vec<u8>>(1);
        let (res_tx, res_rx) = bounded::<ScratchFill>(1);

        let handle = thread::Builder::new()
            .name("kmer-read-ahead".into())
            .spawn(move || {
                while let Ok(mut scratch) = req_rx.recv() {
                    let read = chunk.fill_scratch(&mut scratch);
                    log::trace!("read-ahead filled {:?} bytes", read.as_ref().ok());
                    if res_tx.send(ScratchFill { scratch, read }).is_err() {
                        break;
                    }
                }
                // Dropping the chunk reader drops the source.
            })?;

        Ok(Self {
            requests: Some(req_tx),
            results: res_rx,
            pending: false,
            handle: Some(handle),
        })
    }

    /// Hand `scratch` over for the next fill. Returns it back if a fill is
    /// already pending, in which case that one is reused.
    pub fn request(&mut self, scratch: Vec<u8>) -> Result<Option<Vec<u8>>> {
        if self.pending {
            return Ok(Some(scratch));
        }
        let tx = self.requests.as_ref().ok_or(ReaderError::Closed)?;
        tx.send(scratch).map_err(|_| ReaderError::ReadAheadLost)?;
        self.pending = true;
        Ok(None)
    }

    /// Block until the pending fill completes.
    pub fn wait(&mut self) -> Result<ScratchFill> {
        debug_assert!(self.pending, "wait without a pending read");
        let fill = self.results.recv().map_err(|_| ReaderError::ReadAheadLost)?;
        self.pending = false;
        Ok(fill)
    }

    /// Take the pending fill if it has already completed.
    pub fn try_wait(&mut self) -> Result<Option<ScratchFill>> {
        if !self.pending {
            return Ok(None);
        }
        match self.results.try_recv() {
            Ok(fill) => {
                self.pending = false;
                Ok(Some(fill))
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(ReaderError::ReadAheadLost),
        }
    }

    /// Stop the worker after any in-flight read finishes; drops the source.
    pub fn shutdown(&mut self) -> Result<()> {
        self.requests.take();
        if self.pending {
            let _ = self.results.recv();
            self.pending = false;
        }
        match self.handle.take() {
            Some(h) => h.join().map_err(|_| ReaderError::ReadAheadLost),
            None => Ok(()),
        }
    }
}

impl Drop for ReadAhead {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
