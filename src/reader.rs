//! KmerReader: borrow / fill / recycle over a read-ahead chunk pipeline.
//!
//! One fill cycle takes the scratch loaded by the previous read, translates
//! its chunks in parallel (one chunk per free buffer, ascending order), queues
//! the buffers as used, and immediately issues the read for the next cycle.
//! If fewer buffers are free than the scratch has chunks, the remaining
//! chunks wait in the scratch for the next cycle.

use std::mem;

use rayon::prelude::*;

use crate::chunk::{ChunkReader, ReadAhead, ScratchFill};
use crate::config::StreamOptions;
use crate::error::{ReaderError, Result};
use crate::header::{SequenceHeader, read_header};
use crate::pool::{BufferPool, KmerBuffer, PoolCounts};
use crate::source::CharSource;
use crate::translate::Translator;

/// Reader lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReaderState {
    /// Constructed, tail not yet read.
    Uninitialized,
    /// First `k-1` bytes read; no cycle run yet.
    Seeded,
    /// At least one cycle produced buffers.
    Streaming,
    /// Input exhausted; filled buffers may remain.
    Draining,
    /// Nothing left to hand out, or closed by the caller.
    Closed,
}

enum Ingest<S> {
    Unseeded(ChunkReader<S>),
    Running(ReadAhead),
    Done,
}

enum Scratch {
    /// Owned by the reader, no read pending.
    Idle(Vec<u8>),
    /// Travelling with the pending read.
    InFlight,
    /// Filled with `read` new bytes; chunks before `next_chunk` are done.
    Loaded {
        buf: Vec<u8>,
        read: usize,
        next_chunk: usize,
    },
}

/// Streaming canonical k-mer reader over a single sequence.
pub struct KmerReader<S: CharSource> {
    translator: Translator,
    chunk: usize,
    pool: BufferPool,
    cycle: Vec<KmerBuffer>,
    scratch: Scratch,
    ingest: Ingest<S>,
    workers: Option<rayon::ThreadPool>,
    state: ReaderState,
    finished: bool,
    disposed: bool,
    cycles: u64,
    emitted: u64,
}

impl<S: CharSource> KmerReader<S> {
    /// Build a reader for `declared_len` bytes of `source` (header already
    /// consumed). Fails with [`ReaderError::Config`] on bad parameters.
    pub fn new(k: usize, declared_len: u64, source: S, opts: StreamOptions) -> Result<Self> {
        let translator = Translator::new(k)?;
        opts.validate()?;
        let chunk = opts.effective_chunk(k);
        let count = opts.buffer_count_value();
        let overlap = translator.overlap();

        let scratch_len = chunk
            .checked_mul(count)
            .and_then(|n| n.checked_add(overlap))
            .ok_or_else(|| {
                ReaderError::Config(format!("scratch size overflows: {chunk} x {count}"))
            })?;

        let workers = opts
            .thread_count()
            .map(|n| {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("kmer-translate-{i}"))
                    .build()
            })
            .transpose()
            .map_err(|e| ReaderError::Config(format!("worker pool: {e}")))?;

        let mut reader = Self {
            translator,
            chunk,
            pool: BufferPool::new(count, chunk),
            cycle: Vec::with_capacity(count),
            scratch: Scratch::Idle(vec![0u8; scratch_len]),
            ingest: Ingest::Unseeded(ChunkReader::new(source, overlap, declared_len)),
            workers,
            state: ReaderState::Uninitialized,
            finished: false,
            disposed: false,
            cycles: 0,
            emitted: 0,
        };
        log::info!(
            "k-mer reader: k={k} l={declared_len} chunk={chunk} buffers={count} \
             scratch={scratch_len}"
        );
        if opts.is_eager() {
            reader.init()?;
        }
        Ok(reader)
    }

    pub fn k(&self) -> usize {
        self.translator.k()
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Where the pool's buffers are right now.
    pub fn pool_counts(&self) -> PoolCounts {
        self.pool.counts()
    }

    /// Total k-mers produced so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Read the first `k-1` bytes and start the read-ahead worker.
    /// No-op once seeded.
    pub fn init(&mut self) -> Result<()> {
        self.ensure_open()?;
        let mut chunk = match mem::replace(&mut self.ingest, Ingest::Done) {
            Ingest::Unseeded(chunk) => chunk,
            other => {
                self.ingest = other;
                return Ok(());
            }
        };
        let seeded = match chunk.seed() {
            Ok(n) => n,
            Err(e) => {
                self.finish();
                return Err(e.into());
            }
        };
        log::debug!("seeded {seeded} overlap bytes, {} left", chunk.remaining());
        self.ingest = Ingest::Running(ReadAhead::spawn(chunk)?);
        self.state = ReaderState::Seeded;
        Ok(())
    }

    /// Take one filled buffer, running a fill cycle if none is queued.
    /// `Ok(None)` once the input is exhausted and every buffer handed out.
    ///
    /// Each borrowed buffer must go back through
    /// [`recycle_buffer`](Self::recycle_buffer).
    pub fn borrow_buffer(&mut self) -> Result<Option<KmerBuffer>> {
        self.ensure_open()?;
        if !self.finished {
            if self.pool.has_used() {
                self.poll_read_ahead()?;
            } else {
                self.fill_cycle()?;
            }
        }
        match self.pool.pop_used() {
            Some(buf) => Ok(Some(buf)),
            None => {
                if self.state != ReaderState::Closed {
                    log::info!(
                        "k-mer stream drained: {} k-mers in {} cycles",
                        self.emitted,
                        self.cycles
                    );
                }
                self.state = ReaderState::Closed;
                Ok(None)
            }
        }
    }

    /// Return a borrowed buffer to the free pool.
    pub fn recycle_buffer(&mut self, buffer: KmerBuffer) -> Result<()> {
        self.pool.recycle(buffer)
    }

    /// Copy k-mers into `dest` until it is full or the stream ends.
    /// A short count means end of stream.
    pub fn fill_buffer(&mut self, dest: &mut [u64]) -> Result<usize> {
        let mut copied = 0usize;
        while copied < dest.len() {
            let Some(mut buf) = self.borrow_buffer()? else {
                break;
            };
            copied += buf.drain_into(&mut dest[copied..]);
            if buf.is_drained() {
                self.pool.recycle(buf)?;
            } else {
                self.pool.requeue(buf);
            }
        }
        Ok(copied)
    }

    /// Iterate over every remaining k-mer, one buffer at a time.
    pub fn kmers(&mut self) -> Kmers<'_, S> {
        Kmers {
            reader: self,
            current: None,
        }
    }

    /// Stop reading and drop the source. Later borrow/fill calls fail with
    /// [`ReaderError::Closed`]; borrowed buffers may still be recycled.
    pub fn close(&mut self) -> Result<()> {
        self.disposed = true;
        self.state = ReaderState::Closed;
        match mem::replace(&mut self.ingest, Ingest::Done) {
            Ingest::Running(mut ra) => ra.shutdown(),
            Ingest::Unseeded(_) | Ingest::Done => Ok(()),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.disposed {
            Err(ReaderError::Closed)
        } else {
            Ok(())
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.state = ReaderState::Draining;
        if let Ingest::Running(mut ra) = mem::replace(&mut self.ingest, Ingest::Done) {
            if ra.shutdown().is_err() {
                log::warn!("read-ahead worker ended abnormally");
            }
        }
    }

    fn fill_cycle(&mut self) -> Result<()> {
        self.init()?;
        if !matches!(self.scratch, Scratch::Loaded { .. }) {
            self.load_scratch()?;
            if self.finished {
                return Ok(());
            }
        }
        self.translate_loaded()
    }

    /// Wait for the pending read, issuing it first if none is in flight.
    fn load_scratch(&mut self) -> Result<()> {
        let ra = match &mut self.ingest {
            Ingest::Running(ra) => ra,
            _ => {
                self.finish();
                return Ok(());
            }
        };
        if let Scratch::Idle(buf) = mem::replace(&mut self.scratch, Scratch::InFlight) {
            if let Some(back) = ra.request(buf)? {
                self.scratch = Scratch::Idle(back);
            }
        }
        let fill = ra.wait()?;
        self.accept_fill(fill)
    }

    /// Collect a finished read without blocking, so end of input is seen
    /// while filled buffers are still queued.
    fn poll_read_ahead(&mut self) -> Result<()> {
        let Ingest::Running(ra) = &mut self.ingest else {
            return Ok(());
        };
        match ra.try_wait()? {
            Some(fill) => self.accept_fill(fill),
            None => Ok(()),
        }
    }

    fn accept_fill(&mut self, fill: ScratchFill) -> Result<()> {
        let ScratchFill { scratch, read } = fill;
        match read {
            Ok(0) => {
                self.scratch = Scratch::Idle(scratch);
                log::debug!("input exhausted after {} cycles", self.cycles);
                self.finish();
                Ok(())
            }
            Ok(n) => {
                self.scratch = Scratch::Loaded {
                    buf: scratch,
                    read: n,
                    next_chunk: 0,
                };
                Ok(())
            }
            Err(e) => {
                self.scratch = Scratch::Idle(scratch);
                self.finish();
                Err(e.into())
            }
        }
    }

    /// Translate as many loaded chunks as there are free buffers.
    fn translate_loaded(&mut self) -> Result<()> {
        let Scratch::Loaded {
            buf,
            read,
            next_chunk,
        } = &mut self.scratch
        else {
            return Ok(());
        };
        let read = *read;
        let chunk = self.chunk;
        let total = read.div_ceil(chunk);
        let wanted = total - *next_chunk;
        let take = wanted.min(self.pool.counts().free);
        if take == 0 {
            return Err(ReaderError::PoolExhausted {
                needed: wanted,
                free: 0,
            });
        }
        self.pool.take_free(take, &mut self.cycle)?;

        let first = *next_chunk;
        let overlap = self.translator.overlap();
        let translator = self.translator;
        let scratch: &[u8] = buf;
        let cycle = &mut self.cycle;
        let mut job = move || {
            cycle
                .par_iter_mut()
                .enumerate()
                .try_for_each(|(j, out)| -> Result<()> {
                    let start = (first + j) * chunk;
                    let len = chunk.min(read - start);
                    let n = translator.translate_range(
                        scratch,
                        start..start + len + overlap,
                        out.slots_mut(),
                    )?;
                    out.set_filled(n);
                    Ok(())
                })
        };
        let outcome = match &self.workers {
            Some(pool) => pool.install(job),
            None => job(),
        };
        if let Err(e) = outcome {
            self.pool.restore_free(self.cycle.drain(..));
            return Err(e);
        }

        let produced: usize = self.cycle.iter().map(KmerBuffer::size).sum();
        self.emitted += produced as u64;
        self.cycles += 1;
        self.pool.push_used(self.cycle.drain(..));
        *next_chunk += take;
        log::debug!(
            "cycle {}: chunks {}..{} of {} ({} bytes), {} k-mers",
            self.cycles,
            first,
            first + take,
            total,
            read,
            produced
        );

        if *next_chunk == total {
            if let Scratch::Loaded { buf, .. } =
                mem::replace(&mut self.scratch, Scratch::InFlight)
            {
                self.issue_read(buf)?;
            }
        }
        self.state = ReaderState::Streaming;
        Ok(())
    }

    /// Send the idle scratch off for the next cycle's read.
    fn issue_read(&mut self, buf: Vec<u8>) -> Result<()> {
        match &mut self.ingest {
            Ingest::Running(ra) => {
                if let Some(back) = ra.request(buf)? {
                    self.scratch = Scratch::Idle(back);
                }
                log::trace!("read-ahead issued");
            }
            _ => self.scratch = Scratch::Idle(buf),
        }
        Ok(())
    }
}

/// Open a single-sequence input: parse the header line, then build a reader
/// over the bytes that follow it.
pub fn open_sequence<S: CharSource>(
    mut source: S,
    opts: StreamOptions,
) -> Result<(SequenceHeader, KmerReader<S>)> {
    let header = read_header(&mut source)?;
    let reader = KmerReader::new(header.k, header.len, source, opts)?;
    Ok((header, reader))
}

/// Iterator over packed k-mers; see [`KmerReader::kmers`].
pub struct Kmers<'a, S: CharSource> {
    reader: &'a mut KmerReader<S>,
    current: Option<KmerBuffer>,
}

impl<S: CharSource> Iterator for Kmers<'_, S> {
    type Item = Result<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(buf) = self.current.as_mut() {
                if let Some(&v) = buf.kmers().first() {
                    buf.consume(1);
                    return Some(Ok(v));
                }
            }
            if let Some(done) = self.current.take() {
                if let Err(e) = self.reader.recycle_buffer(done) {
                    return Some(Err(e));
                }
            }
            match self.reader.borrow_buffer() {
                Ok(Some(buf)) => self.current = Some(buf),
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl<S: CharSource> Drop for Kmers<'_, S> {
    fn drop(&mut self) {
        if let Some(buf) = self.current.take() {
            let _ = self.reader.recycle_buffer(buf);
        }
    }
}
