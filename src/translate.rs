//! Sliding-window translation of a byte run into canonical packed k-mers.
//!
//! A run starts with `k-1` overlap bytes that only seed the registers. Every
//! further byte closes one window; the window is emitted iff its leading
//! byte is uppercase. The emitted value is `tag(min(fwd, rc))`.

use std::ops::Range;

use crate::encode::{MAX_K, base_code, complement, is_upper, kmer_mask, tag};
use crate::error::{ReaderError, Result};

/// Rolling forward / reverse-complement registers for one window.
#[derive(Clone, Copy, Debug)]
pub struct Window {
    fwd: u64,
    rc: u64,
    mask: u64,
    rc_shift: u32,
}

fn check_k(k: usize) -> Result<()> {
    if k == 0 || k > MAX_K {
        return Err(ReaderError::Config(format!(
            "k must be in 1..={MAX_K}, got {k}"
        )));
    }
    Ok(())
}

impl Window {
    /// Empty registers for `k` in `1..=31`.
    pub fn new(k: usize) -> Result<Self> {
        check_k(k)?;
        Ok(Self {
            fwd: 0,
            rc: 0,
            mask: kmer_mask(k),
            rc_shift: (2 * (k - 1)) as u32,
        })
    }

    /// Shift one byte into both registers.
    #[inline(always)]
    pub fn push(&mut self, c: u8) {
        let v = base_code(c);
        self.fwd = ((self.fwd << 2) | v) & self.mask;
        self.rc = ((self.rc >> 2) | (complement(v) << self.rc_shift)) & self.mask;
    }

    /// Tagged canonical value of the current window.
    #[inline(always)]
    pub fn canonical(&self) -> u64 {
        tag(self.fwd.min(self.rc))
    }

    pub fn forward(&self) -> u64 {
        self.fwd
    }

    pub fn reverse_complement(&self) -> u64 {
        self.rc
    }
}

/// Translator for a fixed `k`. Stateless between calls; safe to share.
#[derive(Clone, Copy, Debug)]
pub struct Translator {
    k: usize,
}

impl Translator {
    /// `k` must lie in `1..=31`.
    pub fn new(k: usize) -> Result<Self> {
        check_k(k)?;
        Ok(Self { k })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of seed bytes carried between runs.
    pub fn overlap(&self) -> usize {
        self.k - 1
    }

    /// Most k-mers a run of `run_len` bytes (overlap included) can yield.
    pub fn max_emitted(&self, run_len: usize) -> usize {
        run_len.saturating_sub(self.overlap())
    }

    /// Translate `run` (overlap first) into `out`; returns the count written.
    ///
    /// Fails with [`ReaderError::Capacity`] before writing anything if `out`
    /// cannot hold one value per window.
    pub fn translate(&self, run: &[u8], out: &mut [u64]) -> Result<usize> {
        let needed = self.max_emitted(run.len());
        if out.len() < needed {
            return Err(ReaderError::Capacity {
                needed,
                available: out.len(),
            });
        }
        if needed == 0 {
            return Ok(0);
        }

        let lead = self.overlap();
        let mut win = Window::new(self.k)?;
        for &c in &run[..lead] {
            win.push(c);
        }

        let mut emitted = 0usize;
        for (i, &c) in run.iter().enumerate().skip(lead) {
            win.push(c);
            if is_upper(run[i - lead]) {
                out[emitted] = win.canonical();
                emitted += 1;
            }
        }
        Ok(emitted)
    }

    /// Like [`translate`](Self::translate) over `chars[range]`, rejecting
    /// ranges that fall outside `chars`.
    pub fn translate_range(
        &self,
        chars: &[u8],
        range: Range<usize>,
        out: &mut [u64],
    ) -> Result<usize> {
        if range.start > range.end || range.end > chars.len() {
            return Err(ReaderError::Capacity {
                needed: range.end,
                available: chars.len(),
            });
        }
        self.translate(&chars[range], out)
    }
}
