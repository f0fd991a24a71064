//! K-mer encoding: arithmetic 2-bit mapping, case flag, tagging, decode.
//!
//! Conventions
//! - Base codes: A=0, C=1, G=2, T=3, derived from the raw byte, case-blind.
//! - Packed k-mers are **tagged**: `code << 2 | TAG`, so a packed value is
//!   never zero and the low two bits are always `0b11`.
//! - The forward code is MSB-first: the first base of the window sits in the
//!   highest occupied bit pair.

/// Marker OR-ed into the low two bits of every packed k-mer.
pub const TAG: u64 = 0b11;

/// Largest supported k: `2k + 2` bits must fit a `u64`.
pub const MAX_K: usize = 31;

const CASE_BIT: u8 = 0b0010_0000;

/// 2-bit base code from the raw byte value.
///
/// `(c >> 1) & 3` yields A=0, C=1, G=3, T=2 for both cases; the gray-code
/// step `v ^ (v >> 1)` swaps the last two so that complement is `3 - code`.
/// Other bytes fall through to whatever code the arithmetic produces.
#[inline(always)]
pub fn base_code(c: u8) -> u64 {
    let v = (c >> 1) & 0b11;
    (v ^ (v >> 1)) as u64
}

/// Complement of a 2-bit code (A<->T, C<->G).
#[inline(always)]
pub fn complement(code: u64) -> u64 {
    code ^ 0b11
}

/// Uppercase check by the ASCII case bit only.
#[inline(always)]
pub fn is_upper(c: u8) -> bool {
    c & CASE_BIT == 0
}

/// Mask keeping the low `2k` bits.
#[inline]
pub fn kmer_mask(k: usize) -> u64 {
    debug_assert!(k >= 1 && k <= MAX_K);
    (1u64 << (2 * k)) - 1
}

/// Apply the tag to an untagged `2k`-bit code.
#[inline(always)]
pub fn tag(code: u64) -> u64 {
    (code << 2) | TAG
}

/// Packed canonical value of an explicit window, computed without rolling.
/// Reference implementation for checks; `window.len()` is `k`.
pub fn canonical_of(window: &[u8]) -> u64 {
    let k = window.len();
    let mut fwd = 0u64;
    let mut rc = 0u64;
    for (i, &c) in window.iter().enumerate() {
        let v = base_code(c);
        fwd = (fwd << 2) | v;
        rc |= complement(v) << (2 * i);
    }
    debug_assert!(k == 0 || (fwd | rc) <= kmer_mask(k));
    tag(fwd.min(rc))
}

/// Base code at position `n` (0 = first base) of a packed k-mer.
#[inline]
pub fn nth_code(packed: u64, k: usize, n: usize) -> u64 {
    (packed >> ((k - n - 1) * 2 + 2)) & 0b11
}

/// Decode a packed k-mer back to its uppercase string.
pub fn decode_kmer(packed: u64, k: usize) -> String {
    const BASES: [char; 4] = ['A', 'C', 'G', 'T'];
    (0..k).map(|n| BASES[nth_code(packed, k, n) as usize]).collect()
}
