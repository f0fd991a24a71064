//! Streaming canonical k-mer reader for single-sequence inputs (edition 2024).
//!
//! Input: a header line `>id k=<k> l=<len>` followed by `len` sequence bytes.
//! Output: every overlapping k-mer, in input order, as a tagged 2-bit packed
//! `u64` holding the smaller of the k-mer and its reverse complement.
//!
//! - Arithmetic ASCII→2-bit mapping, case-blind; lowercase only masks
//! - O(1) rolling reverse complement, emission keyed on the leading base's case
//! - Fixed buffer pool with zero-copy borrow/recycle or copy-out fill
//! - One read in flight on a read-ahead thread, chunks translated with `rayon`
//!
//! Output order does not depend on `chunk_capacity` or `buffer_count`.

mod chunk;
mod config;
pub mod encode;
mod error;
mod header;
mod pool;
mod reader;
pub mod source;
mod translate;

pub use chunk::ChunkReader;
pub use config::StreamOptions;
pub use encode::{canonical_of, decode_kmer};
pub use error::{ReaderError, Result};
pub use header::{SequenceHeader, parse_header_line, parse_header_tokens, read_header};
pub use pool::{KmerBuffer, PoolCounts};
pub use reader::{KmerReader, Kmers, ReaderState, open_sequence};
pub use source::{CharSource, UnsizedSource, open_path};
pub use translate::{Translator, Window};
