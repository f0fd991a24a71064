//! Sequence header: `> <id> k=<int> l=<int>`.
//!
//! The first whitespace-separated token is the identifier; every following
//! token must be `key=value`. `k` is mandatory. `l` may be omitted when the
//! source knows how many bytes follow the header.

use std::collections::HashMap;

use crate::error::{ReaderError, Result};
use crate::source::CharSource;

/// Parsed header of a single-sequence input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceHeader {
    /// Identifier token (without the leading `>`).
    pub id: String,
    /// K-mer length.
    pub k: usize,
    /// Declared sequence length in bytes.
    pub len: u64,
    /// Any other `key=value` pairs, kept verbatim.
    pub extra: HashMap<String, String>,
}

/// Split a header line into its identifier and `key=value` pairs.
pub fn parse_header_tokens(line: &str) -> Result<(String, HashMap<String, String>)> {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(rest) = line.strip_prefix('>') else {
        return Err(ReaderError::Format(format!(
            "header must start with '>': {line:?}"
        )));
    };

    let mut tokens = rest.split_whitespace();
    let id = tokens.next().unwrap_or_default().to_string();

    let mut pairs = HashMap::new();
    for tok in tokens {
        let mut kv = tok.split('=');
        match (kv.next(), kv.next(), kv.next()) {
            (Some(key), Some(val), None) if !key.is_empty() => {
                pairs.insert(key.to_string(), val.to_string());
            }
            _ => {
                return Err(ReaderError::Format(format!(
                    "expected key=value, got {tok:?}"
                )));
            }
        }
    }
    Ok((id, pairs))
}

fn parse_num<T: std::str::FromStr>(
    pairs: &HashMap<String, String>,
    key: &str,
) -> Result<Option<T>> {
    match pairs.get(key) {
        None => Ok(None),
        Some(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|_| ReaderError::Format(format!("{key}={v} is not a valid number"))),
    }
}

/// Parse a full header line; both `k` and `l` are required.
pub fn parse_header_line(line: &str) -> Result<SequenceHeader> {
    let (id, mut extra) = parse_header_tokens(line)?;
    let k = parse_num::<usize>(&extra, "k")?
        .ok_or_else(|| ReaderError::Format("header does not contain k".into()))?;
    let len = parse_num::<u64>(&extra, "l")?
        .ok_or_else(|| ReaderError::Format("header does not contain l".into()))?;
    extra.remove("k");
    extra.remove("l");
    Ok(SequenceHeader { id, k, len, extra })
}

/// Consume exactly the first line of `src` and parse it.
///
/// Without `l=`, the length falls back to the bytes remaining after the
/// header line, if the source can report them.
pub fn read_header<S: CharSource>(src: &mut S) -> Result<SequenceHeader> {
    let mut raw = Vec::new();
    if src.read_until(b'\n', &mut raw)? == 0 {
        return Err(ReaderError::Format("input is empty".into()));
    }
    let line = String::from_utf8(raw)
        .map_err(|_| ReaderError::Format("header is not valid UTF-8".into()))?;

    let (id, mut extra) = parse_header_tokens(&line)?;
    let k = parse_num::<usize>(&extra, "k")?
        .ok_or_else(|| ReaderError::Format("header does not contain k".into()))?;
    let len = match parse_num::<u64>(&extra, "l")? {
        Some(l) => l,
        None => src
            .remaining_len()
            .ok_or_else(|| ReaderError::Format("header does not contain l".into()))?,
    };
    extra.remove("k");
    extra.remove("l");
    log::debug!("header id={id} k={k} l={len}");
    Ok(SequenceHeader { id, k, len, extra })
}
