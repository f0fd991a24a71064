//! Character sources: anything buffered, sendable, and owned.
//!
//! The reader moves its source onto a read-ahead thread, so sources must be
//! `Send + 'static`. `remaining_len` lets a header omit `l=` when the
//! number of bytes left after the header is known up front.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Read, Seek};
use std::path::Path;

/// Ordered, finite byte stream supporting bounded reads.
pub trait CharSource: BufRead + Send + 'static {
    /// Bytes left in the stream, when the source can tell.
    fn remaining_len(&mut self) -> Option<u64> {
        None
    }
}

impl<T> CharSource for Cursor<T>
where
    T: AsRef<[u8]> + Send + 'static,
{
    fn remaining_len(&mut self) -> Option<u64> {
        let total = self.get_ref().as_ref().len() as u64;
        Some(total.saturating_sub(self.position()))
    }
}

impl CharSource for BufReader<File> {
    fn remaining_len(&mut self) -> Option<u64> {
        let total = self.get_ref().metadata().ok()?.len();
        let pos = self.stream_position().ok()?;
        Some(total.saturating_sub(pos))
    }
}

/// Wrapper for sources of unknown length (pipes, decoders).
pub struct UnsizedSource<R>(pub BufReader<R>);

impl<R: Read> UnsizedSource<R> {
    pub fn new(inner: R) -> Self {
        UnsizedSource(BufReader::new(inner))
    }
}

impl<R: Read> Read for UnsizedSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl<R: Read> BufRead for UnsizedSource<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.0.fill_buf()
    }
    fn consume(&mut self, amt: usize) {
        self.0.consume(amt)
    }
}

impl<R: Read + Send + 'static> CharSource for UnsizedSource<R> {}

/// Memory-map a file as a character source.
pub fn open_path(path: &Path) -> io::Result<Cursor<memmap2::Mmap>> {
    let file = File::open(path)?;
    // SAFETY: the map is read-only; the file must not be truncated while mapped.
    let map = unsafe { memmap2::Mmap::map(&file)? };
    Ok(Cursor::new(map))
}

/// Read until `buf` is full or the source reports end of stream.
pub(crate) fn read_full<S: Read + ?Sized>(src: &mut S, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0usize;
    while filled < buf.len() {
        match src.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_reports_remaining() {
        let mut c = Cursor::new(b"> x k=3\nACGT".to_vec());
        let mut line = Vec::new();
        c.read_until(b'\n', &mut line).unwrap();
        assert_eq!(c.remaining_len(), Some(4));
    }

    #[test]
    fn unsized_source_has_no_length() {
        let mut s = UnsizedSource::new(&b"ACGT"[..]);
        assert_eq!(s.remaining_len(), None);
        let mut buf = [0u8; 8];
        assert_eq!(read_full(&mut s, &mut buf).unwrap(), 4);
    }
}
