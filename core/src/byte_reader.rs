//! Random-access reads over a seekable byte source, preserving the
//! underlying cursor position across calls so callers never observe a
//! side effect from a `read_at`.

use std::io::{Read, Seek, SeekFrom};

use crate::error::NtfsError;

/// Wraps any `Read + Seek` source (a file, a cursor over an in-memory
/// image) and exposes absolute-offset reads. Not `Sync`: a single reader
/// is meant to be driven by one caller at a time.
pub struct ByteReader<R> {
    inner: R,
}

impl<R: Read + Seek> ByteReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Reads exactly `len` bytes starting at `offset`, restoring the
    /// prior cursor position afterward.
    pub fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>, NtfsError> {
        let saved = self.inner.stream_position()?;
        self.inner.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        self.inner.read_exact(&mut buf)?;
        self.inner.seek(SeekFrom::Start(saved))?;
        Ok(buf)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn read_at_preserves_position() {
        let data = (0u8..=255).collect::<Vec<u8>>();
        let mut reader = ByteReader::new(Cursor::new(data));

        reader.inner.seek(SeekFrom::Start(42)).unwrap();
        let chunk = reader.read_at(10, 4).unwrap();
        assert_eq!(chunk, vec![10, 11, 12, 13]);
        assert_eq!(reader.inner.stream_position().unwrap(), 42);
    }

    #[test]
    fn read_at_past_end_is_io_error() {
        let mut reader = ByteReader::new(Cursor::new(vec![0u8; 4]));
        assert!(reader.read_at(0, 16).is_err());
    }
}
