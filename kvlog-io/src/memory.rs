use crate::ByteReader;

/// An in-memory `ByteReader` over an owned buffer.
///
/// Mostly useful for tests and for replaying buffered stream fragments.
pub struct BytesReader {
    buf: Vec<u8>,
    pos: usize,
}

impl BytesReader {
    pub fn new(buf: impl Into<Vec<u8>>) -> BytesReader {
        BytesReader {
            buf: buf.into(),
            pos: 0,
        }
    }

    /// Returns the current read position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the number of bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

impl ByteReader for BytesReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let available = self.buf.len() - self.pos;
        let n = buf.len().min(available);
        buf[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
