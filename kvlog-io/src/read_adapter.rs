//! A helper that turns any `std::io::Read` implementation into a `ByteReader`.

use crate::ByteReader;

/// Adapts a standard `std::io::Read` source (file, socket, decompressor)
/// into the `ByteReader` trait consumed by the stream decoder.
pub struct ReadAdapter<R> {
    inner: R,
}

impl<R> ReadAdapter<R> {
    /// Creates a new `ReadAdapter` wrapping the given `std::io::Read`
    /// implementation.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Returns a reference to the underlying reader.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Consumes the adapter and returns the underlying reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: std::io::Read> ByteReader for ReadAdapter<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ByteReader;

    #[test]
    fn test_adapts_std_read() {
        let data: &[u8] = &[10, 20, 30];
        let mut reader = ReadAdapter::new(data);
        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [10, 20]);
        assert_eq!(reader.read_u8().unwrap(), 30);
        assert!(reader.inner().is_empty());
        assert!(reader.into_inner().is_empty());
    }
}
