//! Growable byte buffer with recoverable allocation failure.
//!
//! Compression output sizes are not known in advance, so the encoder appends
//! to a buffer that grows on demand. Unlike `Vec`, every growing operation
//! here goes through `try_reserve`, so running out of memory surfaces as an
//! [`OxiPressError::OutOfMemory`] instead of aborting the process.
//!
//! # Example
//!
//! ```
//! use oxipress_core::buffer::ByteBuffer;
//!
//! let mut buf = ByteBuffer::new();
//! buf.push(0x1F).unwrap();
//! buf.extend_from_slice(&[0x8B, 0x08]).unwrap();
//! assert_eq!(buf.as_slice(), &[0x1F, 0x8B, 0x08]);
//! ```

use crate::error::{OxiPressError, Result};

/// A byte buffer where all growth is fallible.
///
/// Wraps a `Vec<u8>` but never calls an infallible allocation path once
/// constructed. Amortized growth behavior matches `Vec` (the underlying
/// `try_reserve` over-allocates to keep appends amortized constant time).
#[derive(Debug, Default, Clone)]
pub struct ByteBuffer {
    data: Vec<u8>,
}

impl ByteBuffer {
    /// Create a new empty buffer. Does not allocate.
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Create a buffer with the given initial capacity.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut data = Vec::new();
        data.try_reserve(capacity)
            .map_err(|_| OxiPressError::out_of_memory(capacity))?;
        Ok(Self { data })
    }

    /// Number of bytes in the buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the buffer contains no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Reserve space for at least `additional` more bytes.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        self.data
            .try_reserve(additional)
            .map_err(|_| OxiPressError::out_of_memory(additional))
    }

    /// Append a single byte.
    #[inline]
    pub fn push(&mut self, byte: u8) -> Result<()> {
        if self.data.len() == self.data.capacity() {
            self.reserve(1)?;
        }
        self.data.push(byte);
        Ok(())
    }

    /// Append a slice of bytes.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> Result<()> {
        if self.data.capacity() - self.data.len() < bytes.len() {
            self.reserve(bytes.len())?;
        }
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// View the buffer contents as a slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consume the buffer and return the underlying `Vec`.
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl AsRef<[u8]> for ByteBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

/// Allocate a `vec![value; len]` through the fallible reservation path.
///
/// Used for the large working arrays of the encoder (hash chains, cost
/// arrays) so that allocation failure on huge inputs is reported as an
/// error rather than aborting.
pub fn try_alloc_vec<T: Clone>(value: T, len: usize) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| OxiPressError::out_of_memory(len.saturating_mul(std::mem::size_of::<T>())))?;
    v.resize(len, value);
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_extend() {
        let mut buf = ByteBuffer::new();
        assert!(buf.is_empty());

        buf.push(1).unwrap();
        buf.extend_from_slice(&[2, 3, 4]).unwrap();

        assert_eq!(buf.len(), 4);
        assert_eq!(buf.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_with_capacity() {
        let mut buf = ByteBuffer::with_capacity(128).unwrap();
        assert!(buf.is_empty());
        for i in 0..200u8 {
            buf.push(i).unwrap();
        }
        assert_eq!(buf.len(), 200);
    }

    #[test]
    fn test_try_alloc_vec() {
        let v = try_alloc_vec(7u16, 1000).unwrap();
        assert_eq!(v.len(), 1000);
        assert!(v.iter().all(|&x| x == 7));

        let empty: Vec<f32> = try_alloc_vec(0.0, 0).unwrap();
        assert!(empty.is_empty());
    }
}
