//! The error type shared by every OxiPress layer.
//!
//! One enum covers the whole stack: I/O failures bubbling up from readers
//! and writers, allocation failures surfaced as recoverable errors rather
//! than aborts, and the validation failures the decoder reports for
//! malformed streams.

use std::io;
use thiserror::Error;

/// Everything that can go wrong while compressing or decompressing.
#[derive(Debug, Error)]
pub enum OxiPressError {
    /// I/O error from an underlying reader or writer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An internal buffer could not grow.
    ///
    /// Returned instead of aborting so callers can drop the operation and
    /// carry on.
    #[error("Out of memory: failed to reserve {requested} additional bytes")]
    OutOfMemory {
        /// How many additional bytes the reservation asked for.
        requested: usize,
    },

    /// A container trailer checksum does not match the decoded payload.
    #[error("Checksum mismatch: stored {expected:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// Checksum stored in the container.
        expected: u32,
        /// Checksum computed over the decoded data.
        computed: u32,
    },

    /// The decoder hit a bit pattern that is not a valid Huffman code.
    #[error("Invalid Huffman code near bit {bit_position}")]
    InvalidHuffmanCode {
        /// Position in the stream where decoding failed, in bits.
        bit_position: u64,
    },

    /// A structural problem in the compressed stream.
    #[error("Corrupt stream at byte {offset}: {message}")]
    CorruptedData {
        /// Byte offset where the problem was detected.
        offset: u64,
        /// What was wrong.
        message: String,
    },

    /// A container header failed validation.
    #[error("Invalid header: {message}")]
    InvalidHeader {
        /// What was wrong with the header.
        message: String,
    },

    /// The input ended before the stream was complete.
    #[error("Unexpected end of input: {expected} more bytes needed")]
    UnexpectedEof {
        /// How many more bytes were needed.
        expected: usize,
    },

    /// A back-reference points before the start of the decoded output.
    #[error("Back-reference distance {distance} exceeds the {history_size} bytes of history")]
    InvalidDistance {
        /// The offending distance.
        distance: usize,
        /// How much history had been decoded at that point.
        history_size: usize,
    },
}

/// Result type alias used throughout OxiPress.
pub type Result<T> = std::result::Result<T, OxiPressError>;

impl OxiPressError {
    /// Allocation failure while reserving `requested` additional bytes.
    pub fn out_of_memory(requested: usize) -> Self {
        Self::OutOfMemory { requested }
    }

    /// Trailer checksum `expected` disagrees with `computed`.
    pub fn checksum_mismatch(expected: u32, computed: u32) -> Self {
        Self::ChecksumMismatch { expected, computed }
    }

    /// Undecodable Huffman code near `bit_position`.
    pub fn invalid_huffman(bit_position: u64) -> Self {
        Self::InvalidHuffmanCode { bit_position }
    }

    /// Structural corruption at byte `offset`.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::CorruptedData {
            offset,
            message: message.into(),
        }
    }

    /// Malformed container header.
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            message: message.into(),
        }
    }

    /// Input ran out with `expected` bytes still needed.
    pub fn unexpected_eof(expected: usize) -> Self {
        Self::UnexpectedEof { expected }
    }

    /// Back-reference `distance` reaches past the available history.
    pub fn invalid_distance(distance: usize, history_size: usize) -> Self {
        Self::InvalidDistance {
            distance,
            history_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_their_context() {
        assert!(OxiPressError::out_of_memory(4096).to_string().contains("4096"));

        let text = OxiPressError::invalid_distance(40000, 32768).to_string();
        assert!(text.contains("40000"), "{}", text);
        assert!(text.contains("32768"), "{}", text);

        let text = OxiPressError::corrupted(17, "stored block length check failed").to_string();
        assert!(text.contains("17"), "{}", text);
        assert!(text.contains("length check"), "{}", text);
    }

    #[test]
    fn test_checksums_format_as_hex() {
        let text = OxiPressError::checksum_mismatch(0x1234_5678, 0xDEAD_BEEF).to_string();
        assert!(text.contains("0x12345678"), "{}", text);
        assert!(text.contains("0xdeadbeef"), "{}", text);
    }

    #[test]
    fn test_io_errors_convert() {
        let io_err = io::Error::new(io::ErrorKind::UnexpectedEof, "truncated");
        assert!(matches!(
            OxiPressError::from(io_err),
            OxiPressError::Io(_)
        ));
    }
}
