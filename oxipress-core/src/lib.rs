//! # OxiPress Core
//!
//! Shared plumbing for the OxiPress compression stack. The codec and
//! container layers in `oxipress-deflate` are built on four pieces that
//! live here:
//!
//! - [`bitstream`]: LSB-first bit readers and writers for DEFLATE streams
//! - [`buffer`]: growable output buffer with recoverable allocation failure
//! - [`crc`]: CRC-32 checksum for the gzip container
//! - [`error`]: the error type shared by every layer
//!
//! Nothing in this crate knows about DEFLATE itself beyond its bit order;
//! the compression logic sits entirely in `oxipress-deflate`.
//!
//! ## Example
//!
//! ```rust
//! use oxipress_core::bitstream::{BitReader, BitWriter};
//! use oxipress_core::crc::Crc32;
//! use std::io::Cursor;
//!
//! let mut writer = BitWriter::new();
//! writer.write_bits(0x5, 3).unwrap();
//! writer.write_bits(0x1F, 5).unwrap();
//! let bytes = writer.finish().unwrap().into_vec();
//!
//! let mut reader = BitReader::new(Cursor::new(&bytes));
//! assert_eq!(reader.read_bits(3).unwrap(), 0x5);
//!
//! assert_eq!(Crc32::compute(b"123456789"), 0xCBF4_3926);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bitstream;
pub mod buffer;
pub mod crc;
pub mod error;

// Re-exports for convenience
pub use bitstream::{BitReader, BitWriter};
pub use buffer::ByteBuffer;
pub use crc::Crc32;
pub use error::{OxiPressError, Result};
