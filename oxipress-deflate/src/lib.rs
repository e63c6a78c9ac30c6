//! # OxiPress Deflate
//!
//! Exhaustive DEFLATE compression (RFC 1951) in pure Rust, with zlib
//! (RFC 1950) and gzip (RFC 1952) containers.
//!
//! Unlike a general-purpose compressor, this crate trades CPU time for
//! output size: each block's LZ77 parse is optimized by iterated
//! shortest-path runs over a statistical cost model, block boundaries are
//! chosen by recursive cost search, and Huffman code lengths are tuned for
//! their own run-length encoded representation. The output is a standard
//! DEFLATE stream any inflater can decode.
//!
//! ## Pipeline
//!
//! 1. Split the input into blocks where the content's statistics change
//!    ([`blocksplitter`]).
//! 2. For each block, run greedy LZ77 ([`lz77`]), then refine the parse by
//!    repeated cost-model passes ([`squeeze`]).
//! 3. Choose the cheapest block type and emit the bits ([`deflate`]).
//!
//! ## Example
//!
//! ```rust
//! use oxipress_deflate::{compress, decompress, Format, Options};
//!
//! let options = Options::default();
//! let data = b"Hello, World! Hello, World! Hello, World!";
//!
//! let compressed = compress(&options, Format::Zlib, data).unwrap();
//! let restored = decompress(Format::Zlib, &compressed).unwrap();
//! assert_eq!(&restored, data);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod blocksplitter;
pub mod cache;
pub mod deflate;
pub mod gzip;
pub mod hash;
pub mod huffman;
pub mod inflate;
pub mod lz77;
pub mod options;
pub mod squeeze;
pub mod tables;
pub mod zlib;

use oxipress_core::bitstream::BitWriter;
use oxipress_core::error::Result;

// Re-exports
pub use huffman::HuffmanTree;
pub use inflate::inflate;
pub use lz77::Lz77Store;
pub use options::Options;

/// Size of the sliding window all match distances refer into.
pub const WINDOW_SIZE: usize = 32768;

/// Mask for reducing a position to its window slot.
pub const WINDOW_MASK: usize = WINDOW_SIZE - 1;

/// Shortest allowed match length.
pub const MIN_MATCH: usize = 3;

/// Longest allowed match length.
pub const MAX_MATCH: usize = 258;

/// Output container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Gzip container (RFC 1952): header, deflate stream, CRC-32 and size
    /// trailer.
    Gzip,
    /// Zlib container (RFC 1950): 2-byte header, deflate stream, Adler-32
    /// trailer.
    Zlib,
    /// Raw deflate stream (RFC 1951) with no container.
    Deflate,
}

/// Compress `data` into the given container format.
///
/// This is the main entry point. All structural decisions (block splits,
/// parse, block types, code lengths) are made by the cost optimizer
/// according to `options`.
pub fn compress(options: &Options, format: Format, data: &[u8]) -> Result<Vec<u8>> {
    match format {
        Format::Gzip => gzip::gzip_compress(options, data),
        Format::Zlib => zlib::zlib_compress(options, data),
        Format::Deflate => {
            let mut writer = BitWriter::new();
            deflate::deflate(options, data, &mut writer)?;
            Ok(writer.finish()?.into_vec())
        }
    }
}

/// Decompress `data` in the given container format.
///
/// Intended for verifying compressed output and for symmetry with
/// [`compress`]; this is a straightforward inflater, not an optimized one.
pub fn decompress(format: Format, data: &[u8]) -> Result<Vec<u8>> {
    match format {
        Format::Gzip => gzip::gzip_decompress(data),
        Format::Zlib => zlib::zlib_decompress(data),
        Format::Deflate => inflate::inflate(data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_decompress_all_formats() {
        let options = Options::with_iterations(3);
        let data = b"The entropy of this sentence is low. The entropy of this \
                     sentence is low. The entropy of this sentence is low."
            .to_vec();
        for format in [Format::Gzip, Format::Zlib, Format::Deflate] {
            let compressed = compress(&options, format, &data).unwrap();
            assert!(compressed.len() < data.len(), "{format:?} did not shrink");
            let restored = decompress(format, &compressed).unwrap();
            assert_eq!(restored, data, "{format:?} roundtrip failed");
        }
    }

    #[test]
    fn test_compress_empty_input() {
        let options = Options::with_iterations(1);
        for format in [Format::Gzip, Format::Zlib, Format::Deflate] {
            let compressed = compress(&options, format, b"").unwrap();
            assert!(!compressed.is_empty());
            let restored = decompress(format, &compressed).unwrap();
            assert!(restored.is_empty());
        }
    }
}
