//! Gzip format wrapper for DEFLATE compression.
//!
//! The gzip format (RFC 1952) wraps raw DEFLATE data with a 10-byte
//! header and an 8-byte trailer holding a CRC-32 of the uncompressed data
//! and its length. The encoder always writes a minimal header; the decoder
//! accepts the optional header fields (extra data, file name, comment,
//! header CRC) other tools produce.
//!
//! # Format
//!
//! ```text
//! +---+---+---+---+---+---+---+---+---+---+============+---+---+---+---+---+---+---+---+
//! |ID1|ID2|CM |FLG|     MTIME     |XFL|OS | compressed |     CRC32     |     ISIZE     |
//! +---+---+---+---+---+---+---+---+---+---+============+---+---+---+---+---+---+---+---+
//! ```

use crate::deflate::deflate;
use crate::inflate::inflate;
use crate::options::Options;
use oxipress_core::bitstream::BitWriter;
use oxipress_core::crc::Crc32;
use oxipress_core::error::{OxiPressError, Result};

/// FLG bit: a header CRC16 follows the header.
const FHCRC: u8 = 1 << 1;
/// FLG bit: an extra field follows the header.
const FEXTRA: u8 = 1 << 2;
/// FLG bit: a zero-terminated file name follows.
const FNAME: u8 = 1 << 3;
/// FLG bit: a zero-terminated comment follows.
const FCOMMENT: u8 = 1 << 4;

/// Compress data into the gzip format.
///
/// The header carries no timestamp or file name; XFL declares maximum
/// compression and the OS field follows Unix conventions.
///
/// # Example
///
/// ```
/// use oxipress_deflate::gzip::{gzip_compress, gzip_decompress};
/// use oxipress_deflate::Options;
///
/// let data = b"Hello, World! Hello, World!";
/// let compressed = gzip_compress(&Options::with_iterations(5), data).unwrap();
/// let decompressed = gzip_decompress(&compressed).unwrap();
/// assert_eq!(decompressed, data);
/// ```
pub fn gzip_compress(options: &Options, input: &[u8]) -> Result<Vec<u8>> {
    let mut writer = BitWriter::new();
    deflate(options, input, &mut writer)?;
    let body = writer.finish()?.into_vec();

    let mut output = Vec::with_capacity(18 + body.len());
    output.extend_from_slice(&[0x1f, 0x8b]); // ID1, ID2
    output.push(8); // CM: DEFLATE
    output.push(0); // FLG
    output.extend_from_slice(&[0, 0, 0, 0]); // MTIME: not set
    output.push(2); // XFL: slowest compression
    output.push(3); // OS: Unix
    output.extend_from_slice(&body);
    output.extend_from_slice(&Crc32::compute(input).to_le_bytes());
    // ISIZE is the input length modulo 2^32.
    output.extend_from_slice(&(input.len() as u32).to_le_bytes());

    Ok(output)
}

/// Decompress gzip format data, verifying the CRC-32 and length trailer.
pub fn gzip_decompress(input: &[u8]) -> Result<Vec<u8>> {
    if input.len() < 18 {
        return Err(OxiPressError::invalid_header("gzip data too short"));
    }
    if input[0] != 0x1f || input[1] != 0x8b {
        return Err(OxiPressError::invalid_header("not a gzip stream"));
    }
    if input[2] != 8 {
        return Err(OxiPressError::invalid_header(
            "unsupported compression method",
        ));
    }
    let flg = input[3];
    if flg & 0xE0 != 0 {
        return Err(OxiPressError::invalid_header("reserved flag bits set"));
    }

    // MTIME, XFL and OS carry nothing the decoder needs.
    let data_end = input.len() - 8;
    let mut pos = 10usize;

    if flg & FEXTRA != 0 {
        if pos + 2 > data_end {
            return Err(OxiPressError::unexpected_eof(2));
        }
        let xlen = u16::from_le_bytes([input[pos], input[pos + 1]]) as usize;
        pos += 2 + xlen;
        if pos > data_end {
            return Err(OxiPressError::unexpected_eof(pos - data_end));
        }
    }
    if flg & FNAME != 0 {
        pos = skip_zero_terminated(input, pos, data_end, "file name")?;
    }
    if flg & FCOMMENT != 0 {
        pos = skip_zero_terminated(input, pos, data_end, "comment")?;
    }
    if flg & FHCRC != 0 {
        if pos + 2 > data_end {
            return Err(OxiPressError::unexpected_eof(2));
        }
        // CRC16 of the header: the low half of its CRC-32.
        let stored = u32::from(u16::from_le_bytes([input[pos], input[pos + 1]]));
        let computed = Crc32::compute(&input[..pos]) & 0xFFFF;
        if stored != computed {
            return Err(OxiPressError::checksum_mismatch(stored, computed));
        }
        pos += 2;
    }

    let decompressed = inflate(&input[pos..data_end])?;

    let stored_crc = u32::from_le_bytes([
        input[data_end],
        input[data_end + 1],
        input[data_end + 2],
        input[data_end + 3],
    ]);
    let computed_crc = Crc32::compute(&decompressed);
    if stored_crc != computed_crc {
        return Err(OxiPressError::checksum_mismatch(stored_crc, computed_crc));
    }

    let stored_isize = u32::from_le_bytes([
        input[data_end + 4],
        input[data_end + 5],
        input[data_end + 6],
        input[data_end + 7],
    ]);
    // ISIZE is modulo 2^32, which the cast reproduces.
    if stored_isize != decompressed.len() as u32 {
        return Err(OxiPressError::corrupted(
            (data_end + 4) as u64,
            format!(
                "length mismatch: trailer says {stored_isize}, got {}",
                decompressed.len()
            ),
        ));
    }

    Ok(decompressed)
}

/// Skip a zero-terminated header field starting at `pos`; returns the
/// position just past the terminator.
fn skip_zero_terminated(
    input: &[u8],
    pos: usize,
    data_end: usize,
    what: &str,
) -> Result<usize> {
    match input[pos..data_end].iter().position(|&b| b == 0) {
        Some(nul) => Ok(pos + nul + 1),
        None => Err(OxiPressError::corrupted(
            pos as u64,
            format!("unterminated {what} field"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gzip_header_bytes() {
        let compressed = gzip_compress(&Options::with_iterations(1), b"test").unwrap();
        assert_eq!(&compressed[..4], &[0x1f, 0x8b, 8, 0]);
        assert_eq!(&compressed[4..8], &[0, 0, 0, 0]); // MTIME
        assert_eq!(compressed[8], 2); // XFL
        assert_eq!(compressed[9], 3); // OS
    }

    #[test]
    fn test_gzip_trailer() {
        let data = b"trailer check data";
        let compressed = gzip_compress(&Options::with_iterations(1), data).unwrap();
        let n = compressed.len();
        let crc = u32::from_le_bytes(compressed[n - 8..n - 4].try_into().unwrap());
        let isize = u32::from_le_bytes(compressed[n - 4..].try_into().unwrap());
        assert_eq!(crc, Crc32::compute(data));
        assert_eq!(isize, data.len() as u32);
    }

    #[test]
    fn test_gzip_roundtrip_simple() {
        let data = b"Hello, World!";
        let compressed = gzip_compress(&Options::with_iterations(3), data).unwrap();
        let decompressed = gzip_decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_gzip_roundtrip_empty() {
        let compressed = gzip_compress(&Options::with_iterations(1), b"").unwrap();
        assert!(gzip_decompress(&compressed).unwrap().is_empty());
    }

    #[test]
    fn test_gzip_roundtrip_large() {
        let data: Vec<u8> = (0..20000).map(|i| (i / 7 % 256) as u8).collect();
        let compressed = gzip_compress(&Options::with_iterations(2), &data).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(gzip_decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn test_gzip_crc_verification() {
        let data = b"Test data for checksum";
        let mut compressed = gzip_compress(&Options::with_iterations(2), data).unwrap();
        let n = compressed.len();
        compressed[n - 6] ^= 0xFF; // inside the CRC field
        let err = gzip_decompress(&compressed).unwrap_err();
        assert!(matches!(err, OxiPressError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_gzip_isize_verification() {
        let data = b"Test data for length";
        let mut compressed = gzip_compress(&Options::with_iterations(2), data).unwrap();
        let n = compressed.len();
        compressed[n - 1] ^= 0xFF; // inside the ISIZE field
        let err = gzip_decompress(&compressed).unwrap_err();
        assert!(matches!(err, OxiPressError::CorruptedData { .. }));
    }

    #[test]
    fn test_gzip_optional_header_fields() {
        // Rebuild a stream with FEXTRA, FNAME, FCOMMENT and FHCRC set, the
        // way other gzip writers might produce it.
        let data = b"payload with optional header fields";
        let compressed = gzip_compress(&Options::with_iterations(1), data).unwrap();
        let body = &compressed[10..];

        let mut fancy = vec![0x1f, 0x8b, 8, FHCRC | FEXTRA | FNAME | FCOMMENT];
        fancy.extend_from_slice(&[1, 2, 3, 4]); // MTIME
        fancy.push(0); // XFL
        fancy.push(255); // OS: unknown
        fancy.extend_from_slice(&4u16.to_le_bytes()); // XLEN
        fancy.extend_from_slice(b"ABCD"); // extra field
        fancy.extend_from_slice(b"file.txt\0");
        fancy.extend_from_slice(b"a comment\0");
        let crc16 = (Crc32::compute(&fancy) & 0xFFFF) as u16;
        fancy.extend_from_slice(&crc16.to_le_bytes());
        fancy.extend_from_slice(body);

        assert_eq!(gzip_decompress(&fancy).unwrap(), data);
    }

    #[test]
    fn test_gzip_bad_header_crc() {
        let data = b"payload";
        let compressed = gzip_compress(&Options::with_iterations(1), data).unwrap();
        let body = &compressed[10..];

        let mut fancy = vec![0x1f, 0x8b, 8, FHCRC];
        fancy.extend_from_slice(&[0, 0, 0, 0]);
        fancy.push(0);
        fancy.push(3);
        let crc16 = ((Crc32::compute(&fancy) & 0xFFFF) as u16) ^ 0x5555;
        fancy.extend_from_slice(&crc16.to_le_bytes());
        fancy.extend_from_slice(body);

        let err = gzip_decompress(&fancy).unwrap_err();
        assert!(matches!(err, OxiPressError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_gzip_rejects_garbage() {
        assert!(gzip_decompress(b"").is_err());
        assert!(gzip_decompress(&[0x1f; 20]).is_err());
        let mut wrong_cm = gzip_compress(&Options::with_iterations(1), b"x").unwrap();
        wrong_cm[2] = 9;
        assert!(gzip_decompress(&wrong_cm).is_err());
    }

    #[test]
    fn test_gzip_unterminated_name() {
        let mut fancy = vec![0x1f, 0x8b, 8, FNAME];
        fancy.extend_from_slice(&[0, 0, 0, 0, 0, 3]);
        fancy.extend_from_slice(b"never terminated");
        fancy.extend_from_slice(&[0xFF; 8]); // pretend trailer
        let err = gzip_decompress(&fancy).unwrap_err();
        assert!(matches!(err, OxiPressError::CorruptedData { .. }));
    }
}
