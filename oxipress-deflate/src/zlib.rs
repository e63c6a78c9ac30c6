//! Zlib container (RFC 1950): 2-byte header, DEFLATE stream, Adler-32
//! trailer.
//!
//! The header declares the compression method and window size and carries
//! check bits making the first two bytes divisible by 31; the trailer is
//! the Adler-32 checksum of the uncompressed data, stored big-endian.
//! Since this encoder always uses the full 32 KiB window at maximum
//! effort, the header is the constant `78 DA`.

use crate::deflate::deflate;
use crate::inflate::inflate;
use crate::options::Options;
use oxipress_core::bitstream::BitWriter;
use oxipress_core::error::{OxiPressError, Result};

/// Largest prime below 2^16; both Adler-32 sums are kept modulo this.
const ADLER_MOD: u32 = 65521;

/// Longest run of bytes the sums can absorb before a reduction is needed
/// to keep `s2` from overflowing u32.
const NMAX: usize = 5552;

/// Streaming Adler-32, the checksum of the zlib format.
///
/// Weaker than CRC-32 against random corruption but cheaper to compute.
/// `s1` is one plus the byte sum and `s2` the running sum of `s1`,
/// following the naming in RFC 1950.
#[derive(Clone, Debug)]
pub struct Adler32 {
    s1: u32,
    s2: u32,
}

impl Adler32 {
    /// Start a new checksum.
    pub fn new() -> Self {
        Self { s1: 1, s2: 0 }
    }

    /// Absorb `data` into the checksum.
    pub fn update(&mut self, data: &[u8]) {
        // Reducing once per NMAX-byte chunk keeps both sums in u32 range.
        for chunk in data.chunks(NMAX) {
            for &byte in chunk {
                self.s1 += u32::from(byte);
                self.s2 += self.s1;
            }
            self.s1 %= ADLER_MOD;
            self.s2 %= ADLER_MOD;
        }
    }

    /// The checksum of everything absorbed so far.
    pub fn finish(&self) -> u32 {
        (self.s2 << 16) | self.s1
    }

    /// One-shot checksum of `data`.
    pub fn checksum(data: &[u8]) -> u32 {
        let mut adler = Self::new();
        adler.update(data);
        adler.finish()
    }
}

impl Default for Adler32 {
    fn default() -> Self {
        Self::new()
    }
}

/// Compress data into the zlib format.
///
/// The header always declares a 32KB window and maximum compression
/// (bytes `78 DA`), which matches what this encoder produces.
///
/// # Example
///
/// ```
/// use oxipress_deflate::zlib::{zlib_compress, zlib_decompress};
/// use oxipress_deflate::Options;
///
/// let data = b"the quick brown fox jumps over the lazy dog";
/// let packed = zlib_compress(&Options::with_iterations(5), data).unwrap();
/// assert_eq!(zlib_decompress(&packed).unwrap(), data);
/// ```
pub fn zlib_compress(options: &Options, input: &[u8]) -> Result<Vec<u8>> {
    let mut writer = BitWriter::new();
    deflate(options, input, &mut writer)?;
    let body = writer.finish()?.into_vec();

    let cmf: u32 = 0x78; // CM=8 (DEFLATE), CINFO=7 (32KB window)
    let fdict: u32 = 0;
    let flevel: u32 = 3; // maximum compression
    let mut cmfflg = 256 * cmf + fdict * 32 + flevel * 64;
    cmfflg += 31 - cmfflg % 31;

    let mut output = Vec::with_capacity(6 + body.len());
    output.push((cmfflg >> 8) as u8);
    output.push(cmfflg as u8);
    output.extend_from_slice(&body);
    output.extend_from_slice(&Adler32::checksum(input).to_be_bytes());

    Ok(output)
}

/// Decompress zlib format data, verifying the header and the Adler-32
/// checksum.
pub fn zlib_decompress(input: &[u8]) -> Result<Vec<u8>> {
    // Header (2 bytes) plus trailer (4 bytes) around the DEFLATE stream.
    if input.len() < 6 {
        return Err(OxiPressError::invalid_header("zlib data too short"));
    }

    let header = u16::from(input[0]) * 256 + u16::from(input[1]);
    if header % 31 != 0 {
        return Err(OxiPressError::invalid_header("zlib header check failed"));
    }
    if input[0] & 0x0F != 8 {
        return Err(OxiPressError::invalid_header(
            "compression method is not DEFLATE",
        ));
    }
    if input[0] >> 4 > 7 {
        return Err(OxiPressError::invalid_header(
            "window size larger than 32KB",
        ));
    }
    if input[1] & 0x20 != 0 {
        return Err(OxiPressError::invalid_header(
            "preset dictionaries are not supported",
        ));
    }

    let (stream, trailer) = input[2..].split_at(input.len() - 6);
    let decompressed = inflate(stream)?;

    let stored = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let computed = Adler32::checksum(&decompressed);
    if stored != computed {
        return Err(OxiPressError::checksum_mismatch(stored, computed));
    }

    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adler_of_nothing_is_one() {
        assert_eq!(Adler32::checksum(b""), 1);
    }

    #[test]
    fn test_adler_known_value() {
        // The worked example from the Adler-32 description.
        assert_eq!(Adler32::checksum(b"Wikipedia"), 0x11E6_0398);
    }

    #[test]
    fn test_adler_split_updates_match_one_shot() {
        let data = b"split me anywhere and the sums must not care";
        let whole = Adler32::checksum(data);
        for split in [0, 1, 5, data.len() / 2, data.len()] {
            let mut adler = Adler32::new();
            adler.update(&data[..split]);
            adler.update(&data[split..]);
            assert_eq!(adler.finish(), whole, "split at {}", split);
        }
    }

    #[test]
    fn test_adler_chunked_reduction_matches_definition() {
        // Crosses NMAX so the periodic reduction runs; compare against the
        // plain definition computed in u64 where overflow is impossible.
        let data: Vec<u8> = (0..6000u32).map(|i| (i * 7 % 256) as u8).collect();
        let mut a = 1u64;
        let mut b = 0u64;
        for &byte in &data {
            a += u64::from(byte);
            b += a;
        }
        let expected = (((b % 65521) << 16) | (a % 65521)) as u32;
        assert_eq!(Adler32::checksum(&data), expected);
    }

    #[test]
    fn test_header_declares_max_compression_and_checks_out() {
        let compressed = zlib_compress(&Options::with_iterations(1), b"test").unwrap();
        assert_eq!(&compressed[..2], &[0x78, 0xDA]);
        let check = u16::from(compressed[0]) * 256 + u16::from(compressed[1]);
        assert_eq!(check % 31, 0);
    }

    #[test]
    fn test_roundtrip_payloads() {
        let options = Options::with_iterations(3);
        let large: Vec<u8> = (0..10000u32).map(|i| (i % 256) as u8).collect();
        let payloads: [&[u8]; 4] = [
            b"",
            b"Hello, World!",
            b"AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
            &large,
        ];
        for data in payloads {
            let compressed = zlib_compress(&options, data).unwrap();
            assert_eq!(zlib_decompress(&compressed).unwrap(), data);
        }
    }

    #[test]
    fn test_repetitive_input_shrinks() {
        let data = vec![b'A'; 400];
        let compressed = zlib_compress(&Options::with_iterations(3), &data).unwrap();
        assert!(compressed.len() < data.len());
    }

    #[test]
    fn test_corrupted_trailer_is_detected() {
        let mut compressed = zlib_compress(&Options::with_iterations(2), b"checksummed").unwrap();
        let last = compressed.len() - 1;
        compressed[last] ^= 0xFF;
        let err = zlib_decompress(&compressed).unwrap_err();
        assert!(matches!(err, OxiPressError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_wrong_compression_method_rejected() {
        // CM nibble says 9, with FCHECK recomputed so only the method trips.
        let mut data = [0x79u8, 0, 0, 0, 0, 1];
        data[1] = (31 - (u16::from(data[0]) * 256) % 31) as u8;
        let err = zlib_decompress(&data).unwrap_err();
        assert!(matches!(err, OxiPressError::InvalidHeader { .. }));
    }

    #[test]
    fn test_flipped_check_bits_rejected() {
        let mut compressed = zlib_compress(&Options::with_iterations(1), b"abc").unwrap();
        compressed[1] ^= 0x01;
        assert!(zlib_decompress(&compressed).is_err());
    }

    #[test]
    fn test_preset_dictionary_rejected() {
        let mut compressed = zlib_compress(&Options::with_iterations(1), b"abc").unwrap();
        // Set FDICT and fix up FCHECK so only the dictionary flag trips.
        let cmf = compressed[0];
        let mut flg = compressed[1] | 0x20;
        flg = (flg & 0xE0) | (31 - (u16::from(cmf) * 256 + u16::from(flg & 0xE0)) % 31) as u8;
        compressed[1] = flg;
        let err = zlib_decompress(&compressed).unwrap_err();
        assert!(matches!(err, OxiPressError::InvalidHeader { .. }));
    }

    #[test]
    fn test_truncated_stream_rejected() {
        assert!(zlib_decompress(&[0x78, 0xDA]).is_err());
    }
}
