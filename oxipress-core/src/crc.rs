//! CRC-32 (ISO 3309, reflected polynomial `0xEDB88320`) for the gzip
//! container trailer.
//!
//! The hot path is slicing-by-8: eight precomputed tables let one step
//! absorb eight input bytes with eight independent lookups instead of a
//! serial table walk per byte. Tails and short inputs use the classic
//! byte-at-a-time table, which is `TABLES[0]`.
//!
//! The SSE4.2 `crc32` instruction is no help here; it hardwires the
//! Castagnoli polynomial, not the one gzip uses.

const POLYNOMIAL: u32 = 0xEDB8_8320;

/// `TABLES[0][b]` advances a CRC by the byte `b`; `TABLES[k][b]` advances
/// it by `b` followed by `k` zero bytes.
static TABLES: [[u32; 256]; 8] = build_tables();

const fn build_tables() -> [[u32; 256]; 8] {
    let mut tables = [[0u32; 256]; 8];
    let mut n = 0;
    while n < 256 {
        let mut crc = n as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 == 1 {
                (crc >> 1) ^ POLYNOMIAL
            } else {
                crc >> 1
            };
            bit += 1;
        }
        tables[0][n] = crc;
        n += 1;
    }
    let mut k = 1;
    while k < 8 {
        let mut n = 0;
        while n < 256 {
            let prev = tables[k - 1][n];
            tables[k][n] = (prev >> 8) ^ tables[0][(prev & 0xFF) as usize];
            n += 1;
        }
        k += 1;
    }
    tables
}

/// Streaming CRC-32 over the gzip polynomial.
///
/// Parameters are the ones ZIP, gzip, and PNG all agree on: initial value
/// `0xFFFF_FFFF`, reflected input and output, final XOR with `0xFFFF_FFFF`.
///
/// # Example
///
/// ```
/// use oxipress_core::crc::Crc32;
///
/// let mut crc = Crc32::new();
/// crc.update(b"Hello, ");
/// crc.update(b"World!");
/// assert_eq!(crc.finalize(), 0xEC4AC3D0);
/// ```
#[derive(Debug, Clone)]
pub struct Crc32 {
    state: u32,
}

impl Crc32 {
    /// Start a new checksum.
    pub fn new() -> Self {
        Self { state: u32::MAX }
    }

    /// Absorb `data` into the checksum.
    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        let mut crc = self.state;

        let mut blocks = data.chunks_exact(8);
        for block in &mut blocks {
            let low = crc ^ u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
            crc = TABLES[7][(low & 0xFF) as usize]
                ^ TABLES[6][((low >> 8) & 0xFF) as usize]
                ^ TABLES[5][((low >> 16) & 0xFF) as usize]
                ^ TABLES[4][(low >> 24) as usize]
                ^ TABLES[3][block[4] as usize]
                ^ TABLES[2][block[5] as usize]
                ^ TABLES[1][block[6] as usize]
                ^ TABLES[0][block[7] as usize];
        }
        for &byte in blocks.remainder() {
            crc = (crc >> 8) ^ TABLES[0][((crc ^ u32::from(byte)) & 0xFF) as usize];
        }

        self.state = crc;
    }

    /// Finish and return the checksum.
    #[inline]
    pub fn finalize(self) -> u32 {
        !self.state
    }

    /// One-shot checksum of `data`.
    #[inline]
    pub fn compute(data: &[u8]) -> u32 {
        let mut crc = Self::new();
        crc.update(data);
        crc.finalize()
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_value() {
        // The standard check input for CRC-32/ISO-HDLC.
        assert_eq!(Crc32::compute(b"123456789"), 0xCBF43926);
    }

    #[test]
    fn test_empty_input_is_zero() {
        assert_eq!(Crc32::compute(b""), 0);
    }

    #[test]
    fn test_zero_run_known_value() {
        // 32 zero bytes, same vector the kernel's crc32 selftest uses.
        assert_eq!(Crc32::compute(&[0u8; 32]), 0x190A55AD);
    }

    #[test]
    fn test_byte_table_entries() {
        assert_eq!(TABLES[0][0], 0);
        assert_eq!(TABLES[0][1], 0x77073096);
        assert_eq!(TABLES[0][255], 0x2D02EF8D);
    }

    #[test]
    fn test_slice_tables_extend_byte_table() {
        // TABLES[k] must equal "TABLES[k-1], then one zero byte".
        for k in 1..8 {
            for n in 0..256 {
                let prev = TABLES[k - 1][n];
                let expected = (prev >> 8) ^ TABLES[0][(prev & 0xFF) as usize];
                assert_eq!(TABLES[k][n], expected, "table {} entry {}", k, n);
            }
        }
    }

    #[test]
    fn test_split_updates_match_one_shot() {
        let data: Vec<u8> = (0..257u32).map(|i| (i * 31 % 251) as u8).collect();
        let whole = Crc32::compute(&data);
        for split in [0, 1, 7, 8, 9, 16, 100, data.len()] {
            let (a, b) = data.split_at(split);
            let mut crc = Crc32::new();
            crc.update(a);
            crc.update(b);
            assert_eq!(crc.finalize(), whole, "split at {}", split);
        }
    }

    #[test]
    fn test_sizes_around_block_boundary() {
        // Byte-at-a-time updates must agree with the sliced path at every
        // size near the 8-byte block boundary.
        for size in [1, 7, 8, 9, 15, 16, 17, 64, 255] {
            let data = vec![size as u8; size];
            let sliced = Crc32::compute(&data);
            let mut bytewise = Crc32::new();
            for &b in &data {
                bytewise.update(&[b]);
            }
            assert_eq!(bytewise.finalize(), sliced, "size {}", size);
        }
    }
}
