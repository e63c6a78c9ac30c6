//! DEFLATE symbol alphabets (RFC 1951 section 3.2.5).
//!
//! Match lengths 3..=258 and distances 1..=32768 are not coded directly;
//! each maps to a symbol whose code is followed by a fixed number of extra
//! bits selecting the exact value within the symbol's range. This module
//! holds the base-value and extra-bit tables for both alphabets, the
//! conversions in both directions, and the fixed Huffman code of section
//! 3.2.6.

use crate::huffman::HuffmanTree;
use oxipress_core::error::Result;
use std::sync::OnceLock;

/// First length value of each length code 257..=285.
pub const LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, // codes 257-264, no extra bits
    11, 13, 15, 17, // codes 265-268, 1 extra bit
    19, 23, 27, 31, // codes 269-272, 2 extra bits
    35, 43, 51, 59, // codes 273-276, 3 extra bits
    67, 83, 99, 115, // codes 277-280, 4 extra bits
    131, 163, 195, 227, // codes 281-284, 5 extra bits
    258, // code 285 stands for length 258 alone
];

/// Extra bits carried by each length code 257..=285.
pub const LENGTH_EXTRA_BITS: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, //
    1, 1, 1, 1, //
    2, 2, 2, 2, //
    3, 3, 3, 3, //
    4, 4, 4, 4, //
    5, 5, 5, 5, //
    0,
];

/// First distance value of each distance code 0..=29.
pub const DISTANCE_BASE: [u16; 30] = [
    1, 2, 3, 4, // codes 0-3, no extra bits
    5, 7, // codes 4-5, 1 extra bit
    9, 13, // codes 6-7, 2 extra bits
    17, 25, // codes 8-9, 3 extra bits
    33, 49, // codes 10-11, 4 extra bits
    65, 97, // codes 12-13, 5 extra bits
    129, 193, // codes 14-15, 6 extra bits
    257, 385, // codes 16-17, 7 extra bits
    513, 769, // codes 18-19, 8 extra bits
    1025, 1537, // codes 20-21, 9 extra bits
    2049, 3073, // codes 22-23, 10 extra bits
    4097, 6145, // codes 24-25, 11 extra bits
    8193, 12289, // codes 26-27, 12 extra bits
    16385, 24577, // codes 28-29, 13 extra bits
];

/// Extra bits carried by each distance code 0..=29.
pub const DISTANCE_EXTRA_BITS: [u8; 30] = [
    0, 0, 0, 0, //
    1, 1, //
    2, 2, //
    3, 3, //
    4, 4, //
    5, 5, //
    6, 6, //
    7, 7, //
    8, 8, //
    9, 9, //
    10, 10, //
    11, 11, //
    12, 12, //
    13, 13,
];

/// Transmission order of the code length code lengths in a dynamic block
/// header (RFC 1951 section 3.2.7). Ordered so that the most commonly
/// omitted entries come last and the header can be truncated.
pub const CODE_LENGTH_ORDER: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

/// Length code offset (code minus 257) for every match length, indexed by
/// `length - 3`. Derived from [`LENGTH_BASE`] at compile time so the two
/// cannot drift apart.
const LENGTH_CODE_OFFSET: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let length = i as u16 + 3;
        let mut code = 0;
        while code + 1 < LENGTH_BASE.len() && LENGTH_BASE[code + 1] <= length {
            code += 1;
        }
        table[i] = code as u8;
        i += 1;
    }
    table
};

/// Convert a match length (3..=258) to its length code, extra bit count,
/// and extra bit value.
pub fn length_to_code(length: u16) -> (u16, u8, u16) {
    debug_assert!(
        (3..=258).contains(&length),
        "length out of range: {}",
        length
    );

    let idx = usize::from(LENGTH_CODE_OFFSET[usize::from(length) - 3]);
    (
        257 + idx as u16,
        LENGTH_EXTRA_BITS[idx],
        length - LENGTH_BASE[idx],
    )
}

/// Convert a match distance (1..=32768) to its distance code, extra bit
/// count, and extra bit value.
pub fn distance_to_code(distance: u16) -> (u16, u8, u16) {
    debug_assert!(
        (1..=32768).contains(&distance),
        "distance out of range: {}",
        distance
    );

    // Codes 0..=3 are the distances 1..=4 themselves. From there on, code
    // 2l+r covers the distances whose predecessor d = distance - 1 has bit
    // length l + 1 with r as the bit below the top one, so the code falls
    // out of the bit pattern directly.
    let code = if distance < 5 {
        usize::from(distance) - 1
    } else {
        let d = u32::from(distance) - 1;
        let l = 31 - d.leading_zeros();
        let r = (d >> (l - 1)) & 1;
        (l * 2 + r) as usize
    };

    (
        code as u16,
        DISTANCE_EXTRA_BITS[code],
        distance - DISTANCE_BASE[code],
    )
}

/// Recover a match length from a length code and its extra bit value.
pub fn decode_length(code: u16, extra: u16) -> u16 {
    debug_assert!((257..=285).contains(&code), "invalid length code: {}", code);
    LENGTH_BASE[usize::from(code - 257)] + extra
}

/// Recover a match distance from a distance code and its extra bit value.
pub fn decode_distance(code: u16, extra: u16) -> u16 {
    debug_assert!(code < 30, "invalid distance code: {}", code);
    DISTANCE_BASE[usize::from(code)] + extra
}

/// Code lengths of the fixed literal/length code (RFC 1951 section 3.2.6):
/// 8 bits for 0..=143 and 280..=287, 9 bits for 144..=255, 7 bits for
/// 256..=279.
pub fn fixed_litlen_lengths() -> [u8; 288] {
    let mut lengths = [8u8; 288];
    lengths[144..256].fill(9);
    lengths[256..280].fill(7);
    lengths
}

/// Code lengths of the fixed distance code: 5 bits for all 30 codes.
pub fn fixed_distance_lengths() -> [u8; 30] {
    [5u8; 30]
}

/// The fixed literal/length decode tree, built once and cached.
pub fn fixed_litlen_tree() -> Result<&'static HuffmanTree> {
    static TREE: OnceLock<HuffmanTree> = OnceLock::new();

    Ok(TREE.get_or_init(|| {
        HuffmanTree::from_code_lengths(&fixed_litlen_lengths())
            .expect("the fixed litlen code lengths form a valid code")
    }))
}

/// The fixed distance decode tree, built once and cached.
pub fn fixed_distance_tree() -> Result<&'static HuffmanTree> {
    static TREE: OnceLock<HuffmanTree> = OnceLock::new();

    Ok(TREE.get_or_init(|| {
        HuffmanTree::from_code_lengths(&fixed_distance_lengths())
            .expect("the fixed distance code lengths form a valid code")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_code_roundtrip_exhaustive() {
        let mut prev_code = 256;
        for length in 3..=258u16 {
            let (code, extra_bits, extra_value) = length_to_code(length);
            assert!((257..=285).contains(&code), "code {} for length {}", code, length);
            assert!(code >= prev_code, "codes must be nondecreasing in length");
            assert!(
                u32::from(extra_value) < (1u32 << extra_bits),
                "extra value {} does not fit in {} bits",
                extra_value,
                extra_bits
            );
            assert_eq!(decode_length(code, extra_value), length);
            prev_code = code;
        }
    }

    #[test]
    fn test_distance_code_roundtrip_exhaustive() {
        let mut prev_code = 0;
        for distance in 1..=32768u16 {
            let (code, extra_bits, extra_value) = distance_to_code(distance);
            assert!(code < 30, "code {} for distance {}", code, distance);
            assert!(code >= prev_code, "codes must be nondecreasing in distance");
            assert_eq!(extra_bits, DISTANCE_EXTRA_BITS[usize::from(code)]);
            assert_eq!(decode_distance(code, extra_value), distance);
            prev_code = code;
        }
    }

    #[test]
    fn test_known_length_codes() {
        assert_eq!(length_to_code(3), (257, 0, 0));
        assert_eq!(length_to_code(10), (264, 0, 0));
        assert_eq!(length_to_code(11), (265, 1, 0));
        assert_eq!(length_to_code(12), (265, 1, 1));
        assert_eq!(length_to_code(257), (284, 5, 30));
        assert_eq!(length_to_code(258), (285, 0, 0));
    }

    #[test]
    fn test_known_distance_codes() {
        assert_eq!(distance_to_code(1), (0, 0, 0));
        assert_eq!(distance_to_code(4), (3, 0, 0));
        assert_eq!(distance_to_code(5), (4, 1, 0));
        assert_eq!(distance_to_code(6), (4, 1, 1));
        assert_eq!(distance_to_code(7), (5, 1, 0));
        assert_eq!(distance_to_code(24577), (29, 13, 0));
        assert_eq!(distance_to_code(32768), (29, 13, 8191));
    }

    #[test]
    fn test_length_offset_table_matches_bases() {
        // Every length must land in the code whose base range contains it.
        for (idx, &base) in LENGTH_BASE.iter().enumerate() {
            let (code, _, extra) = length_to_code(base);
            assert_eq!(usize::from(code - 257), idx);
            assert_eq!(extra, 0, "a base length carries no extra value");
        }
    }

    #[test]
    fn test_fixed_litlen_length_bands() {
        let lengths = fixed_litlen_lengths();
        assert!(lengths[..144].iter().all(|&l| l == 8));
        assert!(lengths[144..256].iter().all(|&l| l == 9));
        assert!(lengths[256..280].iter().all(|&l| l == 7));
        assert!(lengths[280..].iter().all(|&l| l == 8));
    }

    #[test]
    fn test_fixed_distance_lengths_uniform() {
        assert!(fixed_distance_lengths().iter().all(|&l| l == 5));
    }

    #[test]
    fn test_fixed_trees_build() {
        assert!(fixed_litlen_tree().is_ok());
        assert!(fixed_distance_tree().is_ok());
    }
}
