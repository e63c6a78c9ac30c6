//! DEFLATE decompression, the decode-side oracle for round-trip tests.
//!
//! Handles all three RFC 1951 block types (stored, fixed Huffman, dynamic
//! Huffman) but favors clear validation over speed: every back-reference is
//! checked against the bytes actually produced so far, and malformed
//! streams fail with an error naming what was wrong and roughly where.

use crate::huffman::{HuffmanTree, CODELEN_ALPHABET_SIZE, END_OF_BLOCK};
use crate::tables::{
    decode_distance, decode_length, fixed_distance_tree, fixed_litlen_tree, CODE_LENGTH_ORDER,
    DISTANCE_EXTRA_BITS, LENGTH_EXTRA_BITS,
};
use oxipress_core::bitstream::BitReader;
use oxipress_core::error::{OxiPressError, Result};
use std::io::{Cursor, Read};

/// Decompress a complete raw DEFLATE stream.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut reader = BitReader::new(Cursor::new(data));
    let mut output = Vec::new();

    loop {
        let is_final = reader.read_bit()?;
        match reader.read_bits(2)? {
            0 => copy_stored(&mut reader, &mut output)?,
            1 => decode_block(
                &mut reader,
                fixed_litlen_tree()?,
                fixed_distance_tree()?,
                &mut output,
            )?,
            2 => {
                let (litlen_tree, dist_tree) = decode_dynamic_trees(&mut reader)?;
                decode_block(&mut reader, &litlen_tree, &dist_tree, &mut output)?;
            }
            _ => {
                return Err(OxiPressError::invalid_header("reserved DEFLATE block type"));
            }
        }
        if is_final {
            break;
        }
    }
    Ok(output)
}

/// Copy a stored block straight into the output.
fn copy_stored<R: Read>(reader: &mut BitReader<R>, output: &mut Vec<u8>) -> Result<()> {
    // LEN and NLEN sit at the next byte boundary.
    reader.align_to_byte();
    let len = reader.read_bits(16)? as usize;
    let nlen = reader.read_bits(16)? as usize;
    if len + nlen != 0xFFFF {
        return Err(OxiPressError::corrupted(
            reader.bit_position() / 8,
            format!("stored length {len} and its complement disagree"),
        ));
    }

    let start = output.len();
    output.resize(start + len, 0);
    reader.read_bytes(&mut output[start..])?;
    Ok(())
}

/// Read the dynamic block header and build both trees from it.
fn decode_dynamic_trees<R: Read>(
    reader: &mut BitReader<R>,
) -> Result<(HuffmanTree, HuffmanTree)> {
    let hlit = reader.read_bits(5)? as usize + 257;
    let hdist = reader.read_bits(5)? as usize + 1;
    let hclen = reader.read_bits(4)? as usize + 4;

    if hlit > 286 || hdist > 30 {
        return Err(OxiPressError::corrupted(
            reader.bit_position() / 8,
            format!("header declares {hlit} litlen and {hdist} distance codes"),
        ));
    }

    // Code length code lengths arrive in their own scrambled order.
    let mut codelen_lengths = [0u8; CODELEN_ALPHABET_SIZE];
    for &slot in &CODE_LENGTH_ORDER[..hclen] {
        codelen_lengths[slot] = reader.read_bits(3)? as u8;
    }
    let codelen_tree = HuffmanTree::from_code_lengths(&codelen_lengths)?;

    // The litlen and distance lengths are run-length coded as one sequence,
    // so a repeat may span the boundary between them.
    let mut lengths = vec![0u8; hlit + hdist];
    let mut filled = 0;
    while filled < lengths.len() {
        let sym = codelen_tree.decode(reader)?;
        let (value, run) = match sym {
            0..=15 => (sym as u8, 1),
            16 => {
                if filled == 0 {
                    return Err(OxiPressError::corrupted(
                        reader.bit_position() / 8,
                        "repeat code with no previous length",
                    ));
                }
                (lengths[filled - 1], reader.read_bits(2)? as usize + 3)
            }
            17 => (0, reader.read_bits(3)? as usize + 3),
            18 => (0, reader.read_bits(7)? as usize + 11),
            _ => return Err(OxiPressError::invalid_huffman(reader.bit_position())),
        };
        if filled + run > lengths.len() {
            return Err(OxiPressError::corrupted(
                reader.bit_position() / 8,
                "length repeat runs past the declared code count",
            ));
        }
        lengths[filled..filled + run].fill(value);
        filled += run;
    }

    let litlen_tree = HuffmanTree::from_code_lengths(&lengths[..hlit])?;
    let dist_tree = HuffmanTree::from_code_lengths(&lengths[hlit..])?;
    Ok((litlen_tree, dist_tree))
}

/// Decode one block's symbols until the end-of-block marker.
fn decode_block<R: Read>(
    reader: &mut BitReader<R>,
    litlen_tree: &HuffmanTree,
    dist_tree: &HuffmanTree,
    output: &mut Vec<u8>,
) -> Result<()> {
    loop {
        let symbol = litlen_tree.decode(reader)?;
        match symbol {
            0..=255 => output.push(symbol as u8),
            END_OF_BLOCK => return Ok(()),
            257..=285 => {
                let extra = reader.read_bits(LENGTH_EXTRA_BITS[(symbol - 257) as usize])?;
                let length = decode_length(symbol, extra as u16);

                let dsym = dist_tree.decode(reader)?;
                if dsym >= 30 {
                    return Err(OxiPressError::corrupted(
                        reader.bit_position() / 8,
                        format!("distance code {dsym} outside the distance alphabet"),
                    ));
                }
                let dextra = reader.read_bits(DISTANCE_EXTRA_BITS[dsym as usize])?;
                let distance = decode_distance(dsym, dextra as u16);

                copy_backref(output, distance as usize, length as usize)?;
            }
            _ => {
                return Err(OxiPressError::corrupted(
                    reader.bit_position() / 8,
                    format!("literal/length code {symbol} outside the alphabet"),
                ));
            }
        }
    }
}

/// Append `length` bytes starting `distance` back in the output.
///
/// The source may overlap the bytes being appended; copying byte by byte
/// makes an overlapping reference repeat what it just produced, as the
/// format requires.
fn copy_backref(output: &mut Vec<u8>, distance: usize, length: usize) -> Result<()> {
    if distance == 0 || distance > output.len() {
        return Err(OxiPressError::invalid_distance(distance, output.len()));
    }

    let mut src = output.len() - distance;
    output.reserve(length);
    for _ in 0..length {
        let byte = output[src];
        output.push(byte);
        src += 1;
    }
    Ok(())
}
