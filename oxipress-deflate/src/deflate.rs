//! DEFLATE block encoding (RFC 1951).
//!
//! This module turns optimized LZ77 symbol ranges into the final bit
//! stream. For every block it prices all three representations (stored,
//! fixed tree, dynamic tree) exactly and writes the cheapest. Dynamic code
//! lengths are not plain Huffman lengths: the histogram is first reshaped
//! so that the code length sequence compresses better under the header's
//! run-length coding, whenever that reshaping pays for itself.
//!
//! The entry point is [`deflate`], which splits the input into master
//! blocks, optimizes each part, and writes the blocks with the correct
//! final-bit handling.

use crate::blocksplitter::{block_split, block_split_lz77};
use crate::huffman::{
    length_limited_code_lengths, lengths_to_symbols, CODELEN_ALPHABET_SIZE, END_OF_BLOCK,
    MAX_CODE_LENGTH, NUM_DIST_SYMBOLS, NUM_LITLEN_SYMBOLS,
};
use crate::lz77::{BlockState, Lz77Store};
use crate::options::Options;
use crate::squeeze::{lz77_optimal, lz77_optimal_fixed};
use crate::tables::{
    distance_to_code, fixed_litlen_lengths, length_to_code, CODE_LENGTH_ORDER,
    DISTANCE_EXTRA_BITS, LENGTH_EXTRA_BITS,
};
use oxipress_core::bitstream::BitWriter;
use oxipress_core::error::Result;

/// Upper bound on bytes handled by one round of block splitting and
/// optimization. Larger inputs are processed in consecutive parts, each
/// producing complete blocks.
const MASTER_BLOCK_SIZE: usize = 1_000_000;

/// Payload limit of one stored block.
const MAX_STORED_BLOCK: usize = 65535;

/// The three block representations of the format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    /// Uncompressed bytes with a length prefix.
    Stored,
    /// The format's predefined litlen and distance trees.
    Fixed,
    /// Trees transmitted in the block header.
    Dynamic,
}

/// Code lengths from a histogram, bounded by `maxbits`.
fn bit_lengths<const N: usize>(counts: &[usize; N], maxbits: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&length_limited_code_lengths(counts, maxbits));
    out
}

/// The fixed litlen and distance code lengths.
fn fixed_tree() -> ([u8; NUM_LITLEN_SYMBOLS], [u8; NUM_DIST_SYMBOLS]) {
    (fixed_litlen_lengths(), [5u8; NUM_DIST_SYMBOLS])
}

/// Ensure at least two usable distance codes.
///
/// Zero distance codes are legal but break zlib before 1.2.2, and a single
/// code breaks some other inflaters, so dummy length-1 codes are added.
/// Costs a few bits at most.
fn patch_distance_codes_for_buggy_decoders(d_lengths: &mut [u8; NUM_DIST_SYMBOLS]) {
    let mut num_dist_codes = 0;
    // The last two symbols of the alphabet never occur in the format.
    for &length in d_lengths.iter().take(30) {
        if length != 0 {
            num_dist_codes += 1;
        }
        if num_dist_codes >= 2 {
            return;
        }
    }

    if num_dist_codes == 0 {
        d_lengths[0] = 1;
        d_lengths[1] = 1;
    } else if num_dist_codes == 1 {
        let other = if d_lengths[0] != 0 { 1 } else { 0 };
        d_lengths[other] = 1;
    }
}

/// Reshape a histogram so its Huffman code lengths form longer equal runs,
/// which the header's run-length coding rewards. Counts are only nudged
/// towards local averages, so the resulting code stays close to optimal
/// for the data itself.
fn optimize_huffman_for_rle(counts: &mut [usize]) {
    // Leave trailing zeros alone; touching them could add symbols that
    // the format does not allow.
    let mut length = counts.len();
    while length > 0 {
        if counts[length - 1] != 0 {
            break;
        }
        length -= 1;
    }
    if length == 0 {
        return;
    }
    let counts = &mut counts[..length];

    // Mark runs that already encode well: 5+ zeros or 7+ equal nonzeros.
    let mut good_for_rle = vec![false; length];
    {
        let mut symbol = counts[0];
        let mut stride = 0usize;
        for i in 0..=length {
            if i == length || counts[i] != symbol {
                if (symbol == 0 && stride >= 5) || (symbol != 0 && stride >= 7) {
                    for k in 0..stride {
                        good_for_rle[i - k - 1] = true;
                    }
                }
                stride = 1;
                if i != length {
                    symbol = counts[i];
                }
            } else {
                stride += 1;
            }
        }
    }

    // Collapse remaining strides of similar counts to their average.
    let mut stride = 0usize;
    let mut limit = counts[0];
    let mut sum = 0usize;
    for i in 0..=length {
        if i == length || good_for_rle[i] || counts[i].abs_diff(limit) >= 4 {
            if stride >= 4 || (stride >= 3 && sum == 0) {
                let mut count = (sum + stride / 2) / stride;
                if count < 1 {
                    count = 1;
                }
                if sum == 0 {
                    // An all-zero stride must stay zero.
                    count = 0;
                }
                for k in 0..stride {
                    // counts[i] belongs to the next stride already.
                    counts[i - k - 1] = count;
                }
            }
            stride = 0;
            sum = 0;
            if i + 3 < length {
                limit = (counts[i] + counts[i + 1] + counts[i + 2] + counts[i + 3] + 2) / 4;
            } else if i < length {
                limit = counts[i];
            } else {
                limit = 0;
            }
        }
        stride += 1;
        if i != length {
            sum += counts[i];
        }
    }
}

/// One run-length encoding of the code length sequence, ready to write.
struct TreeEncoding {
    /// (symbol, extra bits value) pairs; symbols 16, 17 and 18 carry a
    /// repeat count in the extra bits.
    rle: Vec<(u8, u8)>,
    /// Code lengths for the code length alphabet itself.
    clcl: [u8; CODELEN_ALPHABET_SIZE],
    hlit: usize,
    hdist: usize,
    hclen: usize,
    /// Total size of the encoded header in bits.
    size: usize,
}

/// Run-length encode the litlen and distance code lengths, using only the
/// enabled repeat symbols. Trying all eight combinations and keeping the
/// smallest beats any single heuristic.
fn encode_tree(
    ll_lengths: &[u8; NUM_LITLEN_SYMBOLS],
    d_lengths: &[u8; NUM_DIST_SYMBOLS],
    use_16: bool,
    use_17: bool,
    use_18: bool,
) -> TreeEncoding {
    let mut hlit: usize = 29;
    let mut hdist: usize = 29;
    let mut clcounts = [0usize; CODELEN_ALPHABET_SIZE];
    let mut rle: Vec<(u8, u8)> = Vec::new();

    // Trim trailing zero lengths from both alphabets.
    while hlit > 0 && ll_lengths[257 + hlit - 1] == 0 {
        hlit -= 1;
    }
    while hdist > 0 && d_lengths[1 + hdist - 1] == 0 {
        hdist -= 1;
    }
    let hlit2 = hlit + 257;
    let lld_total = hlit2 + hdist + 1;

    let length_at = |i: usize| {
        if i < hlit2 {
            ll_lengths[i]
        } else {
            d_lengths[i - hlit2]
        }
    };

    let mut i = 0usize;
    while i < lld_total {
        let symbol = length_at(i);
        let mut count: u32 = 1;
        if use_16 || (symbol == 0 && (use_17 || use_18)) {
            let mut j = i + 1;
            while j < lld_total && symbol == length_at(j) {
                count += 1;
                j += 1;
            }
        }
        i += count as usize - 1;

        // Runs of zeros: symbols 18 (11..=138) and 17 (3..=10).
        if symbol == 0 && count >= 3 {
            if use_18 {
                while count >= 11 {
                    let count2 = count.min(138);
                    rle.push((18, (count2 - 11) as u8));
                    clcounts[18] += 1;
                    count -= count2;
                }
            }
            if use_17 {
                while count >= 3 {
                    let count2 = count.min(10);
                    rle.push((17, (count2 - 3) as u8));
                    clcounts[17] += 1;
                    count -= count2;
                }
            }
        }

        // Runs of any symbol: the first occurrence is sent plain, the
        // rest as symbol 16 (repeat previous, 3..=6).
        if use_16 && count >= 4 {
            count -= 1;
            clcounts[symbol as usize] += 1;
            rle.push((symbol, 0));
            while count >= 3 {
                let count2 = count.min(6);
                rle.push((16, (count2 - 3) as u8));
                clcounts[16] += 1;
                count -= count2;
            }
        }

        // Whatever remains is sent plain.
        clcounts[symbol as usize] += count as usize;
        for _ in 0..count {
            rle.push((symbol, 0));
        }

        i += 1;
    }

    let clcl = bit_lengths(&clcounts, 7);

    let mut hclen: usize = 15;
    while hclen > 0 && clcounts[CODE_LENGTH_ORDER[hclen + 4 - 1]] == 0 {
        hclen -= 1;
    }

    let mut size = 14; // hlit, hdist, hclen fields
    size += (hclen + 4) * 3;
    for (&count, &cl) in clcounts.iter().zip(&clcl) {
        size += cl as usize * count;
    }
    size += clcounts[16] * 2;
    size += clcounts[17] * 3;
    size += clcounts[18] * 7;

    TreeEncoding {
        rle,
        clcl,
        hlit,
        hdist,
        hclen,
        size,
    }
}

/// Write an encoded tree header to the bit stream.
fn write_tree(enc: &TreeEncoding, writer: &mut BitWriter) -> Result<()> {
    let clsymbols = lengths_to_symbols(&enc.clcl, 7);

    writer.write_bits(enc.hlit as u32, 5)?;
    writer.write_bits(enc.hdist as u32, 5)?;
    writer.write_bits(enc.hclen as u32, 4)?;

    for &symbol in CODE_LENGTH_ORDER.iter().take(enc.hclen + 4) {
        writer.write_bits(u32::from(enc.clcl[symbol]), 3)?;
    }

    for &(symbol, extra) in &enc.rle {
        writer.write_huffman_code(clsymbols[symbol as usize], enc.clcl[symbol as usize])?;
        match symbol {
            16 => writer.write_bits(u32::from(extra), 2)?,
            17 => writer.write_bits(u32::from(extra), 3)?,
            18 => writer.write_bits(u32::from(extra), 7)?,
            _ => {}
        }
    }
    Ok(())
}

/// Smallest header size over the eight repeat-symbol combinations.
fn calculate_tree_size(
    ll_lengths: &[u8; NUM_LITLEN_SYMBOLS],
    d_lengths: &[u8; NUM_DIST_SYMBOLS],
) -> usize {
    let mut result = usize::MAX;
    for i in 0..8 {
        let enc = encode_tree(ll_lengths, d_lengths, i & 1 != 0, i & 2 != 0, i & 4 != 0);
        result = result.min(enc.size);
    }
    result
}

/// Write the cheapest of the eight tree header encodings.
fn add_dynamic_tree(
    ll_lengths: &[u8; NUM_LITLEN_SYMBOLS],
    d_lengths: &[u8; NUM_DIST_SYMBOLS],
    writer: &mut BitWriter,
) -> Result<()> {
    let mut best = encode_tree(ll_lengths, d_lengths, false, false, false);
    for i in 1..8 {
        let enc = encode_tree(ll_lengths, d_lengths, i & 1 != 0, i & 2 != 0, i & 4 != 0);
        if enc.size < best.size {
            best = enc;
        }
    }
    write_tree(&best, writer)
}

/// Size in bits of the symbol range coded with the given lengths, walking
/// the symbols one by one. Used for short ranges.
fn calculate_block_symbol_size_small(
    ll_lengths: &[u8; NUM_LITLEN_SYMBOLS],
    d_lengths: &[u8; NUM_DIST_SYMBOLS],
    lz77: &Lz77Store<'_>,
    lstart: usize,
    lend: usize,
) -> usize {
    let mut result = 0usize;
    for i in lstart..lend {
        debug_assert!(i < lz77.len());
        debug_assert!(lz77.litlen(i) < 259);
        if lz77.dist(i) == 0 {
            result += ll_lengths[lz77.litlen(i) as usize] as usize;
        } else {
            let ll_symbol = lz77.litlen_symbol(i) as usize;
            let d_symbol = lz77.dist_symbol(i) as usize;
            result += ll_lengths[ll_symbol] as usize;
            result += d_lengths[d_symbol] as usize;
            result += LENGTH_EXTRA_BITS[ll_symbol - 257] as usize;
            result += DISTANCE_EXTRA_BITS[d_symbol] as usize;
        }
    }
    result + ll_lengths[END_OF_BLOCK as usize] as usize
}

/// Size in bits of the symbol range, from precomputed histograms.
fn calculate_block_symbol_size_given_counts(
    ll_counts: &[usize; NUM_LITLEN_SYMBOLS],
    d_counts: &[usize; NUM_DIST_SYMBOLS],
    ll_lengths: &[u8; NUM_LITLEN_SYMBOLS],
    d_lengths: &[u8; NUM_DIST_SYMBOLS],
    lz77: &Lz77Store<'_>,
    lstart: usize,
    lend: usize,
) -> usize {
    if lstart + NUM_LITLEN_SYMBOLS * 3 > lend {
        return calculate_block_symbol_size_small(ll_lengths, d_lengths, lz77, lstart, lend);
    }
    let mut result = 0usize;
    for (&length, &count) in ll_lengths[..256].iter().zip(&ll_counts[..256]) {
        result += length as usize * count;
    }
    for (i, (&length, &count)) in ll_lengths[257..286].iter().zip(&ll_counts[257..286]).enumerate()
    {
        result += (length as usize + LENGTH_EXTRA_BITS[i] as usize) * count;
    }
    for ((&length, &count), &extra) in d_lengths[..30]
        .iter()
        .zip(&d_counts[..30])
        .zip(&DISTANCE_EXTRA_BITS)
    {
        result += (length as usize + extra as usize) * count;
    }
    result + ll_lengths[END_OF_BLOCK as usize] as usize
}

/// Size in bits of the symbol range coded with the given lengths.
fn calculate_block_symbol_size(
    ll_lengths: &[u8; NUM_LITLEN_SYMBOLS],
    d_lengths: &[u8; NUM_DIST_SYMBOLS],
    lz77: &Lz77Store<'_>,
    lstart: usize,
    lend: usize,
) -> usize {
    if lstart + NUM_LITLEN_SYMBOLS * 3 > lend {
        calculate_block_symbol_size_small(ll_lengths, d_lengths, lz77, lstart, lend)
    } else {
        let (ll_counts, d_counts) = lz77.histogram(lstart, lend);
        calculate_block_symbol_size_given_counts(
            &ll_counts, &d_counts, ll_lengths, d_lengths, lz77, lstart, lend,
        )
    }
}

/// Try the RLE-friendly histogram reshape; keep whichever code lengths
/// give the smaller header plus data size. Returns that size in bits.
fn try_optimize_huffman_for_rle(
    lz77: &Lz77Store<'_>,
    lstart: usize,
    lend: usize,
    ll_counts: &[usize; NUM_LITLEN_SYMBOLS],
    d_counts: &[usize; NUM_DIST_SYMBOLS],
    ll_lengths: &mut [u8; NUM_LITLEN_SYMBOLS],
    d_lengths: &mut [u8; NUM_DIST_SYMBOLS],
) -> f64 {
    let treesize = calculate_tree_size(ll_lengths, d_lengths);
    let datasize =
        calculate_block_symbol_size_given_counts(ll_counts, d_counts, ll_lengths, d_lengths, lz77, lstart, lend);

    let mut ll_counts2 = *ll_counts;
    let mut d_counts2 = *d_counts;
    optimize_huffman_for_rle(&mut ll_counts2);
    optimize_huffman_for_rle(&mut d_counts2);
    let ll_lengths2 = bit_lengths(&ll_counts2, MAX_CODE_LENGTH);
    let mut d_lengths2 = bit_lengths(&d_counts2, MAX_CODE_LENGTH);
    patch_distance_codes_for_buggy_decoders(&mut d_lengths2);

    let treesize2 = calculate_tree_size(&ll_lengths2, &d_lengths2);
    // The data did not change, so its size uses the true counts.
    let datasize2 = calculate_block_symbol_size_given_counts(
        ll_counts, d_counts, &ll_lengths2, &d_lengths2, lz77, lstart, lend,
    );

    if treesize2 + datasize2 < treesize + datasize {
        *ll_lengths = ll_lengths2;
        *d_lengths = d_lengths2;
        return (treesize2 + datasize2) as f64;
    }
    (treesize + datasize) as f64
}

/// Choose the dynamic tree code lengths for a symbol range: smallest total
/// of header and data, not necessarily the entropy-optimal lengths.
/// Returns that total in bits, excluding the 3-bit block header.
fn get_dynamic_lengths(
    lz77: &Lz77Store<'_>,
    lstart: usize,
    lend: usize,
    ll_lengths: &mut [u8; NUM_LITLEN_SYMBOLS],
    d_lengths: &mut [u8; NUM_DIST_SYMBOLS],
) -> f64 {
    let (mut ll_counts, d_counts) = lz77.histogram(lstart, lend);
    ll_counts[END_OF_BLOCK as usize] = 1;
    *ll_lengths = bit_lengths(&ll_counts, MAX_CODE_LENGTH);
    *d_lengths = bit_lengths(&d_counts, MAX_CODE_LENGTH);
    patch_distance_codes_for_buggy_decoders(d_lengths);
    try_optimize_huffman_for_rle(lz77, lstart, lend, &ll_counts, &d_counts, ll_lengths, d_lengths)
}

/// Exact encoded size in bits of a symbol range as one block of `btype`,
/// including the 3-bit block header.
pub fn calculate_block_size(
    lz77: &Lz77Store<'_>,
    lstart: usize,
    lend: usize,
    btype: BlockType,
) -> f64 {
    match btype {
        BlockType::Stored => {
            // A stored range longer than the payload limit needs several
            // blocks, each with a 5-byte header (padding included).
            let length = lz77.byte_range(lstart, lend);
            let blocks = length / MAX_STORED_BLOCK + usize::from(length % MAX_STORED_BLOCK != 0);
            (blocks * 5 * 8 + length * 8) as f64
        }
        BlockType::Fixed => {
            let (ll_lengths, d_lengths) = fixed_tree();
            3.0 + calculate_block_symbol_size(&ll_lengths, &d_lengths, lz77, lstart, lend) as f64
        }
        BlockType::Dynamic => {
            let mut ll_lengths = [0u8; NUM_LITLEN_SYMBOLS];
            let mut d_lengths = [0u8; NUM_DIST_SYMBOLS];
            3.0 + get_dynamic_lengths(lz77, lstart, lend, &mut ll_lengths, &mut d_lengths)
        }
    }
}

/// Encoded size of a symbol range under the best of the three block
/// types. The fixed type is only priced for small ranges; elsewhere it
/// practically never wins and pricing it is not free.
pub fn calculate_block_size_auto_type(lz77: &Lz77Store<'_>, lstart: usize, lend: usize) -> f64 {
    let uncompressed_cost = calculate_block_size(lz77, lstart, lend, BlockType::Stored);
    let fixed_cost = if lz77.len() > 1000 {
        uncompressed_cost
    } else {
        calculate_block_size(lz77, lstart, lend, BlockType::Fixed)
    };
    let dyn_cost = calculate_block_size(lz77, lstart, lend, BlockType::Dynamic);
    if uncompressed_cost < fixed_cost && uncompressed_cost < dyn_cost {
        uncompressed_cost
    } else {
        fixed_cost.min(dyn_cost)
    }
}

/// Write `instart..inend` as stored blocks, chunked to the payload limit.
fn add_non_compressed_block(
    final_block: bool,
    input: &[u8],
    instart: usize,
    inend: usize,
    writer: &mut BitWriter,
) -> Result<()> {
    let mut pos = instart;
    loop {
        let blocksize = MAX_STORED_BLOCK.min(inend - pos);
        let currentfinal = pos + blocksize >= inend;
        let nlen = !(blocksize as u16);

        writer.write_bit(final_block && currentfinal)?;
        writer.write_bits(0b00, 2)?;
        // Bits up to the next byte boundary are ignored by the format.
        writer.align_to_byte()?;

        writer.write_bits(blocksize as u32, 16)?;
        writer.write_bits(u32::from(nlen), 16)?;
        writer.write_bytes(&input[pos..pos + blocksize])?;

        if currentfinal {
            break;
        }
        pos += blocksize;
    }
    Ok(())
}

/// Write the symbols of a range with the given codes, followed by the
/// end-of-block symbol.
fn add_lz77_data(
    lz77: &Lz77Store<'_>,
    lstart: usize,
    lend: usize,
    ll_lengths: &[u8; NUM_LITLEN_SYMBOLS],
    d_lengths: &[u8; NUM_DIST_SYMBOLS],
    writer: &mut BitWriter,
) -> Result<()> {
    let ll_symbols = lengths_to_symbols(ll_lengths, MAX_CODE_LENGTH);
    let d_symbols = lengths_to_symbols(d_lengths, MAX_CODE_LENGTH);

    for i in lstart..lend {
        let dist = lz77.dist(i);
        let litlen = lz77.litlen(i);
        if dist == 0 {
            debug_assert!(litlen < 256);
            debug_assert!(ll_lengths[litlen as usize] > 0);
            writer.write_huffman_code(ll_symbols[litlen as usize], ll_lengths[litlen as usize])?;
        } else {
            let (lsym, lbits, lval) = length_to_code(litlen);
            let (dsym, dbits, dval) = distance_to_code(dist);
            debug_assert!(ll_lengths[lsym as usize] > 0);
            debug_assert!(d_lengths[dsym as usize] > 0);
            writer.write_huffman_code(ll_symbols[lsym as usize], ll_lengths[lsym as usize])?;
            if lbits > 0 {
                writer.write_bits(u32::from(lval), lbits)?;
            }
            writer.write_huffman_code(d_symbols[dsym as usize], d_lengths[dsym as usize])?;
            if dbits > 0 {
                writer.write_bits(u32::from(dval), dbits)?;
            }
        }
    }
    writer.write_huffman_code(
        ll_symbols[END_OF_BLOCK as usize],
        ll_lengths[END_OF_BLOCK as usize],
    )
}

/// Write one block of the requested type for the symbol range
/// `lstart..lend`.
fn add_lz77_block(
    options: &Options,
    btype: BlockType,
    final_block: bool,
    lz77: &Lz77Store<'_>,
    lstart: usize,
    lend: usize,
    writer: &mut BitWriter,
) -> Result<()> {
    if btype == BlockType::Stored {
        let length = lz77.byte_range(lstart, lend);
        let pos = if lstart == lend {
            0
        } else {
            lz77.position(lstart)
        };
        return add_non_compressed_block(final_block, lz77.data(), pos, pos + length, writer);
    }

    writer.write_bit(final_block)?;
    let (ll_lengths, d_lengths) = if btype == BlockType::Fixed {
        writer.write_bits(0b01, 2)?;
        fixed_tree()
    } else {
        writer.write_bits(0b10, 2)?;
        let mut ll_lengths = [0u8; NUM_LITLEN_SYMBOLS];
        let mut d_lengths = [0u8; NUM_DIST_SYMBOLS];
        get_dynamic_lengths(lz77, lstart, lend, &mut ll_lengths, &mut d_lengths);
        let tree_start = writer.bytes_written();
        add_dynamic_tree(&ll_lengths, &d_lengths, writer)?;
        if options.verbose {
            eprintln!("treesize: {}", writer.bytes_written() - tree_start);
        }
        (ll_lengths, d_lengths)
    };

    let block_start = writer.bytes_written();
    add_lz77_data(lz77, lstart, lend, &ll_lengths, &d_lengths, writer)?;
    if options.verbose {
        eprintln!(
            "compressed block size: {} ({}k) (unc: {})",
            writer.bytes_written() - block_start,
            (writer.bytes_written() - block_start) / 1024,
            lz77.byte_range(lstart, lend)
        );
    }
    Ok(())
}

/// Write a symbol range as whichever block type is smallest, re-running
/// the fixed-tree optimizer when a fixed block might plausibly win.
fn add_lz77_block_auto_type(
    options: &Options,
    final_block: bool,
    lz77: &Lz77Store<'_>,
    lstart: usize,
    lend: usize,
    writer: &mut BitWriter,
) -> Result<()> {
    let uncompressed_cost = calculate_block_size(lz77, lstart, lend, BlockType::Stored);
    let mut fixed_cost = calculate_block_size(lz77, lstart, lend, BlockType::Fixed);
    let dyn_cost = calculate_block_size(lz77, lstart, lend, BlockType::Dynamic);

    // Re-parsing against the fixed tree pays off only for small blocks,
    // or when the fixed tree is already close to the dynamic one.
    let expensive_fixed = lz77.len() < 1000 || fixed_cost <= dyn_cost * 1.1;

    if lstart == lend {
        // The smallest possible block: fixed type, only the end symbol.
        writer.write_bit(final_block)?;
        writer.write_bits(0b01, 2)?;
        writer.write_bits(0, 7)?;
        return Ok(());
    }

    let mut fixedstore = Lz77Store::new(lz77.data());
    if expensive_fixed {
        // Recalculate the parse, this time optimized for the known
        // fixed-tree costs.
        let instart = lz77.position(lstart);
        let inend = instart + lz77.byte_range(lstart, lend);
        let mut s = BlockState::new(options, instart, inend, true)?;
        lz77_optimal_fixed(&mut s, lz77.data(), instart, inend, &mut fixedstore)?;
        fixed_cost = calculate_block_size(&fixedstore, 0, fixedstore.len(), BlockType::Fixed);
    }

    if uncompressed_cost < fixed_cost && uncompressed_cost < dyn_cost {
        add_lz77_block(options, BlockType::Stored, final_block, lz77, lstart, lend, writer)
    } else if fixed_cost < dyn_cost {
        if expensive_fixed {
            add_lz77_block(
                options,
                BlockType::Fixed,
                final_block,
                &fixedstore,
                0,
                fixedstore.len(),
                writer,
            )
        } else {
            add_lz77_block(options, BlockType::Fixed, final_block, lz77, lstart, lend, writer)
        }
    } else {
        add_lz77_block(options, BlockType::Dynamic, final_block, lz77, lstart, lend, writer)
    }
}

/// Deflate a part: split on the input bytes first, then optimize each
/// range independently.
fn deflate_splitting_first(
    options: &Options,
    final_block: bool,
    input: &[u8],
    instart: usize,
    inend: usize,
    writer: &mut BitWriter,
) -> Result<()> {
    let splitpoints = if options.block_splitting {
        block_split(options, input, instart, inend, options.max_blocks as usize)?
    } else {
        Vec::new()
    };

    for i in 0..=splitpoints.len() {
        let start = if i == 0 { instart } else { splitpoints[i - 1] };
        let end = if i == splitpoints.len() {
            inend
        } else {
            splitpoints[i]
        };
        let mut s = BlockState::new(options, start, end, true)?;
        let mut store = Lz77Store::new(input);
        lz77_optimal(&mut s, input, start, end, options.iteration_count, &mut store)?;
        add_lz77_block_auto_type(
            options,
            final_block && i == splitpoints.len(),
            &store,
            0,
            store.len(),
            writer,
        )?;
    }
    Ok(())
}

/// Deflate a part: optimize the whole range once, then split on the
/// resulting symbol stream. Slower for big parts but the split points see
/// the real compressed representation.
fn deflate_splitting_last(
    options: &Options,
    final_block: bool,
    input: &[u8],
    instart: usize,
    inend: usize,
    writer: &mut BitWriter,
) -> Result<()> {
    let mut s = BlockState::new(options, instart, inend, true)?;
    let mut store = Lz77Store::new(input);
    lz77_optimal(&mut s, input, instart, inend, options.iteration_count, &mut store)?;

    let splitpoints = block_split_lz77(options, &store, options.max_blocks as usize)?;

    for i in 0..=splitpoints.len() {
        let start = if i == 0 { 0 } else { splitpoints[i - 1] };
        let end = if i == splitpoints.len() {
            store.len()
        } else {
            splitpoints[i]
        };
        add_lz77_block_auto_type(
            options,
            final_block && i == splitpoints.len(),
            &store,
            start,
            end,
            writer,
        )?;
    }
    Ok(())
}

/// Deflate one master block.
fn deflate_part(
    options: &Options,
    final_block: bool,
    input: &[u8],
    instart: usize,
    inend: usize,
    writer: &mut BitWriter,
) -> Result<()> {
    if options.block_splitting && options.block_splitting_last {
        deflate_splitting_last(options, final_block, input, instart, inend, writer)
    } else {
        deflate_splitting_first(options, final_block, input, instart, inend, writer)
    }
}

/// Compress `input` as a complete raw deflate stream into `writer`.
///
/// The input is processed in parts of [`MASTER_BLOCK_SIZE`] bytes so
/// memory use stays bounded on huge inputs; block splitting never crosses
/// a part boundary. An empty input still produces one (empty) final
/// block, as the format requires.
pub fn deflate(options: &Options, input: &[u8], writer: &mut BitWriter) -> Result<()> {
    let mut i = 0usize;
    loop {
        let masterfinal = i + MASTER_BLOCK_SIZE >= input.len();
        let size = if masterfinal {
            input.len() - i
        } else {
            MASTER_BLOCK_SIZE
        };
        deflate_part(options, masterfinal, input, i, i + size, writer)?;
        i += size;
        if i >= input.len() {
            break;
        }
    }
    if options.verbose && !input.is_empty() {
        let outsize = writer.bytes_written();
        eprintln!(
            "Original Size: {}, Deflate: {}, Compression: {:.6}% Removed",
            input.len(),
            outsize,
            100.0 * (input.len() as f64 - outsize as f64) / input.len() as f64
        );
    }
    Ok(())
}
