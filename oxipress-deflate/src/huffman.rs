//! Huffman coding for DEFLATE.
//!
//! DEFLATE transmits canonical Huffman codes: only the code lengths go in
//! the stream, and both sides rebuild identical codes by assigning
//! consecutive values to symbols of equal length in symbol order.
//!
//! The encode side computes optimal length-limited lengths with the
//! boundary package-merge algorithm (Katajainen et al.) and turns them
//! into codes with [`lengths_to_symbols`]. The decode side is
//! [`HuffmanTree`], a canonical decoder that walks the code space bit by
//! bit; it backs the verification oracle in `inflate`.
//!
//! Three alphabets are involved: literal/length (0-285, with 256 marking
//! end of block), distance (0-29), and the code length alphabet (0-18)
//! used to compress the other two trees' lengths.

use oxipress_core::error::{OxiPressError, Result};
use oxipress_core::BitReader;
use std::io::Read;

/// DEFLATE caps Huffman codes at 15 bits.
pub const MAX_CODE_LENGTH: usize = 15;

/// The code length alphabet has 19 symbols (0-18).
pub const CODELEN_ALPHABET_SIZE: usize = 19;

/// Histogram size for literal/length symbols (286 used + 2 reserved).
pub const NUM_LITLEN_SYMBOLS: usize = 288;

/// Histogram size for distance symbols (30 used + 2 reserved).
pub const NUM_DIST_SYMBOLS: usize = 32;

/// Literal/length symbol that ends a block.
pub const END_OF_BLOCK: u16 = 256;

/// Canonical Huffman decoding tables for one alphabet.
///
/// Holds the code length histogram plus the symbols sorted by code length.
/// Decoding walks the canonical code space one bit at a time; DEFLATE
/// codes are at most 15 bits, so the walk is short.
#[derive(Debug, Clone)]
pub struct HuffmanTree {
    /// `counts[len]` is how many symbols have code length `len`.
    counts: [u16; MAX_CODE_LENGTH + 1],
    /// Used symbols ordered by code length, ties in symbol order.
    symbols: Vec<u16>,
}

impl HuffmanTree {
    /// Build decoding tables from per-symbol code lengths.
    ///
    /// A length of 0 means the symbol is unused. Lengths that would
    /// over-subscribe the code space are rejected; incomplete codes are
    /// allowed, and their unassigned bit patterns fail at decode time.
    pub fn from_code_lengths(code_lengths: &[u8]) -> Result<Self> {
        if code_lengths.is_empty() {
            return Err(OxiPressError::invalid_header("no code lengths given"));
        }

        let mut counts = [0u16; MAX_CODE_LENGTH + 1];
        for &len in code_lengths {
            if len == 0 {
                continue;
            }
            if usize::from(len) > MAX_CODE_LENGTH {
                return Err(OxiPressError::invalid_header(format!(
                    "code length {len} exceeds the 15-bit limit"
                )));
            }
            counts[usize::from(len)] += 1;
        }

        // Walk the code space length by length; going negative means the
        // lengths ask for more codes than the space holds.
        let mut space = 1i32;
        for &count in &counts[1..] {
            space = 2 * space - i32::from(count);
            if space < 0 {
                return Err(OxiPressError::invalid_header(
                    "over-subscribed Huffman code lengths",
                ));
            }
        }

        let used = code_lengths.iter().filter(|&&len| len > 0).count();
        let mut symbols = Vec::with_capacity(used);
        for wanted in 1..=MAX_CODE_LENGTH as u8 {
            for (symbol, &len) in code_lengths.iter().enumerate() {
                if len == wanted {
                    symbols.push(symbol as u16);
                }
            }
        }

        Ok(Self { counts, symbols })
    }

    /// Decode one symbol from the stream.
    ///
    /// Canonical codes of each length occupy a contiguous range, so the
    /// decoder tracks the first code and first symbol index per length and
    /// extends the code a bit at a time until it falls inside a range.
    pub fn decode<R: Read>(&self, reader: &mut BitReader<R>) -> Result<u16> {
        let mut code = 0u32;
        let mut first = 0u32;
        let mut index = 0usize;

        for len in 1..=MAX_CODE_LENGTH {
            code |= reader.read_bits(1)?;
            let count = u32::from(self.counts[len]);
            if code < first + count {
                return Ok(self.symbols[index + (code - first) as usize]);
            }
            index += count as usize;
            first = (first + count) << 1;
            code <<= 1;
        }

        Err(OxiPressError::invalid_huffman(reader.bit_position()))
    }
}

/// Node in the package-merge chain arena.
///
/// `tail` is an index into the arena, forming the chain that records which
/// leaves a package contains.
#[derive(Debug, Clone, Copy)]
struct Chain {
    /// Total weight (symbol count) of this chain.
    weight: usize,
    /// Number of leaves in this chain.
    count: usize,
    /// Previous node in the chain.
    tail: Option<u32>,
}

/// Leaf for package-merge: a used symbol and its frequency.
#[derive(Debug, Clone, Copy)]
struct Leaf {
    weight: usize,
    symbol: usize,
}

/// Append a chain to the arena and return its index.
fn new_chain(arena: &mut Vec<Chain>, weight: usize, count: usize, tail: Option<u32>) -> u32 {
    arena.push(Chain { weight, count, tail });
    (arena.len() - 1) as u32
}

/// One step of the boundary package-merge algorithm.
///
/// Adds a new chain to list `index`, using either a leaf or a package of
/// the two lookahead chains of the previous list, whichever is cheaper.
fn boundary_pm(lists: &mut [[u32; 2]], leaves: &[Leaf], arena: &mut Vec<Chain>, index: usize) {
    let lastcount = arena[lists[index][1] as usize].count;

    if index == 0 && lastcount >= leaves.len() {
        // We've added all the leaves to list 0, nothing else to add
        return;
    }

    let oldchain = lists[index][1];
    lists[index][0] = oldchain;

    if index == 0 {
        // New leaf node in list 0
        let newchain = new_chain(arena, leaves[lastcount].weight, lastcount + 1, None);
        lists[index][1] = newchain;
    } else {
        let sum = arena[lists[index - 1][0] as usize].weight
            + arena[lists[index - 1][1] as usize].weight;
        if lastcount < leaves.len() && sum > leaves[lastcount].weight {
            // New leaf inserted in list, so count is incremented
            let tail = arena[oldchain as usize].tail;
            let newchain = new_chain(arena, leaves[lastcount].weight, lastcount + 1, tail);
            lists[index][1] = newchain;
        } else {
            // Package of the previous list's lookahead chains
            let prev = lists[index - 1][1];
            let newchain = new_chain(arena, sum, lastcount, Some(prev));
            lists[index][1] = newchain;
            // Two lookahead chains of previous list used up, create new ones
            boundary_pm(lists, leaves, arena, index - 1);
            boundary_pm(lists, leaves, arena, index - 1);
        }
    }
}

/// Final step: only the count and tail of the last chain matter, so skip
/// the recursive lookahead refills.
fn boundary_pm_final(lists: &mut [[u32; 2]], leaves: &[Leaf], arena: &mut Vec<Chain>, index: usize) {
    let lastcount = arena[lists[index][1] as usize].count;
    let sum =
        arena[lists[index - 1][0] as usize].weight + arena[lists[index - 1][1] as usize].weight;

    if lastcount < leaves.len() && sum > leaves[lastcount].weight {
        let tail = arena[lists[index][1] as usize].tail;
        let newchain = new_chain(arena, 0, lastcount + 1, tail);
        lists[index][1] = newchain;
    } else {
        let prev = lists[index - 1][1];
        arena[lists[index][1] as usize].tail = Some(prev);
    }
}

/// Walk the final chain and convert leaf counts to code lengths.
fn extract_bit_lengths(chain: u32, arena: &[Chain], leaves: &[Leaf], lengths: &mut [u8]) {
    let mut counts = [0usize; 16];
    let mut end = 16usize;

    let mut node = Some(chain);
    while let Some(idx) = node {
        end -= 1;
        counts[end] = arena[idx as usize].count;
        node = arena[idx as usize].tail;
    }

    let mut ptr = 15usize;
    let mut value = 1u8;
    let mut val = counts[15];
    while ptr >= end {
        while val > counts[ptr - 1] {
            lengths[leaves[val - 1].symbol] = value;
            val -= 1;
        }
        ptr -= 1;
        value += 1;
    }
}

/// Calculate length-limited Huffman code lengths from symbol frequencies
/// using boundary package-merge.
///
/// Returns one length per symbol; unused symbols (frequency 0) get length 0.
/// The resulting lengths are optimal under the `max_bits` limit and always
/// satisfy the Kraft inequality, so a valid canonical code can be built
/// from them.
///
/// `max_bits` must satisfy `(1 << max_bits) >= number of used symbols`;
/// this always holds for the DEFLATE alphabets (15-bit limit, at most 288
/// symbols; 7-bit limit, at most 19 symbols).
pub fn length_limited_code_lengths(frequencies: &[usize], max_bits: usize) -> Vec<u8> {
    let mut lengths = vec![0u8; frequencies.len()];

    let leaves: Vec<Leaf> = frequencies
        .iter()
        .enumerate()
        .filter(|&(_, &f)| f > 0)
        .map(|(symbol, &weight)| Leaf { weight, symbol })
        .collect();
    let numsymbols = leaves.len();

    debug_assert!(
        (1usize << max_bits) >= numsymbols,
        "Too many symbols for the length limit"
    );

    // Trees with 0, 1 or 2 used symbols don't need the full algorithm
    if numsymbols == 0 {
        return lengths;
    }
    if numsymbols == 1 {
        lengths[leaves[0].symbol] = 1;
        return lengths;
    }
    if numsymbols == 2 {
        lengths[leaves[0].symbol] = 1;
        lengths[leaves[1].symbol] = 1;
        return lengths;
    }

    let mut leaves = leaves;
    // Sort ascending by weight; ties keep symbol order (stable sort)
    leaves.sort_by_key(|leaf| leaf.weight);

    // A code length longer than numsymbols - 1 is never needed
    let max_bits = max_bits.min(numsymbols - 1);

    let mut arena: Vec<Chain> = Vec::with_capacity(2 * max_bits * numsymbols);
    let node0 = new_chain(&mut arena, leaves[0].weight, 1, None);
    let node1 = new_chain(&mut arena, leaves[1].weight, 2, None);
    let mut lists = vec![[node0, node1]; max_bits];

    // In the last list, 2 * numsymbols - 2 active chains are needed; two
    // are already present from the initialization
    let num_boundary_pm_runs = 2 * numsymbols - 4;
    for _ in 0..num_boundary_pm_runs - 1 {
        boundary_pm(&mut lists, &leaves, &mut arena, max_bits - 1);
    }
    boundary_pm_final(&mut lists, &leaves, &mut arena, max_bits - 1);

    extract_bit_lengths(lists[max_bits - 1][1], &arena, &leaves, &mut lengths);
    lengths
}

/// Convert code lengths to canonical Huffman codes (RFC 1951 Section 3.2.2).
///
/// Returns one code per symbol; entries for unused symbols are 0. The codes
/// are in natural (MSB-first) order, the bit order in which DEFLATE
/// transmits them.
pub fn lengths_to_symbols(lengths: &[u8], max_bits: usize) -> Vec<u32> {
    let mut symbols = vec![0u32; lengths.len()];

    // 1) Count the number of codes for each code length
    let mut bl_count = vec![0u32; max_bits + 1];
    for &len in lengths {
        debug_assert!(len as usize <= max_bits);
        bl_count[len as usize] += 1;
    }

    // 2) Find the numerical value of the smallest code for each code length
    let mut next_code = vec![0u32; max_bits + 1];
    let mut code = 0u32;
    bl_count[0] = 0;
    for bits in 1..=max_bits {
        code = (code + bl_count[bits - 1]) << 1;
        next_code[bits] = code;
    }

    // 3) Assign numerical values to all codes
    for (i, &len) in lengths.iter().enumerate() {
        if len != 0 {
            symbols[i] = next_code[len as usize];
            next_code[len as usize] += 1;
        }
    }

    symbols
}

/// Calculate the entropy cost of each symbol in bits, from its frequency.
///
/// Symbols with count 0 still get a finite cost (as if they appeared once),
/// since a cost may be requested for them anyway. Tiny negative results from
/// floating point cancellation are clamped to zero.
pub fn calculate_entropy(counts: &[usize], bitlengths: &mut [f64]) {
    const K_INV_LOG2: f64 = std::f64::consts::LOG2_E;

    let sum: usize = counts.iter().sum();
    let log2sum = if sum == 0 {
        (counts.len() as f64).ln() * K_INV_LOG2
    } else {
        (sum as f64).ln() * K_INV_LOG2
    };

    for (i, &count) in counts.iter().enumerate() {
        if count == 0 {
            bitlengths[i] = log2sum;
        } else {
            bitlengths[i] = log2sum - (count as f64).ln() * K_INV_LOG2;
        }
        if bitlengths[i] < 0.0 && bitlengths[i] > -1e-5 {
            bitlengths[i] = 0.0;
        }
        debug_assert!(bitlengths[i] >= 0.0);
    }
}
