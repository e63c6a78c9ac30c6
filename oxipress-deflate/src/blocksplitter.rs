//! Block split point selection.
//!
//! Deflate output shrinks when ranges with different symbol statistics get
//! their own blocks and Huffman trees. This module picks split points by
//! minimizing the exact encoded size reported by the cost model in
//! [`crate::deflate`]: a candidate range is split at the position that
//! minimizes the sum of the two half costs, and a split is kept only when
//! that sum beats the unsplit cost. Ranges are processed largest first
//! until nothing improves or the block limit is reached.

use crate::deflate::calculate_block_size_auto_type;
use crate::hash::Hash;
use crate::lz77::{lz77_greedy, BlockState, Lz77Store};
use crate::options::Options;
use crate::squeeze::LARGE_FLOAT;
use oxipress_core::buffer::try_alloc_vec;
use oxipress_core::error::Result;

/// Ranges shorter than this never get split further.
const MINIMUM_SPLIT_DISTANCE: usize = 10;

/// Probes per narrowing round in [`find_minimum`].
const SPLIT_PROBES: usize = 9;

fn estimate_cost(lz77: &Lz77Store<'_>, lstart: usize, lend: usize) -> f64 {
    calculate_block_size_auto_type(lz77, lstart, lend)
}

/// Find the position in `start..end` that minimizes `f`, and the value
/// there.
///
/// Short ranges are scanned linearly. Longer ranges are narrowed by
/// evaluating a small set of evenly spaced probes and recursing into the
/// segment around the best one, which finds a local minimum with far
/// fewer cost evaluations. Block split costs are smooth enough that this
/// matches the exhaustive scan almost always.
fn find_minimum<F: Fn(usize) -> f64>(f: F, start: usize, end: usize) -> (usize, f64) {
    if end - start < 1024 {
        let mut best = LARGE_FLOAT;
        let mut result = start;
        for i in start..end {
            let v = f(i);
            if v < best {
                best = v;
                result = i;
            }
        }
        return (result, best);
    }

    let mut start = start;
    let mut end = end;
    let mut p = [0usize; SPLIT_PROBES];
    let mut vp = [0f64; SPLIT_PROBES];
    let mut lastbest = LARGE_FLOAT;
    let mut pos = start;

    loop {
        if end - start <= SPLIT_PROBES {
            break;
        }

        for (i, (probe, value)) in p.iter_mut().zip(&mut vp).enumerate() {
            *probe = start + (i + 1) * ((end - start) / (SPLIT_PROBES + 1));
            *value = f(*probe);
        }
        let mut besti = 0;
        for (i, &v) in vp.iter().enumerate().skip(1) {
            if v < vp[besti] {
                besti = i;
            }
        }
        if vp[besti] > lastbest {
            break;
        }

        start = if besti == 0 { start } else { p[besti - 1] };
        end = if besti == SPLIT_PROBES - 1 {
            end
        } else {
            p[besti + 1]
        };

        pos = p[besti];
        lastbest = vp[besti];
    }
    (pos, lastbest)
}

/// Insert `value` into an already sorted list.
fn add_sorted(value: usize, out: &mut Vec<usize>) {
    let idx = out.partition_point(|&point| point <= value);
    out.insert(idx, value);
}

/// The largest range between split points whose start is not marked done.
/// Returns its bounds, or `None` when every range is done.
fn find_largest_splittable_block(
    lz77size: usize,
    done: &[bool],
    splitpoints: &[usize],
) -> Option<(usize, usize)> {
    let mut best = None;
    let mut longest = 0;
    for i in 0..=splitpoints.len() {
        let start = if i == 0 { 0 } else { splitpoints[i - 1] };
        let end = if i == splitpoints.len() {
            lz77size - 1
        } else {
            splitpoints[i]
        };
        if !done[start] && end - start > longest {
            best = Some((start, end));
            longest = end - start;
        }
    }
    best
}

/// Choose split points on an LZ77 symbol stream. The returned positions
/// are indices into `lz77`, sorted ascending, strictly inside the stream.
///
/// `maxblocks` bounds the number of resulting blocks; 0 means no bound.
pub fn block_split_lz77(
    options: &Options,
    lz77: &Lz77Store<'_>,
    maxblocks: usize,
) -> Result<Vec<usize>> {
    let mut splitpoints: Vec<usize> = Vec::new();
    if lz77.len() < MINIMUM_SPLIT_DISTANCE {
        // Nothing to gain on tiny streams.
        return Ok(splitpoints);
    }

    let mut done = try_alloc_vec(false, lz77.len())?;
    let mut numblocks = 1usize;
    let mut lstart = 0;
    let mut lend = lz77.len();

    loop {
        if maxblocks > 0 && numblocks >= maxblocks {
            break;
        }

        debug_assert!(lstart < lend);
        let (llpos, splitcost) = find_minimum(
            |i| estimate_cost(lz77, lstart, i) + estimate_cost(lz77, i, lend),
            lstart + 1,
            lend,
        );

        debug_assert!(llpos > lstart);
        debug_assert!(llpos < lend);

        let origcost = estimate_cost(lz77, lstart, lend);

        if splitcost > origcost || llpos == lstart + 1 || llpos == lend {
            // Splitting this range does not help; leave it whole.
            done[lstart] = true;
        } else {
            add_sorted(llpos, &mut splitpoints);
            numblocks += 1;
        }

        match find_largest_splittable_block(lz77.len(), &done, &splitpoints) {
            Some((start, end)) if end - start >= MINIMUM_SPLIT_DISTANCE => {
                lstart = start;
                lend = end;
            }
            _ => break,
        }
    }

    if options.verbose && !splitpoints.is_empty() {
        let dec: Vec<String> = splitpoints
            .iter()
            .map(|&i| lz77.position(i).to_string())
            .collect();
        let hex: Vec<String> = splitpoints
            .iter()
            .map(|&i| format!("{:x}", lz77.position(i)))
            .collect();
        eprintln!(
            "block split points: {} (hex: {})",
            dec.join(" "),
            hex.join(" ")
        );
    }

    Ok(splitpoints)
}

/// Choose split points on uncompressed input. The returned positions are
/// byte offsets in `input`, sorted ascending, strictly inside
/// `instart..inend`.
///
/// The costs are estimated on a greedy parse of the range. Unintuitively
/// that gives better split points than an optimal parse would.
pub fn block_split(
    options: &Options,
    input: &[u8],
    instart: usize,
    inend: usize,
    maxblocks: usize,
) -> Result<Vec<usize>> {
    let mut s = BlockState::new(options, instart, inend, false)?;
    let mut h = Hash::new()?;
    let mut store = Lz77Store::new(input);

    lz77_greedy(&mut s, input, instart, inend, &mut store, &mut h);

    let lz77splitpoints = block_split_lz77(options, &store, maxblocks)?;

    // Symbol indices back to byte positions.
    Ok(lz77splitpoints
        .iter()
        .map(|&i| store.position(i))
        .collect())
}
