//! Iterative shortest-path optimization of the LZ77 parse.
//!
//! # Algorithm
//!
//! For a known coding (bit cost per symbol), the cheapest parse of a block
//! is a shortest path: a forward dynamic-programming pass computes the
//! minimal cost to reach every byte, allowing a literal step or any match
//! length the finder reports, and a backward trace recovers the step
//! sizes. The coding itself depends on the parse, so [`lz77_optimal`]
//! iterates: parse under the current statistics, measure the true encoded
//! size, recompute statistics from the new parse, repeat. When the size
//! plateaus, the statistics are perturbed with a small random generator to
//! escape the local optimum; the best parse ever seen is kept.
//!
//! [`lz77_optimal_fixed`] needs a single pass because the fixed-tree
//! coding does not depend on the parse.

use crate::hash::Hash;
use crate::huffman::{calculate_entropy, END_OF_BLOCK, NUM_DIST_SYMBOLS, NUM_LITLEN_SYMBOLS};
use crate::lz77::{find_longest_match, lz77_greedy, verify_len_dist, BlockState, Lz77Store};
use crate::tables::{distance_to_code, length_to_code, DISTANCE_BASE};
use crate::{MAX_MATCH, MIN_MATCH, WINDOW_MASK, WINDOW_SIZE};
use oxipress_core::buffer::try_alloc_vec;
use oxipress_core::error::Result;

/// Sentinel cost larger than any real block size in bits.
pub(crate) const LARGE_FLOAT: f64 = 1e30;

/// Symbol frequencies of one parse and the entropy-derived cost in bits of
/// each symbol under those frequencies.
#[derive(Debug, Clone)]
struct SymbolStats {
    /// The literal and length symbol frequencies.
    litlens: [usize; NUM_LITLEN_SYMBOLS],
    /// The distance symbol frequencies.
    dists: [usize; NUM_DIST_SYMBOLS],
    /// Estimated cost in bits of each litlen symbol.
    ll_symbols: [f64; NUM_LITLEN_SYMBOLS],
    /// Estimated cost in bits of each distance symbol.
    d_symbols: [f64; NUM_DIST_SYMBOLS],
}

impl SymbolStats {
    fn new() -> Self {
        Self {
            litlens: [0; NUM_LITLEN_SYMBOLS],
            dists: [0; NUM_DIST_SYMBOLS],
            ll_symbols: [0.0; NUM_LITLEN_SYMBOLS],
            d_symbols: [0.0; NUM_DIST_SYMBOLS],
        }
    }

    /// Count the symbols of `store` and derive per-symbol costs.
    fn from_store(store: &Lz77Store<'_>) -> Self {
        let mut stats = Self::new();
        for i in 0..store.len() {
            if store.dist(i) == 0 {
                stats.litlens[store.litlen(i) as usize] += 1;
            } else {
                stats.litlens[store.litlen_symbol(i) as usize] += 1;
                stats.dists[store.dist_symbol(i) as usize] += 1;
            }
        }
        stats.litlens[END_OF_BLOCK as usize] = 1;
        stats.calculate();
        stats
    }

    /// Recompute the per-symbol costs from the frequencies.
    fn calculate(&mut self) {
        calculate_entropy(&self.litlens, &mut self.ll_symbols);
        calculate_entropy(&self.dists, &mut self.d_symbols);
    }

    /// Blend two frequency sets; the costs must be recomputed afterwards.
    fn add_weighed_freqs(stats1: &Self, w1: f64, stats2: &Self, w2: f64) -> Self {
        let mut result = Self::new();
        for (out, (a, b)) in result
            .litlens
            .iter_mut()
            .zip(stats1.litlens.iter().zip(&stats2.litlens))
        {
            *out = (*a as f64 * w1 + *b as f64 * w2) as usize;
        }
        for (out, (a, b)) in result
            .dists
            .iter_mut()
            .zip(stats1.dists.iter().zip(&stats2.dists))
        {
            *out = (*a as f64 * w1 + *b as f64 * w2) as usize;
        }
        result.litlens[END_OF_BLOCK as usize] = 1;
        result
    }

    /// Replace a third of the frequencies by other randomly picked ones.
    fn randomize_freqs(&mut self, state: &mut RanState) {
        randomize_freqs(state, &mut self.litlens);
        randomize_freqs(state, &mut self.dists);
        self.litlens[END_OF_BLOCK as usize] = 1;
    }
}

fn randomize_freqs(state: &mut RanState, freqs: &mut [usize]) {
    let n = freqs.len();
    for i in 0..n {
        if (state.next() >> 4) % 3 == 0 {
            freqs[i] = freqs[state.next() as usize % n];
        }
    }
}

/// Marsaglia's multiply-with-carry generator. Only used to jitter the
/// statistics when iteration cost plateaus, so quality hardly matters but
/// determinism does.
#[derive(Debug)]
struct RanState {
    m_w: u32,
    m_z: u32,
}

impl RanState {
    fn new() -> Self {
        Self { m_w: 1, m_z: 2 }
    }

    fn next(&mut self) -> u32 {
        self.m_z = 36969u32
            .wrapping_mul(self.m_z & 65535)
            .wrapping_add(self.m_z >> 16);
        self.m_w = 18000u32
            .wrapping_mul(self.m_w & 65535)
            .wrapping_add(self.m_w >> 16);
        (self.m_z << 16).wrapping_add(self.m_w)
    }
}

/// Bit cost of one symbol under an assumed coding.
enum CostModel<'a> {
    /// The format's fixed litlen and distance trees.
    Fixed,
    /// Entropy-derived costs from measured statistics.
    Stat(&'a SymbolStats),
}

impl CostModel<'_> {
    /// Cost in bits of a literal (`dist == 0`) or a match.
    fn cost(&self, litlen: u16, dist: u16) -> f64 {
        match self {
            CostModel::Fixed => {
                if dist == 0 {
                    if litlen <= 143 { 8.0 } else { 9.0 }
                } else {
                    let (lsym, lbits, _) = length_to_code(litlen);
                    let (_, dbits, _) = distance_to_code(dist);
                    let symbol_cost = if lsym <= 279 { 7.0 } else { 8.0 };
                    // Every fixed distance symbol is 5 bits.
                    symbol_cost + 5.0 + f64::from(lbits) + f64::from(dbits)
                }
            }
            CostModel::Stat(stats) => {
                if dist == 0 {
                    stats.ll_symbols[litlen as usize]
                } else {
                    let (lsym, lbits, _) = length_to_code(litlen);
                    let (dsym, dbits, _) = distance_to_code(dist);
                    f64::from(lbits)
                        + f64::from(dbits)
                        + stats.ll_symbols[lsym as usize]
                        + stats.d_symbols[dsym as usize]
                }
            }
        }
    }

    /// Smallest cost this model can assign to any match. Only symbol
    /// boundaries can change the cost, so scanning each length once and
    /// each distance symbol's base value once is exhaustive.
    fn min_cost(&self) -> f64 {
        let mut mincost = LARGE_FLOAT;
        let mut bestlength = 0u16;
        for length in MIN_MATCH as u16..=MAX_MATCH as u16 {
            let c = self.cost(length, 1);
            if c < mincost {
                bestlength = length;
                mincost = c;
            }
        }

        mincost = LARGE_FLOAT;
        let mut bestdist = 0u16;
        for &dist in &DISTANCE_BASE {
            let c = self.cost(3, dist);
            if c < mincost {
                bestdist = dist;
                mincost = c;
            }
        }

        self.cost(bestlength, bestdist)
    }
}

/// Reusable per-block buffers for the shortest-path runs.
struct SqueezeScratch {
    /// For each byte boundary, the step length that reached it cheapest.
    length_array: Vec<u16>,
    /// Cheapest cost in bits to reach each byte boundary.
    costs: Vec<f32>,
    h: Hash,
}

impl SqueezeScratch {
    fn new(blocksize: usize) -> Result<Self> {
        Ok(Self {
            length_array: try_alloc_vec(0u16, blocksize + 1)?,
            costs: try_alloc_vec(0f32, blocksize + 1)?,
            h: Hash::new()?,
        })
    }
}

/// Forward pass: compute the cheapest way to reach every byte boundary of
/// `instart..inend` under `costmodel`. Returns the cost of reaching the
/// end.
fn get_best_lengths(
    s: &mut BlockState<'_>,
    input: &[u8],
    instart: usize,
    inend: usize,
    costmodel: &CostModel<'_>,
    scratch: &mut SqueezeScratch,
) -> f64 {
    let blocksize = inend - instart;
    let windowstart = instart.saturating_sub(WINDOW_SIZE);

    if instart == inend {
        return 0.0;
    }

    let h = &mut scratch.h;
    let costs = &mut scratch.costs;
    let length_array = &mut scratch.length_array;

    h.reset();
    h.warmup(input, windowstart, inend);
    for i in windowstart..instart {
        h.update(input, i, inend);
    }

    let mincost = costmodel.min_cost();

    costs[0] = 0.0;
    for c in &mut costs[1..=blocksize] {
        *c = LARGE_FLOAT as f32;
    }
    length_array[0] = 0;

    let mut sublen = [0u16; 259];
    let mut i = instart;
    while i < inend {
        let mut j = i - instart;
        h.update(input, i, inend);

        // Deep inside a run of one repeated byte, with a full match length
        // of the same byte behind and ahead, every step is a MAX_MATCH
        // match at distance 1: assign those directly instead of searching.
        if h.same[i & WINDOW_MASK] as usize > MAX_MATCH * 2
            && i > instart + MAX_MATCH + 1
            && i + MAX_MATCH * 2 + 1 < inend
            && h.same[(i - MAX_MATCH) & WINDOW_MASK] as usize > MAX_MATCH
        {
            let symbolcost = costmodel.cost(MAX_MATCH as u16, 1);
            for _ in 0..MAX_MATCH {
                costs[j + MAX_MATCH] = (f64::from(costs[j]) + symbolcost) as f32;
                length_array[j + MAX_MATCH] = MAX_MATCH as u16;
                i += 1;
                j += 1;
                h.update(input, i, inend);
            }
        }

        let (leng, _) = find_longest_match(s, h, input, i, inend, MAX_MATCH, Some(&mut sublen));

        // Literal step.
        if i + 1 <= inend {
            let new_cost = costmodel.cost(u16::from(input[i]), 0) + f64::from(costs[j]);
            debug_assert!(new_cost >= 0.0);
            if new_cost < f64::from(costs[j + 1]) {
                costs[j + 1] = new_cost as f32;
                length_array[j + 1] = 1;
            }
        }
        // Match steps, one per possible length.
        let kend = (leng as usize).min(inend - i);
        let mincostaddcostj = mincost + f64::from(costs[j]);
        for k in MIN_MATCH..=kend {
            // Already cheaper than anything this model could produce.
            if f64::from(costs[j + k]) <= mincostaddcostj {
                continue;
            }
            let add_cost = costmodel.cost(k as u16, sublen[k]) + f64::from(costs[j]);
            if add_cost < f64::from(costs[j + k]) {
                costs[j + k] = add_cost as f32;
                length_array[j + k] = k as u16;
            }
        }

        i += 1;
    }

    debug_assert!(costs[blocksize] >= 0.0);
    f64::from(costs[blocksize])
}

/// Backward pass: walk `length_array` from the end to recover the step
/// lengths of the cheapest path, in forward order.
fn trace_backwards(size: usize, length_array: &[u16]) -> Vec<u16> {
    let mut path = Vec::new();
    if size == 0 {
        return path;
    }
    let mut index = size;
    loop {
        let step = length_array[index];
        debug_assert!(step as usize <= index);
        debug_assert!(step as usize <= MAX_MATCH);
        debug_assert!(step != 0);
        path.push(step);
        index -= step as usize;
        if index == 0 {
            break;
        }
    }
    path.reverse();
    path
}

/// Emit the symbols of a traced path into `store`, re-deriving each match
/// distance with a length-bounded search.
fn follow_path<'a>(
    s: &mut BlockState<'_>,
    input: &'a [u8],
    instart: usize,
    inend: usize,
    path: &[u16],
    store: &mut Lz77Store<'a>,
    h: &mut Hash,
) {
    let windowstart = instart.saturating_sub(WINDOW_SIZE);
    if instart == inend {
        return;
    }

    h.reset();
    h.warmup(input, windowstart, inend);
    for i in windowstart..instart {
        h.update(input, i, inend);
    }

    let mut pos = instart;
    for &step in path {
        let mut length = step;
        debug_assert!(pos < inend);

        h.update(input, pos, inend);

        if length as usize >= MIN_MATCH {
            let (test_length, dist) =
                find_longest_match(s, h, input, pos, inend, length as usize, None);
            debug_assert!(!(test_length != length && test_length > 2 && length > 2));
            verify_len_dist(input, inend, pos, dist, length);
            store.push(length, dist, pos);
        } else {
            length = 1;
            store.push(u16::from(input[pos]), 0, pos);
        }

        debug_assert!(pos + length as usize <= inend);
        for j in 1..length as usize {
            h.update(input, pos + j, inend);
        }
        pos += length as usize;
    }
}

/// One full shortest-path run: forward costs, backward trace, emit.
/// Returns the model's cost of the found path.
fn optimal_run<'a>(
    s: &mut BlockState<'_>,
    input: &'a [u8],
    instart: usize,
    inend: usize,
    costmodel: &CostModel<'_>,
    scratch: &mut SqueezeScratch,
    store: &mut Lz77Store<'a>,
) -> f64 {
    let cost = get_best_lengths(s, input, instart, inend, costmodel, scratch);
    let path = trace_backwards(inend - instart, &scratch.length_array);
    follow_path(s, input, instart, inend, &path, store, &mut scratch.h);
    debug_assert!(cost < LARGE_FLOAT);
    cost
}

/// Find a near-optimal parse of `instart..inend` by iterating
/// shortest-path runs, each under the statistics of the previous run's
/// parse. The best parse by true encoded size is appended to `store`.
pub fn lz77_optimal<'a>(
    s: &mut BlockState<'_>,
    input: &'a [u8],
    instart: usize,
    inend: usize,
    numiterations: u32,
    store: &mut Lz77Store<'a>,
) -> Result<()> {
    let blocksize = inend - instart;
    // At least one run must happen or nothing reaches the output store.
    let numiterations = numiterations.max(1);
    let mut scratch = SqueezeScratch::new(blocksize)?;
    let mut currentstore = Lz77Store::new(input);
    let mut ran_state = RanState::new();
    let mut lastrandomstep = None;
    let mut bestcost = LARGE_FLOAT;
    let mut lastcost = 0.0;

    // Seed the statistics from a greedy parse.
    lz77_greedy(s, input, instart, inend, &mut currentstore, &mut scratch.h);
    let mut stats = SymbolStats::from_store(&currentstore);
    let mut beststats = stats.clone();

    // Each run parses under the previous run's statistics.
    for i in 0..numiterations {
        currentstore = Lz77Store::new(input);
        optimal_run(
            s,
            input,
            instart,
            inend,
            &CostModel::Stat(&stats),
            &mut scratch,
            &mut currentstore,
        );
        let cost = crate::deflate::calculate_block_size(
            &currentstore,
            0,
            currentstore.len(),
            crate::deflate::BlockType::Dynamic,
        );
        if s.options().verbose && cost < bestcost {
            eprintln!("Iteration {i}: {} bit", cost as u64);
        }
        if cost < bestcost {
            *store = currentstore.clone();
            beststats = stats.clone();
            bestcost = cost;
        }
        let laststats = stats.clone();
        stats = SymbolStats::from_store(&currentstore);
        if lastrandomstep.is_some() {
            // Blending in the previous statistics converges slower but
            // reaches better optima once randomization has started.
            stats = SymbolStats::add_weighed_freqs(&stats, 1.0, &laststats, 0.5);
            stats.calculate();
        }
        if i > 5 && cost == lastcost {
            // Plateau: perturb the best statistics seen so far.
            stats = beststats.clone();
            stats.randomize_freqs(&mut ran_state);
            stats.calculate();
            lastrandomstep = Some(i);
        }
        lastcost = cost;
    }
    Ok(())
}

/// Optimal parse for the fixed-tree coding. The tree is known in advance,
/// so a single shortest-path run gives the exact optimum.
pub fn lz77_optimal_fixed<'a>(
    s: &mut BlockState<'_>,
    input: &'a [u8],
    instart: usize,
    inend: usize,
    store: &mut Lz77Store<'a>,
) -> Result<()> {
    let blocksize = inend - instart;
    let mut scratch = SqueezeScratch::new(blocksize)?;
    optimal_run(
        s,
        input,
        instart,
        inend,
        &CostModel::Fixed,
        &mut scratch,
        store,
    );
    Ok(())
}
