//! LZ77 match finding against a 32 KiB sliding window.
//!
//! # Algorithm
//!
//! Matches are located through the rolling-hash chains maintained by
//! [`Hash`](crate::hash::Hash). [`find_longest_match`] walks a chain from
//! the most recent occurrence backwards, comparing candidates 8 bytes at a
//! time, and can report the best distance for every length up to the best
//! one (the `sublen` table) for use by the cost optimizer. [`lz77_greedy`]
//! turns input bytes into a symbol stream in a single pass, with one symbol
//! of lazy lookahead.
//!
//! The resulting [`Lz77Store`] keeps litlen/distance pairs together with
//! incremental histograms so block cost evaluation over arbitrary symbol
//! ranges stays cheap during block splitting.

use crate::cache::MatchCache;
use crate::hash::Hash;
use crate::huffman::{NUM_DIST_SYMBOLS, NUM_LITLEN_SYMBOLS};
use crate::options::Options;
use crate::tables::{distance_to_code, length_to_code};
use crate::{MAX_MATCH, MIN_MATCH, WINDOW_MASK, WINDOW_SIZE};
use oxipress_core::error::Result;

/// Upper bound on hash chain links followed per match search.
const MAX_CHAIN_HITS: i32 = 8192;

/// Matches beyond this distance cost at least one more extra bit, so
/// greedy selection values them one length unit lower.
const LAZY_DISTANCE_PENALTY: u16 = 1024;

/// A stream of LZ77 symbols: literals and (length, distance) references.
///
/// Stored as parallel arrays. `dists[i] == 0` marks a literal whose byte
/// value is in `litlens[i]`; otherwise `litlens[i]` is a match length in
/// 3..=258 and `dists[i]` a distance in 1..=32768. Cumulative histograms
/// are kept per chunk of symbols so any range's histogram can be derived
/// without rescanning the stream.
#[derive(Debug, Clone)]
pub struct Lz77Store<'a> {
    /// The input bytes the symbols refer to.
    data: &'a [u8],
    /// Literal byte values or match lengths.
    litlens: Vec<u16>,
    /// Match distances, 0 for literals.
    dists: Vec<u16>,
    /// Byte position in `data` where each symbol starts.
    pos: Vec<usize>,
    /// Litlen symbol (0..=285) of each entry.
    ll_symbol: Vec<u16>,
    /// Distance symbol (0..=29) of each entry, 0 for literals.
    d_symbol: Vec<u16>,
    /// Cumulative litlen histograms, one per chunk of
    /// [`NUM_LITLEN_SYMBOLS`] entries.
    ll_counts: Vec<usize>,
    /// Cumulative distance histograms, one per chunk of
    /// [`NUM_DIST_SYMBOLS`] entries.
    d_counts: Vec<usize>,
}

impl<'a> Lz77Store<'a> {
    /// Create an empty store over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            litlens: Vec::new(),
            dists: Vec::new(),
            pos: Vec::new(),
            ll_symbol: Vec::new(),
            d_symbol: Vec::new(),
            ll_counts: Vec::new(),
            d_counts: Vec::new(),
        }
    }

    /// Number of symbols in the store.
    pub fn len(&self) -> usize {
        self.litlens.len()
    }

    /// Whether the store holds no symbols.
    pub fn is_empty(&self) -> bool {
        self.litlens.is_empty()
    }

    /// The input bytes this store refers to.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Literal value or match length of symbol `i`.
    pub fn litlen(&self, i: usize) -> u16 {
        self.litlens[i]
    }

    /// Match distance of symbol `i`, 0 for a literal.
    pub fn dist(&self, i: usize) -> u16 {
        self.dists[i]
    }

    /// Byte position in the input where symbol `i` starts.
    pub fn position(&self, i: usize) -> usize {
        self.pos[i]
    }

    /// Litlen symbol (0..=285) of symbol `i`.
    pub fn litlen_symbol(&self, i: usize) -> u16 {
        self.ll_symbol[i]
    }

    /// Distance symbol (0..=29) of symbol `i`.
    pub fn dist_symbol(&self, i: usize) -> u16 {
        self.d_symbol[i]
    }

    /// Append one symbol: a literal (`dist == 0`, `length` is the byte) or
    /// a match. `pos` is the byte position the symbol starts at.
    pub fn push(&mut self, length: u16, dist: u16, pos: usize) {
        let origsize = self.litlens.len();
        let llstart = NUM_LITLEN_SYMBOLS * (origsize / NUM_LITLEN_SYMBOLS);
        let dstart = NUM_DIST_SYMBOLS * (origsize / NUM_DIST_SYMBOLS);

        // Each time the index wraps around a chunk, a new cumulative
        // histogram is started, seeded from the previous chunk's totals.
        if origsize % NUM_LITLEN_SYMBOLS == 0 {
            if origsize == 0 {
                self.ll_counts.resize(NUM_LITLEN_SYMBOLS, 0);
            } else {
                self.ll_counts
                    .extend_from_within(origsize - NUM_LITLEN_SYMBOLS..origsize);
            }
        }
        if origsize % NUM_DIST_SYMBOLS == 0 {
            if origsize == 0 {
                self.d_counts.resize(NUM_DIST_SYMBOLS, 0);
            } else {
                self.d_counts
                    .extend_from_within(origsize - NUM_DIST_SYMBOLS..origsize);
            }
        }

        debug_assert!(length < 259);
        self.litlens.push(length);
        self.dists.push(dist);
        self.pos.push(pos);

        if dist == 0 {
            debug_assert!(length < 256);
            self.ll_symbol.push(length);
            self.d_symbol.push(0);
            self.ll_counts[llstart + length as usize] += 1;
        } else {
            let (lsym, _, _) = length_to_code(length);
            let (dsym, _, _) = distance_to_code(dist);
            self.ll_symbol.push(lsym);
            self.d_symbol.push(dsym);
            self.ll_counts[llstart + lsym as usize] += 1;
            self.d_counts[dstart + dsym as usize] += 1;
        }
    }

    /// Append every symbol of `other` to this store.
    pub fn append(&mut self, other: &Lz77Store<'_>) {
        for i in 0..other.len() {
            self.push(other.litlens[i], other.dists[i], other.pos[i]);
        }
    }

    /// Number of input bytes the symbol range `lstart..lend` covers.
    pub fn byte_range(&self, lstart: usize, lend: usize) -> usize {
        if lstart == lend {
            return 0;
        }
        let l = lend - 1;
        let last = if self.dists[l] == 0 {
            1
        } else {
            self.litlens[l] as usize
        };
        self.pos[l] + last - self.pos[lstart]
    }

    /// Cumulative histogram covering symbols `0..=lpos`.
    fn histogram_at(
        &self,
        lpos: usize,
        ll_counts: &mut [usize; NUM_LITLEN_SYMBOLS],
        d_counts: &mut [usize; NUM_DIST_SYMBOLS],
    ) {
        // Take the chunk histogram and subtract the entries pushed after
        // lpos within the same chunk.
        let llpos = NUM_LITLEN_SYMBOLS * (lpos / NUM_LITLEN_SYMBOLS);
        let dpos = NUM_DIST_SYMBOLS * (lpos / NUM_DIST_SYMBOLS);
        ll_counts.copy_from_slice(&self.ll_counts[llpos..llpos + NUM_LITLEN_SYMBOLS]);
        let mut i = lpos + 1;
        while i < llpos + NUM_LITLEN_SYMBOLS && i < self.len() {
            ll_counts[self.ll_symbol[i] as usize] -= 1;
            i += 1;
        }
        d_counts.copy_from_slice(&self.d_counts[dpos..dpos + NUM_DIST_SYMBOLS]);
        let mut i = lpos + 1;
        while i < dpos + NUM_DIST_SYMBOLS && i < self.len() {
            if self.dists[i] != 0 {
                d_counts[self.d_symbol[i] as usize] -= 1;
            }
            i += 1;
        }
    }

    /// Litlen and distance symbol histograms for the range `lstart..lend`.
    pub fn histogram(
        &self,
        lstart: usize,
        lend: usize,
    ) -> ([usize; NUM_LITLEN_SYMBOLS], [usize; NUM_DIST_SYMBOLS]) {
        let mut ll_counts = [0usize; NUM_LITLEN_SYMBOLS];
        let mut d_counts = [0usize; NUM_DIST_SYMBOLS];
        if lstart + NUM_LITLEN_SYMBOLS * 3 > lend {
            // Short ranges are cheaper to count directly.
            for i in lstart..lend {
                ll_counts[self.ll_symbol[i] as usize] += 1;
                if self.dists[i] != 0 {
                    d_counts[self.d_symbol[i] as usize] += 1;
                }
            }
        } else {
            // Subtract the cumulative histogram before lstart from the one
            // at the end of the range.
            self.histogram_at(lend - 1, &mut ll_counts, &mut d_counts);
            if lstart > 0 {
                let mut ll2 = [0usize; NUM_LITLEN_SYMBOLS];
                let mut d2 = [0usize; NUM_DIST_SYMBOLS];
                self.histogram_at(lstart - 1, &mut ll2, &mut d2);
                for (count, before) in ll_counts.iter_mut().zip(&ll2) {
                    *count -= before;
                }
                for (count, before) in d_counts.iter_mut().zip(&d2) {
                    *count -= before;
                }
            }
        }
        (ll_counts, d_counts)
    }
}

/// Per-block search context: the options in force plus the optional
/// longest-match cache for the block's byte range.
#[derive(Debug)]
pub struct BlockState<'a> {
    options: &'a Options,
    /// Longest-match memoization covering `blockstart..blockend`.
    lmc: Option<MatchCache>,
    blockstart: usize,
    blockend: usize,
}

impl<'a> BlockState<'a> {
    /// Create a block state for the byte range `blockstart..blockend`.
    /// A match cache is allocated when `add_cache` is set and the options
    /// have not disabled caching.
    pub fn new(
        options: &'a Options,
        blockstart: usize,
        blockend: usize,
        add_cache: bool,
    ) -> Result<Self> {
        let lmc = if add_cache && options.match_cache {
            Some(MatchCache::new(blockend - blockstart)?)
        } else {
            None
        };
        Ok(Self {
            options,
            lmc,
            blockstart,
            blockend,
        })
    }

    /// The options this block is being compressed with.
    pub fn options(&self) -> &'a Options {
        self.options
    }

    /// Start of the block's byte range.
    pub fn blockstart(&self) -> usize {
        self.blockstart
    }

    /// End of the block's byte range.
    pub fn blockend(&self) -> usize {
        self.blockend
    }

    /// Answer a match query from the cache if possible. May lower `limit`
    /// to the cached best length when the full result cannot be served but
    /// the search bound is known.
    fn try_get_from_cache(
        &self,
        pos: usize,
        limit: &mut usize,
        sublen: &mut Option<&mut [u16; 259]>,
    ) -> Option<(u16, u16)> {
        let lmc = self.lmc.as_ref()?;
        let lmcpos = pos - self.blockstart;

        // length == 1 with dist == 0 marks an uncomputed entry.
        let cache_available = lmc.length[lmcpos] == 0 || lmc.dist[lmcpos] != 0;
        if !cache_available {
            return None;
        }
        let max_sublen = lmc.max_cached_sublen(lmcpos, lmc.length[lmcpos] as usize);
        let limit_ok_for_cache = *limit == MAX_MATCH
            || lmc.length[lmcpos] as usize <= *limit
            || (sublen.is_some() && max_sublen >= *limit);
        if !limit_ok_for_cache {
            return None;
        }

        if sublen.is_none() || lmc.length[lmcpos] as usize <= max_sublen {
            let mut length = lmc.length[lmcpos];
            if length as usize > *limit {
                length = *limit as u16;
            }
            let distance;
            if let Some(sub) = sublen.as_deref_mut() {
                lmc.cache_to_sublen(lmcpos, length as usize, sub);
                distance = sub[length as usize];
                if *limit == MAX_MATCH && length as usize >= MIN_MATCH {
                    debug_assert_eq!(distance, lmc.dist[lmcpos]);
                }
            } else {
                distance = lmc.dist[lmcpos];
            }
            return Some((length, distance));
        }
        // The sublen table was not fully cached, so the distances must be
        // recomputed, but the cached best length still bounds the search.
        *limit = lmc.length[lmcpos] as usize;
        None
    }

    /// Record a completed full-limit search in the cache.
    fn store_in_cache(
        &mut self,
        pos: usize,
        limit: usize,
        sublen: Option<&[u16; 259]>,
        distance: u16,
        length: u16,
    ) {
        let blockstart = self.blockstart;
        let Some(lmc) = self.lmc.as_mut() else {
            return;
        };
        let Some(sublen) = sublen else {
            return;
        };
        if limit != MAX_MATCH {
            return;
        }
        let lmcpos = pos - blockstart;
        let cache_available = lmc.length[lmcpos] == 0 || lmc.dist[lmcpos] != 0;
        if cache_available {
            return;
        }
        debug_assert!(lmc.length[lmcpos] == 1 && lmc.dist[lmcpos] == 0);
        if (length as usize) < MIN_MATCH {
            lmc.dist[lmcpos] = 0;
            lmc.length[lmcpos] = 0;
        } else {
            lmc.dist[lmcpos] = distance;
            lmc.length[lmcpos] = length;
        }
        debug_assert!(!(lmc.length[lmcpos] == 1 && lmc.dist[lmcpos] == 0));
        lmc.sublen_to_cache(sublen, lmcpos, length as usize);
    }
}

/// Advance `scan` while it matches the bytes at `mat`, up to `end`.
/// Compares 8-byte chunks first, then finishes bytewise.
fn get_match(data: &[u8], mut scan: usize, mut mat: usize, end: usize) -> usize {
    while scan + 8 <= end {
        let a = data[scan..].first_chunk::<8>();
        let b = data[mat..].first_chunk::<8>();
        match (a, b) {
            (Some(a), Some(b)) if a == b => {
                scan += 8;
                mat += 8;
            }
            _ => break,
        }
    }
    while scan < end && data[scan] == data[mat] {
        scan += 1;
        mat += 1;
    }
    scan
}

/// Check that a (length, distance) pair really reproduces the input.
pub(crate) fn verify_len_dist(data: &[u8], datasize: usize, pos: usize, dist: u16, length: u16) {
    debug_assert!(pos + length as usize <= datasize);
    debug_assert!(
        (0..length as usize).all(|i| data[pos - dist as usize + i] == data[pos + i]),
        "match at pos {pos} dist {dist} len {length} does not reproduce the input"
    );
}

/// Find the longest match for `pos` within the window, searching lengths up
/// to `limit`. Returns `(length, distance)`; `(0, 0)` when fewer than
/// [`MIN_MATCH`] bytes remain. When `sublen` is given, `sublen[k]` receives
/// the nearest distance for each length `k` up to the returned one.
///
/// `h` must be up to date for `pos`. Results at the full limit are
/// memoized in the block's match cache when one is present.
pub fn find_longest_match(
    s: &mut BlockState<'_>,
    h: &Hash,
    data: &[u8],
    pos: usize,
    size: usize,
    mut limit: usize,
    mut sublen: Option<&mut [u16; 259]>,
) -> (u16, u16) {
    if let Some((length, distance)) = s.try_get_from_cache(pos, &mut limit, &mut sublen) {
        debug_assert!(pos + length as usize <= size);
        return (length, distance);
    }

    debug_assert!(limit <= MAX_MATCH);
    debug_assert!(limit >= MIN_MATCH);
    debug_assert!(pos < size);

    if size - pos < MIN_MATCH {
        // Not enough bytes left for even the shortest match.
        return (0, 0);
    }
    if pos + limit > size {
        limit = size - pos;
    }

    let hpos = pos & WINDOW_MASK;
    let mut bestdist: u16 = 0;
    let mut bestlength: u16 = 1;
    let mut chain_counter = MAX_CHAIN_HITS;

    // Start on the plain hash chain; switch to the run-keyed chain once
    // the best length reaches the run length at this position.
    let mut prev = &h.prev;
    let mut hashval = &h.hashval;
    let mut hval = i32::from(h.val);
    let mut switched = false;

    let mut pp = h.head[hval as usize] as usize;
    debug_assert_eq!(pp, hpos);
    let mut p = prev[pp] as usize;

    let mut dist = if p < pp {
        pp - p
    } else {
        (WINDOW_SIZE - p) + pp
    };

    while dist < WINDOW_SIZE {
        debug_assert!(p < WINDOW_SIZE);
        debug_assert_eq!(p, prev[pp] as usize);
        debug_assert_eq!(hashval[p], hval);

        if dist > 0 {
            debug_assert!(dist <= pos);

            let mut scan = pos;
            let mut mat = pos - dist;
            let mut currentlength = 0u16;

            // Testing the byte at bestlength first rejects most candidates
            // without a full comparison.
            if pos + (bestlength as usize) >= size
                || data[scan + bestlength as usize] == data[mat + bestlength as usize]
            {
                let same0 = h.same[hpos];
                if same0 > 2 && data[scan] == data[mat] {
                    // Both positions sit in runs of one repeated byte;
                    // skip the shared prefix in one step.
                    let same1 = h.same[mat & WINDOW_MASK];
                    let same = (same0.min(same1) as usize).min(limit);
                    scan += same;
                    mat += same;
                }
                scan = get_match(data, scan, mat, pos + limit);
                currentlength = (scan - pos) as u16;
            }

            if currentlength > bestlength {
                if let Some(sub) = sublen.as_deref_mut() {
                    for j in (bestlength + 1)..=currentlength {
                        sub[j as usize] = dist as u16;
                    }
                }
                bestdist = dist as u16;
                bestlength = currentlength;
                if currentlength as usize >= limit {
                    break;
                }
            }
        }

        if !switched && bestlength >= h.same[hpos] && i32::from(h.val2) == h.hashval2[p] {
            switched = true;
            prev = &h.prev2;
            hashval = &h.hashval2;
            hval = i32::from(h.val2);
        }

        pp = p;
        p = prev[p] as usize;
        if p == pp {
            // Reached the chain's own sentinel: no older occurrence.
            break;
        }

        dist += if p < pp {
            pp - p
        } else {
            (WINDOW_SIZE - p) + pp
        };

        chain_counter -= 1;
        if chain_counter <= 0 {
            break;
        }
    }

    s.store_in_cache(pos, limit, sublen.as_deref(), bestdist, bestlength);

    debug_assert!(bestlength as usize <= limit);
    debug_assert!(pos + bestlength as usize <= size);
    (bestlength, bestdist)
}

/// Effective length of a match for greedy selection. Distant matches need
/// more extra bits, so they must win by more than their raw length.
fn length_score(length: u16, distance: u16) -> u16 {
    if distance > LAZY_DISTANCE_PENALTY {
        length - 1
    } else {
        length
    }
}

/// Single-pass LZ77 with one symbol of lazy lookahead, appending symbols
/// for `instart..inend` to `store`. The bytes before `instart` (up to one
/// window) serve as history. This is the fast parse used to seed the
/// optimizer and to pick block split points.
pub fn lz77_greedy(
    s: &mut BlockState<'_>,
    input: &[u8],
    instart: usize,
    inend: usize,
    store: &mut Lz77Store<'_>,
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

    let mut dummysublen = [0u16; 259];

    // Lazy matching state: a match found at i-1 that may still be beaten.
    let mut match_available = false;
    let mut prev_length: u16 = 0;
    let mut prev_match: u16 = 0;
    let lazy = s.options().lazy_matching;

    let mut i = instart;
    while i < inend {
        h.update(input, i, inend);

        let (mut leng, mut dist) =
            find_longest_match(s, h, input, i, inend, MAX_MATCH, Some(&mut dummysublen));
        let lengthscore = length_score(leng, dist);

        if lazy {
            let prevlengthscore = length_score(prev_length, prev_match);
            if match_available {
                match_available = false;
                if lengthscore > prevlengthscore + 1 {
                    store.push(u16::from(input[i - 1]), 0, i - 1);
                    if lengthscore as usize >= MIN_MATCH && (leng as usize) < MAX_MATCH {
                        match_available = true;
                        prev_length = leng;
                        prev_match = dist;
                        i += 1;
                        continue;
                    }
                } else {
                    // The deferred match wins; emit it at i-1.
                    leng = prev_length;
                    dist = prev_match;
                    verify_len_dist(input, inend, i - 1, dist, leng);
                    store.push(leng, dist, i - 1);
                    for _ in 2..leng {
                        debug_assert!(i < inend);
                        i += 1;
                        h.update(input, i, inend);
                    }
                    i += 1;
                    continue;
                }
            } else if lengthscore as usize >= MIN_MATCH && (leng as usize) < MAX_MATCH {
                // Defer: the next position may hold a longer match.
                match_available = true;
                prev_length = leng;
                prev_match = dist;
                i += 1;
                continue;
            }
        }

        if lengthscore as usize >= MIN_MATCH {
            verify_len_dist(input, inend, i, dist, leng);
            store.push(leng, dist, i);
        } else {
            leng = 1;
            store.push(u16::from(input[i]), 0, i);
        }
        for _ in 1..leng {
            debug_assert!(i < inend);
            i += 1;
            h.update(input, i, inend);
        }
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Decode a symbol range back into bytes by replaying literals and
    /// window copies.
    fn reconstruct(store: &Lz77Store<'_>) -> Vec<u8> {
        let mut out = Vec::new();
        for i in 0..store.len() {
            if store.dist(i) == 0 {
                out.push(store.litlen(i) as u8);
            } else {
                let dist = store.dist(i) as usize;
                for _ in 0..store.litlen(i) {
                    let b = out[out.len() - dist];
                    out.push(b);
                }
            }
        }
        out
    }

    fn greedy_store<'a>(options: &Options, data: &'a [u8]) -> Lz77Store<'a> {
        let mut s = BlockState::new(options, 0, data.len(), false).unwrap();
        let mut h = Hash::new().unwrap();
        let mut store = Lz77Store::new(data);
        lz77_greedy(&mut s, data, 0, data.len(), &mut store, &mut h);
        store
    }

    fn pseudo_random(len: usize) -> Vec<u8> {
        let mut state = 0x2545_f491u32;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
                (state >> 16) as u8
            })
            .collect()
    }

    #[test]
    fn test_greedy_roundtrip_text() {
        let data = b"the quick brown fox jumps over the lazy dog. \
                     the quick brown fox jumps over the lazy dog again.";
        let options = Options::default();
        let store = greedy_store(&options, data);
        assert_eq!(reconstruct(&store), data);
        // The repeated sentence must produce at least one long match.
        assert!((0..store.len()).any(|i| store.dist(i) > 0 && store.litlen(i) > 10));
    }

    #[test]
    fn test_greedy_roundtrip_runs() {
        let mut data = vec![0u8; 2000];
        data.extend_from_slice(b"tail");
        let options = Options::default();
        let store = greedy_store(&options, &data);
        assert_eq!(reconstruct(&store), data);
    }

    #[test]
    fn test_greedy_roundtrip_random() {
        let data = pseudo_random(3000);
        let options = Options::default();
        let store = greedy_store(&options, &data);
        assert_eq!(reconstruct(&store), data);
    }

    #[test]
    fn test_greedy_without_lazy_matching() {
        let data = b"abcde_bcdefgh_abcdefghxxx".repeat(8);
        let options = Options {
            lazy_matching: false,
            ..Options::default()
        };
        let store = greedy_store(&options, &data);
        assert_eq!(reconstruct(&store), data);
    }

    #[test]
    fn test_find_longest_match_simple() {
        let data = b"abcabcabc";
        let options = Options::default();
        let mut s = BlockState::new(&options, 0, data.len(), false).unwrap();
        let mut h = Hash::new().unwrap();
        h.reset();
        h.warmup(data, 0, data.len());
        for i in 0..=3 {
            h.update(data, i, data.len());
        }
        let (len, dist) = find_longest_match(&mut s, &h, data, 3, data.len(), MAX_MATCH, None);
        assert_eq!(dist, 3);
        assert_eq!(len, 6);
    }

    #[test]
    fn test_find_longest_match_too_short() {
        let data = b"xyzab";
        let options = Options::default();
        let mut s = BlockState::new(&options, 0, data.len(), false).unwrap();
        let mut h = Hash::new().unwrap();
        h.reset();
        h.warmup(data, 0, data.len());
        for i in 0..=3 {
            h.update(data, i, data.len());
        }
        // Two bytes remain at pos 3: no match possible.
        let (len, dist) = find_longest_match(&mut s, &h, data, 3, data.len(), MAX_MATCH, None);
        assert_eq!((len, dist), (0, 0));
    }

    #[test]
    fn test_sublen_distances_are_valid() {
        let data = b"abcd_abcd_abcd_abcd_abcd";
        let options = Options::default();
        let mut s = BlockState::new(&options, 0, data.len(), false).unwrap();
        let mut h = Hash::new().unwrap();
        h.reset();
        h.warmup(data, 0, data.len());
        for i in 0..=15 {
            h.update(data, i, data.len());
        }
        let mut sublen = [0u16; 259];
        let (len, _) = find_longest_match(
            &mut s,
            &h,
            data,
            15,
            data.len(),
            MAX_MATCH,
            Some(&mut sublen),
        );
        assert!(len as usize >= MIN_MATCH);
        for k in MIN_MATCH..=len as usize {
            let d = sublen[k] as usize;
            assert!(d > 0, "no distance for length {}", k);
            for j in 0..k {
                assert_eq!(data[15 + j - d], data[15 + j]);
            }
        }
    }

    #[test]
    fn test_match_cache_does_not_change_output() {
        let data = b"abcabcabc_the_quick_brown_abcabcabc_fox".repeat(20);
        let options = Options::default();

        let cached = {
            let mut s = BlockState::new(&options, 0, data.len(), true).unwrap();
            let mut h = Hash::new().unwrap();
            let mut store = Lz77Store::new(&data);
            lz77_greedy(&mut s, &data, 0, data.len(), &mut store, &mut h);
            (0..store.len())
                .map(|i| (store.litlen(i), store.dist(i)))
                .collect::<Vec<_>>()
        };
        let uncached = {
            let store = greedy_store(&options, &data);
            (0..store.len())
                .map(|i| (store.litlen(i), store.dist(i)))
                .collect::<Vec<_>>()
        };
        assert_eq!(cached, uncached);
    }

    #[test]
    fn test_distances_stay_within_window() {
        // A marker early in the input, repeated after more than a window
        // of filler: the second copy must not reference the first.
        let mut data = Vec::new();
        data.extend_from_slice(b"MARKER!!");
        data.extend(pseudo_random(40000));
        data.extend_from_slice(b"MARKER!!");
        let options = Options::default();
        let store = greedy_store(&options, &data);
        assert_eq!(reconstruct(&store), data);
        for i in 0..store.len() {
            let dist = store.dist(i) as usize;
            assert!(dist <= WINDOW_SIZE);
            assert!(dist <= store.position(i));
        }
    }

    #[test]
    fn test_byte_range_and_positions() {
        let data = b"aaaaaaaaaaaaaaaaaaaabbbb";
        let options = Options::default();
        let store = greedy_store(&options, data);
        assert_eq!(store.byte_range(0, store.len()), data.len());
        // Positions are strictly increasing and start at 0.
        assert_eq!(store.position(0), 0);
        for i in 1..store.len() {
            assert!(store.position(i) > store.position(i - 1));
        }
    }

    #[test]
    fn test_histogram_matches_direct_count() {
        // Enough symbols to exercise the cumulative-chunk path.
        let data = pseudo_random(4000);
        let options = Options::default();
        let store = greedy_store(&options, &data);
        assert!(store.len() > NUM_LITLEN_SYMBOLS * 3 + 20);

        let lstart = 5;
        let lend = store.len() - 3;
        let (ll, d) = store.histogram(lstart, lend);

        let mut ll_direct = [0usize; NUM_LITLEN_SYMBOLS];
        let mut d_direct = [0usize; NUM_DIST_SYMBOLS];
        for i in lstart..lend {
            if store.dist(i) == 0 {
                ll_direct[store.litlen(i) as usize] += 1;
            } else {
                let (lsym, _, _) = length_to_code(store.litlen(i));
                let (dsym, _, _) = distance_to_code(store.dist(i));
                ll_direct[lsym as usize] += 1;
                d_direct[dsym as usize] += 1;
            }
        }
        assert_eq!(ll, ll_direct);
        assert_eq!(d, d_direct);
    }

    #[test]
    fn test_append_preserves_histograms() {
        let data = pseudo_random(2500);
        let options = Options::default();
        let store = greedy_store(&options, &data);

        let mut combined = Lz77Store::new(&data);
        combined.append(&store);
        assert_eq!(combined.len(), store.len());
        assert_eq!(
            combined.histogram(0, combined.len()),
            store.histogram(0, store.len())
        );
        assert_eq!(reconstruct(&combined), data);
    }
}
