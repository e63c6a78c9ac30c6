//! Memoization of longest-match results.
//!
//! The optimizer runs the match finder over the same block many times (once
//! per squeeze iteration), and the matches never change between runs. This
//! cache stores, per position in the block, the best match found at the
//! full search limit, plus a compressed form of the best-distance-per-length
//! table so later queries with shorter limits can also be answered.

use crate::{MAX_MATCH, MIN_MATCH};
use oxipress_core::buffer::try_alloc_vec;
use oxipress_core::error::Result;

/// Number of (length, distance) entries stored per position.
///
/// The best distance tends to change only a few times as the length grows,
/// so a handful of run endpoints reconstructs the whole table in almost all
/// cases. When a position needs more, the table is only cached up to the
/// last entry that fits.
pub const CACHE_LENGTH: usize = 8;

/// Cached longest-match data for one block.
///
/// `length[i] == 1 && dist[i] == 0` is an invalid combination and marks a
/// position that has not been computed yet; a computed position that found
/// no match stores `length == 0, dist == 0`.
#[derive(Debug)]
pub struct MatchCache {
    /// Best match length per position.
    pub(crate) length: Vec<u16>,
    /// Best match distance per position.
    pub(crate) dist: Vec<u16>,
    /// Compressed best-distance-per-length runs, 3 bytes per entry:
    /// (length - 3, distance low byte, distance high byte).
    sublen: Vec<u8>,
}

impl MatchCache {
    /// Allocate a cache for a block of `blocksize` positions.
    pub fn new(blocksize: usize) -> Result<Self> {
        Ok(Self {
            length: try_alloc_vec(1, blocksize)?,
            dist: try_alloc_vec(0, blocksize)?,
            sublen: try_alloc_vec(0, CACHE_LENGTH * 3 * blocksize)?,
        })
    }

    /// Store the best-distance-per-length table for `pos` in compressed
    /// form. Only run endpoints (lengths where the distance changes) are
    /// kept, up to [`CACHE_LENGTH`] of them.
    pub fn sublen_to_cache(&mut self, sublen: &[u16; 259], pos: usize, length: usize) {
        if length < MIN_MATCH {
            return;
        }

        let cache = &mut self.sublen[CACHE_LENGTH * pos * 3..CACHE_LENGTH * (pos + 1) * 3];
        let mut j = 0;
        let mut bestlength = 0;
        for i in MIN_MATCH..=length {
            if i == length || sublen[i] != sublen[i + 1] {
                cache[j * 3] = (i - MIN_MATCH) as u8;
                cache[j * 3 + 1] = (sublen[i] & 0xFF) as u8;
                cache[j * 3 + 2] = (sublen[i] >> 8) as u8;
                bestlength = i;
                j += 1;
                if j >= CACHE_LENGTH {
                    break;
                }
            }
        }
        if j < CACHE_LENGTH {
            debug_assert_eq!(bestlength, length);
            cache[(CACHE_LENGTH - 1) * 3] = (bestlength - MIN_MATCH) as u8;
        } else {
            debug_assert!(bestlength <= length);
        }
        debug_assert_eq!(bestlength, self.max_cached_sublen(pos, length));
    }

    /// Expand the compressed runs for `pos` back into a
    /// best-distance-per-length table.
    pub fn cache_to_sublen(&self, pos: usize, length: usize, sublen: &mut [u16; 259]) {
        if length < MIN_MATCH {
            return;
        }

        let maxlength = self.max_cached_sublen(pos, length);
        let cache = &self.sublen[CACHE_LENGTH * pos * 3..CACHE_LENGTH * (pos + 1) * 3];
        let mut prevlength = 0;
        for j in 0..CACHE_LENGTH {
            let entry_length = cache[j * 3] as usize + MIN_MATCH;
            let dist = cache[j * 3 + 1] as u16 | ((cache[j * 3 + 2] as u16) << 8);
            for slot in &mut sublen[prevlength..=entry_length] {
                *slot = dist;
            }
            if entry_length == maxlength {
                break;
            }
            prevlength = entry_length + 1;
        }
    }

    /// Largest length whose distance is cached for `pos`, or 0 if no table
    /// is cached there.
    pub fn max_cached_sublen(&self, pos: usize, _length: usize) -> usize {
        let cache = &self.sublen[CACHE_LENGTH * pos * 3..CACHE_LENGTH * (pos + 1) * 3];
        if cache[1] == 0 && cache[2] == 0 {
            return 0; // No sublen cached
        }
        cache[(CACHE_LENGTH - 1) * 3] as usize + MIN_MATCH
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sublen_with(runs: &[(usize, usize, u16)]) -> [u16; 259] {
        let mut sublen = [0u16; 259];
        for &(from, to, dist) in runs {
            for slot in &mut sublen[from..=to] {
                *slot = dist;
            }
        }
        sublen
    }

    #[test]
    fn test_roundtrip_few_runs() {
        let mut cache = MatchCache::new(4).unwrap();
        // Distance 100 for lengths 3..=10, then 5 for 11..=20
        let sublen = sublen_with(&[(3, 10, 100), (11, 20, 5)]);
        cache.sublen_to_cache(&sublen, 2, 20);

        assert_eq!(cache.max_cached_sublen(2, 20), 20);

        let mut out = [0u16; 259];
        cache.cache_to_sublen(2, 20, &mut out);
        for i in 3..=10 {
            assert_eq!(out[i], 100, "length {}", i);
        }
        for i in 11..=20 {
            assert_eq!(out[i], 5, "length {}", i);
        }
    }

    #[test]
    fn test_single_distance_run() {
        let mut cache = MatchCache::new(1).unwrap();
        let sublen = sublen_with(&[(3, 258, 1)]);
        cache.sublen_to_cache(&sublen, 0, MAX_MATCH);

        assert_eq!(cache.max_cached_sublen(0, MAX_MATCH), MAX_MATCH);
        let mut out = [0u16; 259];
        cache.cache_to_sublen(0, MAX_MATCH, &mut out);
        assert_eq!(out[3], 1);
        assert_eq!(out[258], 1);
    }

    #[test]
    fn test_more_runs_than_entries() {
        let mut cache = MatchCache::new(1).unwrap();
        // A distance change at every length: more runs than cache entries
        let mut sublen = [0u16; 259];
        for (i, slot) in sublen.iter_mut().enumerate().skip(3) {
            *slot = 300 + i as u16;
        }
        cache.sublen_to_cache(&sublen, 0, 30);

        // Only the first CACHE_LENGTH runs fit: lengths 3..=10
        let max = cache.max_cached_sublen(0, 30);
        assert_eq!(max, MIN_MATCH + CACHE_LENGTH - 1);

        let mut out = [0u16; 259];
        cache.cache_to_sublen(0, max, &mut out);
        for i in 3..=max {
            assert_eq!(out[i], 300 + i as u16);
        }
    }

    #[test]
    fn test_uncomputed_position() {
        let cache = MatchCache::new(3).unwrap();
        // Fresh cache: length 1, dist 0 marks "not computed"
        assert_eq!(cache.length[1], 1);
        assert_eq!(cache.dist[1], 0);
        assert_eq!(cache.max_cached_sublen(1, 100), 0);
    }

    #[test]
    fn test_short_length_not_cached() {
        let mut cache = MatchCache::new(1).unwrap();
        let sublen = [0u16; 259];
        cache.sublen_to_cache(&sublen, 0, 2);
        assert_eq!(cache.max_cached_sublen(0, 2), 0);
    }
}
