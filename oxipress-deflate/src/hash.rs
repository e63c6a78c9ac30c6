//! Rolling hash and match chains for the LZ77 match finder.
//!
//! Every window position is linked into a chain of earlier positions that
//! hashed to the same value, so candidate match starts can be walked from
//! newest to oldest. Two chain families are kept: one keyed by the hash of
//! the next three bytes, and a second keyed by that hash combined with the
//! length of the run of identical bytes at the position. The second chain
//! lets the finder jump between runs of the same byte without scanning
//! every position inside them.

use crate::{MIN_MATCH, WINDOW_MASK, WINDOW_SIZE};
use oxipress_core::buffer::try_alloc_vec;
use oxipress_core::error::Result;

/// Bits shifted into the rolling hash per byte.
const HASH_SHIFT: u32 = 5;

/// Mask keeping the rolling hash at 15 bits.
const HASH_MASK: u16 = 32767;

/// Number of hash buckets (one per possible 15-bit hash value).
const HASH_SIZE: usize = 32768;

/// Hash chain state over the current window.
///
/// `head` maps a hash value to the most recent window position that had it;
/// `prev` links each position to the previous one with the same value. A
/// position whose `prev` entry points to itself is the end of its chain.
/// Entries are only trusted when the stored `hashval` still matches, since
/// slots are reused as the window slides.
#[derive(Debug)]
pub struct Hash {
    /// Head of the chain for each hash value, -1 if empty.
    pub(crate) head: Vec<i32>,
    /// Previous position with the same hash, indexed by window position.
    pub(crate) prev: Vec<u16>,
    /// Hash value at each window position, -1 if unset.
    pub(crate) hashval: Vec<i32>,
    /// Current rolling hash value.
    pub(crate) val: u16,

    /// Head of the second chain for each hash value, -1 if empty.
    pub(crate) head2: Vec<i32>,
    /// Previous position in the second chain.
    pub(crate) prev2: Vec<u16>,
    /// Second hash value at each window position, -1 if unset.
    pub(crate) hashval2: Vec<i32>,
    /// Current second hash value.
    pub(crate) val2: u16,

    /// Length of the run of bytes equal to `data[pos]` starting at each
    /// window position.
    pub(crate) same: Vec<u16>,
}

impl Hash {
    /// Allocate hash state for one window.
    pub fn new() -> Result<Self> {
        Ok(Self {
            head: try_alloc_vec(-1, HASH_SIZE)?,
            prev: try_alloc_vec(0, WINDOW_SIZE)?,
            hashval: try_alloc_vec(-1, WINDOW_SIZE)?,
            val: 0,
            head2: try_alloc_vec(-1, HASH_SIZE)?,
            prev2: try_alloc_vec(0, WINDOW_SIZE)?,
            hashval2: try_alloc_vec(-1, WINDOW_SIZE)?,
            val2: 0,
            same: try_alloc_vec(0, WINDOW_SIZE)?,
        })
    }

    /// Reset to the empty state so the same allocation can be reused for a
    /// new range.
    pub fn reset(&mut self) {
        self.val = 0;
        self.head.fill(-1);
        self.hashval.fill(-1);
        for (i, p) in self.prev.iter_mut().enumerate() {
            // prev[i] == i marks the end of a chain
            *p = i as u16;
        }
        self.same.fill(0);

        self.val2 = 0;
        self.head2.fill(-1);
        self.hashval2.fill(-1);
        for (i, p) in self.prev2.iter_mut().enumerate() {
            *p = i as u16;
        }
    }

    /// Shift one byte into the rolling hash.
    #[inline]
    fn update_value(&mut self, c: u8) {
        self.val = ((self.val << HASH_SHIFT) ^ c as u16) & HASH_MASK;
    }

    /// Prefill the rolling hash with the bytes at `pos` (and `pos + 1` if
    /// available) so that the first `update` call completes a full triple.
    pub fn warmup(&mut self, data: &[u8], pos: usize, end: usize) {
        self.update_value(data[pos]);
        if pos + 1 < end {
            self.update_value(data[pos + 1]);
        }
    }

    /// Register position `pos` in the chains.
    ///
    /// Must be called for every position in order; `end` is the exclusive
    /// end of the data range being indexed.
    pub fn update(&mut self, data: &[u8], pos: usize, end: usize) {
        let hpos = pos & WINDOW_MASK;

        // Complete the triple covering [pos, pos + 2]; near the end of the
        // data a zero byte stands in for the missing one
        let c = if end - pos < MIN_MATCH {
            0
        } else {
            data[pos + MIN_MATCH - 1]
        };
        self.update_value(c);

        self.hashval[hpos] = self.val as i32;
        let head = self.head[self.val as usize];
        if head != -1 && self.hashval[head as usize] == self.val as i32 {
            self.prev[hpos] = head as u16;
        } else {
            self.prev[hpos] = hpos as u16;
        }
        self.head[self.val as usize] = hpos as i32;

        // Length of the run of identical bytes starting here; the previous
        // position's run length gives a head start
        let mut amount: usize = 0;
        let prev_same = self.same[pos.wrapping_sub(1) & WINDOW_MASK];
        if prev_same > 1 {
            amount = prev_same as usize - 1;
        }
        while pos + amount + 1 < end
            && data[pos] == data[pos + amount + 1]
            && amount < u16::MAX as usize
        {
            amount += 1;
        }
        self.same[hpos] = amount as u16;

        // Second chain, keyed by hash and run length together
        self.val2 = ((self.same[hpos].wrapping_sub(MIN_MATCH as u16)) & 255) ^ self.val;
        self.hashval2[hpos] = self.val2 as i32;
        let head2 = self.head2[self.val2 as usize];
        if head2 != -1 && self.hashval2[head2 as usize] == self.val2 as i32 {
            self.prev2[hpos] = head2 as u16;
        } else {
            self.prev2[hpos] = hpos as u16;
        }
        self.head2[self.val2 as usize] = hpos as i32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_over(data: &[u8]) -> Hash {
        let mut h = Hash::new().unwrap();
        h.reset();
        h.warmup(data, 0, data.len());
        for i in 0..data.len() {
            h.update(data, i, data.len());
        }
        h
    }

    #[test]
    fn test_chain_links_repeated_triples() {
        // "abc" occurs at positions 0, 3 and 6; the chain must link them
        // newest to oldest
        let h = hash_over(b"abcabcabc");

        let val = h.hashval[6];
        assert!(val >= 0);
        assert_eq!(h.head[val as usize], 6);
        assert_eq!(h.prev[6], 3);
        assert_eq!(h.prev[3], 0);
        assert_eq!(h.prev[0], 0); // end of chain
    }

    #[test]
    fn test_distinct_triples_have_no_chain() {
        let h = hash_over(b"abcdefgh");

        for pos in 0..6 {
            assert_eq!(h.prev[pos], pos as u16, "position {} should be a chain end", pos);
        }
    }

    #[test]
    fn test_same_run_lengths() {
        let h = hash_over(b"aaaabc");

        // At position 0 three more 'a' bytes follow
        assert_eq!(h.same[0], 3);
        assert_eq!(h.same[1], 2);
        assert_eq!(h.same[2], 1);
        assert_eq!(h.same[3], 0);
        assert_eq!(h.same[4], 0);
    }

    #[test]
    fn test_reset_clears_chains() {
        let mut h = Hash::new().unwrap();
        h.reset();
        let data = b"abcabc";
        h.warmup(data, 0, data.len());
        for i in 0..data.len() {
            h.update(data, i, data.len());
        }

        h.reset();
        assert!(h.head.iter().all(|&x| x == -1));
        assert!(h.hashval.iter().all(|&x| x == -1));
        assert_eq!(h.same[0], 0);
        assert_eq!(h.val, 0);
    }
}
