//! Compression options.
//!
//! All knobs of the encoder live in one immutable [`Options`] value passed
//! by reference to every call. The engine never mutates it, so the same
//! options can be shared across calls and threads.

/// Compression options for the exhaustive DEFLATE encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Number of squeeze iterations per block.
    ///
    /// More iterations cost more time but can improve compression. 15 is a
    /// good default; values over 1000 give diminishing returns.
    pub iteration_count: u32,
    /// Whether to split the output into multiple blocks with separate
    /// Huffman trees where that is estimated to help.
    pub block_splitting: bool,
    /// Split points are normally chosen on the uncompressed data before
    /// compressing. When set, they are chosen on the compressed
    /// representation instead, which is usually slightly worse.
    pub block_splitting_last: bool,
    /// Maximum number of blocks to split into (0 for unlimited).
    pub max_blocks: u32,
    /// Whether the greedy pass may defer a match by one byte when the next
    /// position matches longer.
    pub lazy_matching: bool,
    /// Whether to memoize longest-match results. Disabling saves memory at
    /// a large cost in speed; the output is identical either way.
    pub match_cache: bool,
    /// Print per-block progress to stderr.
    pub verbose: bool,
}

impl Options {
    /// Default effort: 15 squeeze iterations with block splitting.
    pub const DEFAULT: Self = Self {
        iteration_count: 15,
        block_splitting: true,
        block_splitting_last: false,
        max_blocks: 15,
        lazy_matching: true,
        match_cache: true,
        verbose: false,
    };

    /// Create options with a given iteration count and everything else at
    /// its default.
    pub fn with_iterations(iteration_count: u32) -> Self {
        Self {
            iteration_count,
            ..Self::DEFAULT
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::DEFAULT
    }
}
