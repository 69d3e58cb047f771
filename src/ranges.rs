//! # Owned Range Set
//!
//! The token ranges a node holds replicas for, each carrying an ownership
//! weight. Ranges are normalized at construction: wrapping arcs are cut at the
//! ring origin and the result is kept sorted in ring order, so every sweep
//! over the set is a single forward pass.

use crate::ring::{PartitionerHandle, Token, TokenRange};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Number of tokens on the ring.
const RING_TOKENS: u128 = 1u128 << 64;

/// A token range with an ownership weight (replication multiplier).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedRange {
    pub range: TokenRange,
    pub weight: f64,
}

impl WeightedRange {
    /// Create a weighted range, rejecting non-finite or non-positive weights.
    pub fn new(weight: f64, range: TokenRange) -> Result<Self> {
        if !weight.is_finite() || weight <= 0.0 {
            bail!("invalid range weight {} for {}", weight, range);
        }
        Ok(Self { range, weight })
    }

    /// Integer divisor encoding of the weight used by the equal-weight
    /// splitter: a range with weight 1/n counts one token per n. Splitting
    /// stays exact in token units this way, so boundary placement never
    /// depends on float summation order.
    fn weight_factor(&self) -> u128 {
        (1.0 / self.weight).round().max(1.0) as u128
    }

    /// Width of the range in weight-scaled token units.
    fn scaled_tokens(&self) -> u128 {
        span_tokens(self.range) / self.weight_factor()
    }
}

/// Width of a normalized (non-wrapping) arc in tokens; an arc closing at the
/// ring origin runs to the end of the ring.
fn span_tokens(range: TokenRange) -> u128 {
    let left = range.left.position();
    let right = range.right.position();
    if right > left {
        right - left
    } else {
        RING_TOKENS - left + right
    }
}

/// Ring-order minimum of two arc ends, where the origin stands for the ring end.
#[inline]
pub(crate) fn min_end(a: Token, b: Token) -> Token {
    if a == Token::MINIMUM {
        b
    } else if b == Token::MINIMUM {
        a
    } else {
        a.min(b)
    }
}

/// True when the non-wrapping arc `(start, end]` is non-empty.
#[inline]
pub(crate) fn arc_nonempty(start: Token, end: Token) -> bool {
    end == Token::MINIMUM || end > start
}

/// Clip one non-wrapping arc against another, or None when they do not meet.
fn clip(window: TokenRange, entry: TokenRange) -> Option<TokenRange> {
    let left = window.left.max(entry.left);
    let right = min_end(window.right, entry.right);
    if arc_nonempty(left, right) {
        Some(TokenRange::new(left, right))
    } else {
        None
    }
}

/// The node's owned token ranges, normalized and sorted in ring order.
///
/// Entries are pairwise disjoint non-wrapping arcs; an entry whose `right` is
/// the ring origin runs to the end of the ring, and a single
/// `(MINIMUM, MINIMUM)` entry is full ownership.
#[derive(Debug, Clone)]
pub struct SortedOwnedRanges {
    partitioner: PartitionerHandle,
    ranges: Vec<WeightedRange>,
    total_unweighted: f64,
    total_weighted: f64,
}

impl SortedOwnedRanges {
    /// Normalize and validate a set of owned ranges. Wrapping input ranges are
    /// cut at the ring origin; overlapping entries are rejected.
    pub fn new(partitioner: PartitionerHandle, input: Vec<WeightedRange>) -> Result<Self> {
        let mut ranges = Vec::with_capacity(input.len() + 1);
        for wr in input {
            if !wr.weight.is_finite() || wr.weight <= 0.0 {
                bail!("invalid range weight {} for {}", wr.weight, wr.range);
            }
            for arc in wr.range.unwrap_arcs() {
                ranges.push(WeightedRange {
                    range: arc,
                    weight: wr.weight,
                });
            }
        }
        ranges.sort_by_key(|wr| wr.range.left);
        for pair in ranges.windows(2) {
            let end = pair[0].range.right;
            if end == Token::MINIMUM || end > pair[1].range.left {
                bail!(
                    "owned ranges overlap: {} and {}",
                    pair[0].range,
                    pair[1].range
                );
            }
        }
        Ok(Self::from_normalized(partitioner, ranges))
    }

    /// Full ownership of the ring with the given weight.
    pub fn full_ring(partitioner: PartitionerHandle, weight: f64) -> Result<Self> {
        let range = WeightedRange::new(weight, TokenRange::full_ring())?;
        Self::new(partitioner, vec![range])
    }

    /// An empty owned set.
    pub fn empty(partitioner: PartitionerHandle) -> Self {
        Self::from_normalized(partitioner, Vec::new())
    }

    fn from_normalized(partitioner: PartitionerHandle, ranges: Vec<WeightedRange>) -> Self {
        let mut total_unweighted = 0.0;
        let mut total_weighted = 0.0;
        for wr in &ranges {
            let size = partitioner.size(wr.range.left, wr.range.right);
            total_unweighted += size;
            total_weighted += size * wr.weight;
        }
        Self {
            partitioner,
            ranges,
            total_unweighted,
            total_weighted,
        }
    }

    pub fn partitioner(&self) -> &PartitionerHandle {
        &self.partitioner
    }

    /// The normalized entries in ring order.
    pub fn ranges(&self) -> &[WeightedRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Owned fraction of the ring, in [0, 1].
    pub fn total_unweighted(&self) -> f64 {
        self.total_unweighted
    }

    /// Weight-scaled owned fraction of the ring.
    pub fn total_weighted(&self) -> f64 {
        self.total_weighted
    }

    /// Left endpoint of the first owned range in ring order.
    pub fn first_left(&self) -> Option<Token> {
        self.ranges.first().map(|wr| wr.range.left)
    }

    /// Ending position of the owned space: the right endpoint of the last
    /// entry, or the ring origin when nothing is owned.
    pub fn end_position(&self) -> Token {
        self.ranges
            .last()
            .map(|wr| wr.range.right)
            .unwrap_or(Token::MINIMUM)
    }

    /// Sum of unweighted arc sizes shared between the owned set and `query`.
    /// A query with equal endpoints is the whole ring.
    pub fn intersection_size(&self, query: TokenRange) -> f64 {
        if query.left == query.right {
            return self.total_unweighted;
        }
        self.fold_intersections(query, false)
    }

    /// Sum of weight-scaled arc sizes shared between the owned set and
    /// `query`. A query with equal endpoints is the whole ring.
    pub fn weighted_intersection_size(&self, query: TokenRange) -> f64 {
        if query.left == query.right {
            return self.total_weighted;
        }
        self.fold_intersections(query, true)
    }

    fn fold_intersections(&self, query: TokenRange, weighted: bool) -> f64 {
        let mut sum = 0.0;
        for arc in query.unwrap_arcs() {
            for wr in &self.ranges {
                if let Some(ix) = clip(arc, wr.range) {
                    let size = self.partitioner.size(ix.left, ix.right);
                    sum += if weighted { size * wr.weight } else { size };
                }
            }
        }
        sum
    }

    /// Restrict the owned set to the non-wrapping arc `(start, end]`,
    /// preserving weights.
    pub fn slice(&self, start: Token, end: Token) -> SortedOwnedRanges {
        let window = TokenRange::new(start, end);
        let mut ranges = Vec::new();
        for wr in &self.ranges {
            if let Some(ix) = clip(window, wr.range) {
                ranges.push(WeightedRange {
                    range: ix,
                    weight: wr.weight,
                });
            }
        }
        Self::from_normalized(self.partitioner.clone(), ranges)
    }

    /// Split the owned space into `parts` pieces of equal weighted size.
    ///
    /// Returns `parts` ending positions in ring order; the final position is
    /// the end of the owned space. The sweep runs in weight-scaled token
    /// units, so a target that lands on an entry boundary resolves exactly
    /// to the shared endpoint and placement never depends on float
    /// summation order.
    pub fn split(&self, parts: usize) -> Vec<Token> {
        if self.ranges.is_empty() || parts == 0 {
            return Vec::new();
        }
        let total: u128 = self.ranges.iter().map(|wr| wr.scaled_tokens()).sum();
        let per_part = total / parts as u128;
        if per_part == 0 {
            // Owned space too small to subdivide.
            return vec![self.end_position(); parts];
        }
        let mut boundaries = Vec::with_capacity(parts);
        let mut accumulated: u128 = 0;
        for wr in &self.ranges {
            let width = wr.scaled_tokens();
            while boundaries.len() < parts {
                let target = per_part * (boundaries.len() as u128 + 1);
                if accumulated + width < target {
                    break;
                }
                let elapsed = target - accumulated;
                let token = if elapsed >= width {
                    wr.range.right
                } else {
                    let offset = wr.range.left.position() + elapsed * wr.weight_factor();
                    Token::from_position(offset % RING_TOKENS)
                };
                boundaries.push(token);
            }
            accumulated += width;
        }
        // The last piece always closes at the end of the owned space; the
        // flooring of per_part would otherwise leave it a few tokens short.
        if let Some(last) = boundaries.last_mut() {
            *last = self.end_position();
        }
        boundaries
    }
}
