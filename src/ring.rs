//! # Token Ring Model
//!
//! The cyclic token space used to place data on nodes. Tokens are opaque,
//! totally ordered positions on a 2^64-point ring; all metric operations go
//! through the [`Partitioner`] trait so that planning code never depends on
//! the concrete token representation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Fraction of the ring covered by a single token step.
const TOKEN_FRACTION: f64 = 1.0 / 18_446_744_073_709_551_616.0; // 2^-64

/// Number of distinct tokens on the ring.
const RING_WIDTH: f64 = 18_446_744_073_709_551_616.0; // 2^64

/// A position on the token ring.
///
/// Tokens order linearly from [`Token::MINIMUM`]; the ring closes by wrapping
/// past the largest token back to the minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Token(pub i64);

impl Token {
    /// The canonical ring origin.
    pub const MINIMUM: Token = Token(i64::MIN);

    /// Offset from the ring origin, in tokens.
    pub(crate) fn position(self) -> u128 {
        self.0.wrapping_sub(i64::MIN) as u64 as u128
    }

    /// Token at the given offset from the ring origin, reduced modulo the
    /// ring width.
    pub(crate) fn from_position(value: u128) -> Token {
        Token((value as u64 as i64).wrapping_add(i64::MIN))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Metric operations over the token ring.
///
/// The one semantic contract is that `size` is additive along any forward
/// traversal: `size(a, b) + size(b, c) == size(a, c)` whenever the arc
/// `a -> b -> c` does not wrap past `a` again. All outputs are deterministic
/// for fixed inputs.
pub trait Partitioner: fmt::Debug + Send + Sync {
    /// The canonical ring origin.
    fn minimum(&self) -> Token;

    /// Fraction of the whole ring occupied by the forward arc `(left, right]`.
    ///
    /// `size(t, t)` is 1.0 (the full ring) for every `t`; this is what makes
    /// `(MINIMUM, MINIMUM)` denote complete ownership.
    fn size(&self, left: Token, right: Token) -> f64;

    /// The token at fractional position `ratio` along the forward arc
    /// `left -> right`. `split(a, b, 0.0) == a` and `split(a, b, 1.0) == b`.
    fn split(&self, left: Token, right: Token, ratio: f64) -> Token;

    /// The immediate successor of `t` in ring order, used to step past a
    /// closed boundary. `size(t, next_valid(t))` is a single token step.
    fn next_valid(&self, t: Token) -> Token;
}

/// Shared handle to a partitioner implementation.
pub type PartitionerHandle = Arc<dyn Partitioner>;

/// Fixed-width partitioner over 64-bit tokens (Murmur3-style long tokens).
#[derive(Debug, Clone, Copy, Default)]
pub struct LongTokenPartitioner;

impl Partitioner for LongTokenPartitioner {
    fn minimum(&self) -> Token {
        Token::MINIMUM
    }

    #[inline]
    fn size(&self, left: Token, right: Token) -> f64 {
        let span = (right.0.wrapping_sub(left.0) as f64) * TOKEN_FRACTION;
        if span > 0.0 {
            span
        } else {
            span + 1.0
        }
    }

    fn split(&self, left: Token, right: Token, ratio: f64) -> Token {
        if ratio <= 0.0 {
            return left;
        }
        if ratio >= 1.0 {
            return right;
        }
        let span = right.0.wrapping_sub(left.0) as u64;
        let width = if span == 0 { RING_WIDTH } else { span as f64 };
        let offset = (ratio * width) as u64;
        Token(left.0.wrapping_add(offset as i64))
    }

    #[inline]
    fn next_valid(&self, t: Token) -> Token {
        if t.0 == i64::MAX {
            Token::MINIMUM
        } else {
            Token(t.0 + 1)
        }
    }
}

/// A forward arc `(left, right]` on the ring.
///
/// The arc wraps when `right` sorts at or before `left` and is not the ring
/// origin. A `right` equal to [`Token::MINIMUM`] means the arc runs to the end
/// of the ring, and `(MINIMUM, MINIMUM)` is the full ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenRange {
    pub left: Token,
    pub right: Token,
}

impl TokenRange {
    pub fn new(left: Token, right: Token) -> Self {
        Self { left, right }
    }

    /// The range covering the whole ring.
    pub fn full_ring() -> Self {
        Self::new(Token::MINIMUM, Token::MINIMUM)
    }

    /// True when the arc crosses the ring origin.
    #[inline]
    pub fn is_wrapping(&self) -> bool {
        self.right <= self.left && self.right != Token::MINIMUM
    }

    /// Normalize into at most two non-wrapping arcs, in ring order from the
    /// origin. Non-wrapping arcs come back unchanged.
    pub fn unwrap_arcs(self) -> Vec<TokenRange> {
        if self.is_wrapping() {
            vec![
                TokenRange::new(Token::MINIMUM, self.right),
                TokenRange::new(self.left, Token::MINIMUM),
            ]
        } else {
            vec![self]
        }
    }
}

impl fmt::Display for TokenRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{}]", self.left, self.right)
    }
}
