use std::sync::Arc;

use ringshard::{
    LongTokenPartitioner, Partitioner, PartitionerHandle, SortedOwnedRanges, SstableSpan, Token,
    TokenRange, WeightedRange,
};

#[allow(dead_code)]
pub const DELTA: f64 = 1e-15;

#[allow(dead_code)]
pub fn partitioner() -> PartitionerHandle {
    Arc::new(LongTokenPartitioner)
}

/// Token at fractional ring position `pos` in [0, 1].
pub fn token_at(pos: f64) -> Token {
    LongTokenPartitioner.split(Token::MINIMUM, Token::MINIMUM, pos)
}

/// Token at an integer percent-of-ring position.
#[allow(dead_code)]
pub fn token_pct(pos: i64) -> Token {
    token_at(pos as f64 / 100.0)
}

/// Percent-of-ring position of a token, rounded to the nearest integer.
#[allow(dead_code)]
pub fn percent_of(t: Token) -> i64 {
    (LongTokenPartitioner.size(Token::MINIMUM, t) * 100.0).round() as i64
}

/// The arc `(token_at(a), token_at(b)]`.
#[allow(dead_code)]
pub fn range_at(a: f64, b: f64) -> TokenRange {
    TokenRange::new(token_at(a), token_at(b))
}

/// Data file span between fractional positions, with optional coverage.
#[allow(dead_code)]
pub fn file_at(first: f64, last: f64, coverage: Option<f64>) -> SstableSpan {
    SstableSpan::new(token_at(first), token_at(last), coverage).expect("ordered span")
}

/// Owned set from consecutive (left, right) percent bound pairs; the weight
/// of each pair comes from `weight_for`, called with the pair's start offset
/// into `bounds`.
#[allow(dead_code)]
pub fn owned_from_bounds(bounds: &[i64], weight_for: impl Fn(usize) -> f64) -> SortedOwnedRanges {
    let ranges = bounds
        .chunks(2)
        .enumerate()
        .map(|(i, pair)| {
            let range = TokenRange::new(token_pct(pair[0]), token_pct(pair[1]));
            WeightedRange::new(weight_for(i * 2), range).expect("valid weight")
        })
        .collect();
    SortedOwnedRanges::new(partitioner(), ranges).expect("valid owned ranges")
}

/// Owned set from fractional (left, right) pairs, unit weight.
#[allow(dead_code)]
pub fn owned_unit(bounds: &[(f64, f64)]) -> SortedOwnedRanges {
    let ranges = bounds
        .iter()
        .map(|&(a, b)| {
            WeightedRange::new(1.0, TokenRange::new(token_at(a), token_at(b)))
                .expect("valid weight")
        })
        .collect();
    SortedOwnedRanges::new(partitioner(), ranges).expect("valid owned ranges")
}
