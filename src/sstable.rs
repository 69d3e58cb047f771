//! # Data File Spans
//!
//! Descriptors for immutable on-disk tables as compaction sees them: the
//! first and last token a file touches, plus the token-space coverage its
//! stats metadata may have recorded. The covered fraction computed here
//! feeds the density accounting that decides when a file is worth compacting.

use crate::ranges::SortedOwnedRanges;
use crate::ring::{Token, TokenRange};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Spans below this are degenerate: a single-partition file, or a file lying
/// entirely outside the locally owned token space. One part in 2^48 of the
/// ring, comfortably above the span of any real multi-partition file.
pub const MIN_TOKEN_COVERAGE: f64 = 1.0 / (1u64 << 48) as f64;

/// Token span of one immutable data file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SstableSpan {
    /// Token of the file's first partition.
    pub first: Token,
    /// Token of the file's last partition.
    pub last: Token,
    /// The file's own estimate of the token-space fraction it covers, when
    /// its stats metadata recorded one. More accurate than the endpoint arc
    /// for files with sparse partitions.
    pub reported_coverage: Option<f64>,
}

impl SstableSpan {
    pub fn new(first: Token, last: Token, reported_coverage: Option<f64>) -> Result<Self> {
        if last < first {
            bail!("data file span out of order: first {} after last {}", first, last);
        }
        Ok(Self {
            first,
            last,
            reported_coverage,
        })
    }

    /// Span with no recorded coverage.
    pub fn between(first: Token, last: Token) -> Result<Self> {
        Self::new(first, last, None)
    }

    /// True when the file holds a single partition.
    #[inline]
    pub fn is_single_partition(&self) -> bool {
        self.first == self.last
    }

    /// The reported coverage when it is usable. NaN, zero and negative
    /// values are ignored.
    pub fn usable_coverage(&self) -> Option<f64> {
        match self.reported_coverage {
            Some(c) if c > 0.0 => Some(c),
            _ => None,
        }
    }
}

/// Fraction of the owned token space a data file spans, with corrections for
/// degenerate inputs. Precedence, first match wins:
///
/// 1. a single-partition file counts as a full unit: 1.0;
/// 2. usable reported coverage is taken as the span, without recalculation;
/// 3. otherwise the span is the weighted intersection of `(first, last]`
///    with the owned set;
/// 4. a span below [`MIN_TOKEN_COVERAGE`] is corrected to 1.0: the file is
///    either single-partition after all or entirely outside the owned space,
///    and is treated as a standalone unit either way.
pub fn range_spanned(owned: &SortedOwnedRanges, sstable: &SstableSpan) -> f64 {
    if sstable.is_single_partition() {
        return 1.0;
    }
    let span = match sstable.usable_coverage() {
        Some(coverage) => coverage,
        None => owned.weighted_intersection_size(TokenRange::new(sstable.first, sstable.last)),
    };
    if span >= MIN_TOKEN_COVERAGE {
        span
    } else {
        1.0
    }
}
