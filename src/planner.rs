//! # Shard Planner
//!
//! Builds the immutable shard layout for a compaction job. The owned token
//! space is carved at the engine's disk boundary positions, each disk slice
//! is subdivided into equal-weighted shards, and the resulting boundary
//! sequence is shared by the stateful trackers that follow keys through it.

use crate::ranges::SortedOwnedRanges;
use crate::ring::{Token, TokenRange};
use crate::sstable::{self, SstableSpan};
use crate::tracker::ShardTracker;
use anyhow::{ensure, Result};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

/// Disk layout snapshot consumed by the planner: the owned ranges plus the
/// ordered ending positions of the disk slices. Positions mark the exclusive
/// end of each slice, so the list has one entry per disk and the last entry
/// is the end of the owned space (the ring origin for full-ring ownership).
#[derive(Debug, Clone)]
pub struct DiskBoundarySnapshot {
    pub owned: SortedOwnedRanges,
    pub positions: Vec<Token>,
}

impl DiskBoundarySnapshot {
    pub fn new(owned: SortedOwnedRanges, positions: Vec<Token>) -> Self {
        Self { owned, positions }
    }

    /// Carve the owned space into `disks` slices of equal weighted size.
    pub fn for_disk_count(owned: SortedOwnedRanges, disks: usize) -> Self {
        let positions = owned.split(disks);
        Self { owned, positions }
    }
}

/// Immutable shard layout for one `(snapshot, shard_count)` pair.
///
/// Holds one ending position per shard in ring order. The final position
/// closes the owned space; the tracker reports it as "unbounded forward".
#[derive(Debug)]
pub struct ShardPlan {
    owned: Arc<SortedOwnedRanges>,
    ends: Vec<Token>,
    first_start: Token,
}

impl ShardPlan {
    /// Number of shards in the layout.
    pub fn shard_count(&self) -> usize {
        self.ends.len()
    }

    /// Start token of shard `index`.
    pub(crate) fn start(&self, index: usize) -> Token {
        if index == 0 {
            self.first_start
        } else {
            self.ends[index - 1]
        }
    }

    /// End token of shard `index`, or None for the terminal shard.
    pub(crate) fn end(&self, index: usize) -> Option<Token> {
        if index + 1 < self.ends.len() {
            Some(self.ends[index])
        } else {
            None
        }
    }

    /// The closing position of shard `index`, terminal shard included.
    pub(crate) fn closing_end(&self, index: usize) -> Token {
        self.ends[index]
    }

    pub(crate) fn owned(&self) -> &SortedOwnedRanges {
        &self.owned
    }
}

/// Façade over shard planning for one compaction job.
///
/// Immutable after construction; may be shared among concurrent readers.
/// `range_spanned` is pure, and the plans handed to trackers are memoized
/// per shard count in an append-only map.
#[derive(Debug)]
pub struct ShardPlanner {
    owned: Arc<SortedOwnedRanges>,
    /// Ending position of every disk slice, in ring order.
    slice_ends: Vec<Token>,
    plans: Mutex<FxHashMap<usize, Arc<ShardPlan>>>,
}

impl ShardPlanner {
    /// Create a planner from a disk boundary snapshot. A snapshot with at
    /// most one position has no disk split and uses the whole owned space as
    /// a single slice.
    pub fn new(snapshot: DiskBoundarySnapshot) -> Self {
        let DiskBoundarySnapshot { owned, positions } = snapshot;
        if positions.len() <= 1 {
            Self::without_disks(owned)
        } else {
            Self {
                owned: Arc::new(owned),
                slice_ends: positions,
                plans: Mutex::new(FxHashMap::default()),
            }
        }
    }

    /// Planner over the whole owned space as a single slice.
    pub fn without_disks(owned: SortedOwnedRanges) -> Self {
        let end = owned.end_position();
        Self {
            owned: Arc::new(owned),
            slice_ends: vec![end],
            plans: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn owned(&self) -> &SortedOwnedRanges {
        &self.owned
    }

    /// Number of disk slices the planner lays shards over.
    pub fn disk_count(&self) -> usize {
        self.slice_ends.len()
    }

    /// Fraction of the owned token space the given data file spans, with the
    /// corrections for single-partition and out-of-owned-space files.
    pub fn range_spanned(&self, sstable: &SstableSpan) -> f64 {
        sstable::range_spanned(&self.owned, sstable)
    }

    /// Weighted fraction of owned space covered by an arbitrary token range,
    /// without the data file corrections.
    pub fn range_spanned_between(&self, range: TokenRange) -> f64 {
        self.owned.weighted_intersection_size(range)
    }

    /// Total weighted fraction of the ring owned locally.
    pub fn local_space_coverage(&self) -> f64 {
        self.owned.total_weighted()
    }

    /// Owned weighted fraction of the densest disk slice, the widest space
    /// any single slice's shard set is laid over. Disk slices carved with
    /// [`DiskBoundarySnapshot::for_disk_count`] are equal, but explicit disk
    /// positions may be uneven.
    pub fn shard_set_coverage(&self) -> f64 {
        let mut densest = 0.0f64;
        let mut slice_start = Token::MINIMUM;
        for &slice_end in &self.slice_ends {
            densest = densest.max(self.owned.slice(slice_start, slice_end).total_weighted());
            slice_start = slice_end;
        }
        densest
    }

    /// Compaction density: bytes per unit of spanned token space.
    pub fn density(&self, on_disk_length: u64, spanned: f64) -> f64 {
        if spanned > 0.0 {
            on_disk_length as f64 / spanned
        } else {
            on_disk_length as f64
        }
    }

    /// A fresh tracker over the layout that subdivides every disk slice into
    /// `shard_count` equal-weighted shards.
    pub fn boundaries(&self, shard_count: usize) -> Result<ShardTracker> {
        ensure!(shard_count >= 1, "shard count must be at least 1");
        Ok(ShardTracker::new(self.plan_for(shard_count)))
    }

    fn plan_for(&self, shard_count: usize) -> Arc<ShardPlan> {
        let mut plans = self.plans.lock();
        if let Some(plan) = plans.get(&shard_count) {
            return Arc::clone(plan);
        }
        let plan = Arc::new(self.build_plan(shard_count));
        debug!(
            shard_count,
            disks = self.slice_ends.len(),
            shards = plan.shard_count(),
            "computed shard layout"
        );
        Arc::clone(plans.entry(shard_count).or_insert(plan))
    }

    fn build_plan(&self, shard_count: usize) -> ShardPlan {
        let mut ends = Vec::with_capacity(self.slice_ends.len() * shard_count);
        if !self.owned.is_empty() {
            let mut slice_start = Token::MINIMUM;
            for &slice_end in &self.slice_ends {
                let slice = self.owned.slice(slice_start, slice_end);
                if slice.is_empty() {
                    // Degenerate slice: no interior boundaries, only its end.
                    ends.push(slice_end);
                } else {
                    let mut pieces = slice.split(shard_count);
                    if let Some(last) = pieces.last_mut() {
                        // The slice's terminal piece always closes at the disk
                        // boundary, so no shard crosses it.
                        *last = slice_end;
                    }
                    ends.append(&mut pieces);
                }
                slice_start = slice_end;
            }
            ends.dedup();
        }
        ShardPlan {
            owned: Arc::clone(&self.owned),
            first_start: self.owned.first_left().unwrap_or(Token::MINIMUM),
            ends,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranges::WeightedRange;
    use crate::ring::{LongTokenPartitioner, Partitioner, PartitionerHandle};

    fn partitioner() -> PartitionerHandle {
        Arc::new(LongTokenPartitioner)
    }

    fn token_at(pos: f64) -> Token {
        LongTokenPartitioner.split(Token::MINIMUM, Token::MINIMUM, pos)
    }

    fn percent_of(t: Token) -> i64 {
        (LongTokenPartitioner.size(Token::MINIMUM, t) * 100.0).round() as i64
    }

    fn full_ring_planner(disks: usize) -> ShardPlanner {
        let owned = SortedOwnedRanges::full_ring(partitioner(), 1.0).unwrap();
        ShardPlanner::new(DiskBoundarySnapshot::for_disk_count(owned, disks))
    }

    #[test]
    fn test_single_position_routes_to_single_slice() {
        let planner = full_ring_planner(1);
        assert_eq!(planner.disk_count(), 1);
        let planner = full_ring_planner(3);
        assert_eq!(planner.disk_count(), 3);
    }

    #[test]
    fn test_zero_shard_count_rejected() {
        let planner = full_ring_planner(1);
        assert!(planner.boundaries(0).is_err());
        assert!(planner.boundaries(1).is_ok());
    }

    #[test]
    fn test_plan_shape_full_ring() {
        let planner = full_ring_planner(3);
        let tracker = planner.boundaries(3).unwrap();
        assert_eq!(tracker.count(), 9);
        assert_eq!(tracker.shard_start(), Token::MINIMUM);
        assert_eq!(percent_of(tracker.shard_end().unwrap()), 11);
    }

    #[test]
    fn test_plans_are_memoized() {
        let planner = full_ring_planner(2);
        let a = planner.boundaries(4).unwrap();
        let b = planner.boundaries(4).unwrap();
        assert_eq!(a.count(), b.count());
        assert_eq!(planner.plans.lock().len(), 1);
        planner.boundaries(2).unwrap();
        assert_eq!(planner.plans.lock().len(), 2);
    }

    #[test]
    fn test_empty_owned_set_produces_terminal_plan() {
        let owned = SortedOwnedRanges::empty(partitioner());
        let planner = ShardPlanner::without_disks(owned);
        let tracker = planner.boundaries(4).unwrap();
        assert_eq!(tracker.count(), 0);
        assert_eq!(tracker.shard_end(), None);
    }

    #[test]
    fn test_degenerate_slice_contributes_only_its_end() {
        // owned space lives entirely in the first of two slices
        let owned = SortedOwnedRanges::new(
            partitioner(),
            vec![WeightedRange::new(1.0, TokenRange::new(token_at(0.1), token_at(0.3))).unwrap()],
        )
        .unwrap();
        let positions = vec![token_at(0.3), token_at(0.6)];
        let planner = ShardPlanner::new(DiskBoundarySnapshot::new(owned, positions));
        let tracker = planner.boundaries(2).unwrap();
        // first slice splits in two, second collapses to its end position
        assert_eq!(tracker.count(), 3);
    }

    #[test]
    fn test_coverage_accessors() {
        let planner = full_ring_planner(4);
        assert_eq!(planner.local_space_coverage(), 1.0);
        assert!((planner.shard_set_coverage() - 0.25).abs() < 1e-15);
        assert_eq!(planner.density(1000, 0.5), 2000.0);
        assert_eq!(planner.density(1000, 0.0), 1000.0);
    }

    #[test]
    fn test_shard_set_coverage_takes_densest_slice() {
        // uneven disk positions: slices cover 0.32, 0.40 and 0.28 of the ring
        let owned = SortedOwnedRanges::full_ring(partitioner(), 1.0).unwrap();
        let positions = vec![token_at(0.32), token_at(0.72), token_at(1.0)];
        let planner = ShardPlanner::new(DiskBoundarySnapshot::new(owned, positions));
        assert!((planner.shard_set_coverage() - 0.40).abs() < 1e-15);
    }
}
