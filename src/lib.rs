//! # Ringshard
//!
//! Shard-boundary planning for compaction in a token-ring storage engine.
//!
//! Given the token ranges a node owns (each with an ownership weight) and the
//! disk boundaries the engine uses to stripe data across storage devices, the
//! planner subdivides the owned token space into equal-weighted shards that
//! never cross a disk boundary. It answers two questions for compaction:
//!
//! - how much of the owned token space does a given data file span (the
//!   input to density accounting), and
//! - where are the shard boundaries for a requested shard count, walked by a
//!   one-pass [`ShardTracker`] as the compaction writer streams keys.
//!
//! Plans are immutable once computed and may be shared across concurrent
//! trackers; each tracker is a single-owner cursor.

pub mod planner;
pub mod ranges;
pub mod ring;
pub mod sstable;
pub mod tracker;

// Re-export main types for convenience
pub use planner::{DiskBoundarySnapshot, ShardPlan, ShardPlanner};
pub use ranges::{SortedOwnedRanges, WeightedRange};
pub use ring::{LongTokenPartitioner, Partitioner, PartitionerHandle, Token, TokenRange};
pub use sstable::{SstableSpan, MIN_TOKEN_COVERAGE};
pub use tracker::ShardTracker;
