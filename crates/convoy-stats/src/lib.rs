//! Statistics rollup
//!
//! Aggregates a numeric metric across the dynamic set of children of a
//! parent resource (VMs of a compute host, hosts of a project). One
//! metric query is fanned out per child; per-child failures are
//! tolerated, and the merge happens once, single-threaded, after the
//! join resolves.

pub mod merge;
pub mod rollup;

// Re-exports
pub use merge::{AggregatedMetric, AggregatedStats, MetricSample, aggregate};
pub use rollup::{RollupStage, StatsRollupWorkflow};
