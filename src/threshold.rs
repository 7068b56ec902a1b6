//! Threshold evaluation (spec §4.6, C7).

use crate::interval::Interval;
use crate::rule::Threshold;

/// Evaluate a clause's interval against its threshold. `base` only matters
/// to an aggregator reasoning over a collection with absent members; at
/// clause granularity `total` and `available` coincide (spec §4.6).
pub fn satisfies(interval: Interval, threshold: &Threshold) -> bool {
    interval.contains_threshold(threshold.op, threshold.value)
}
