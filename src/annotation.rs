//! Annotation (aggregation) registry (spec §4.7, C8).
//!
//! An annotation combines a rule's per-clause intervals into a single head
//! interval. Every function here is total: an empty clause list or a
//! degenerate weighting returns [`Interval::FULL`] with a logged warning,
//! never a panic (spec §4.7, §7).

use std::collections::HashMap;

use crate::interval::Interval;

/// Context threaded into annotations from engine configuration (spec §6
/// `annotation_context`) -- currently just fallback precedent weights.
#[derive(Debug, Clone, Default)]
pub struct AnnotationContext {
    pub precedent_weights: HashMap<String, f64>,
}

/// The fixed set of annotation names the DSL compiler accepts (spec §4.7).
pub const BUILTIN_ANNOTATIONS: &[&str] = &[
    "average",
    "average_lower",
    "maximum",
    "minimum",
    "legal_burden_civil_051",
    "legal_burden_clear_075",
    "legal_burden_criminal_090",
    "legal_conservative_min",
    "precedent_weighted",
];

pub fn is_known_annotation(name: &str) -> bool {
    BUILTIN_ANNOTATIONS.contains(&name)
}

/// One clause's contribution to the aggregation: its interval, plus (for
/// `precedent_weighted` only) the clause class it was tagged with.
#[derive(Debug, Clone)]
pub struct ClauseContribution {
    pub interval: Interval,
    pub clause_class: Option<String>,
}

/// Combine clause contributions into a head interval using the named
/// annotation. The DSL compiler already rejected unknown names, so `name`
/// is expected to be one of [`BUILTIN_ANNOTATIONS`]; an unrecognized name
/// reaching here is treated the same as an empty clause list.
pub fn apply(
    name: &str,
    clauses: &[ClauseContribution],
    rule_weights: &HashMap<String, f64>,
    context: &AnnotationContext,
) -> Interval {
    if clauses.is_empty() {
        tracing::warn!(annotation = name, "empty clause list, returning [0,1]");
        return Interval::FULL;
    }

    match name {
        "average" => average(clauses),
        "average_lower" => average_lower(clauses),
        "maximum" => maximum(clauses),
        "minimum" | "legal_conservative_min" => minimum(clauses),
        "legal_burden_civil_051" => legal_burden(clauses, 0.51),
        "legal_burden_clear_075" => legal_burden(clauses, 0.75),
        "legal_burden_criminal_090" => legal_burden(clauses, 0.90),
        "precedent_weighted" => precedent_weighted(clauses, rule_weights, context),
        other => {
            tracing::warn!(annotation = other, "unknown annotation at runtime, returning [0,1]");
            Interval::FULL
        }
    }
}

fn average(clauses: &[ClauseContribution]) -> Interval {
    let n = clauses.len() as f64;
    let l = clauses.iter().map(|c| c.interval.lower()).sum::<f64>() / n;
    let u = clauses.iter().map(|c| c.interval.upper()).sum::<f64>() / n;
    Interval::new(l, u)
}

/// Mean of lower bounds, but the *maximum* upper bound -- a conservative
/// aggregator that refuses to let one narrow clause pull the ceiling down
/// (spec §4.7).
fn average_lower(clauses: &[ClauseContribution]) -> Interval {
    let n = clauses.len() as f64;
    let l = clauses.iter().map(|c| c.interval.lower()).sum::<f64>() / n;
    let u = clauses
        .iter()
        .map(|c| c.interval.upper())
        .fold(f64::MIN, f64::max);
    Interval::new(l, u)
}

fn maximum(clauses: &[ClauseContribution]) -> Interval {
    let l = clauses
        .iter()
        .map(|c| c.interval.lower())
        .fold(f64::MIN, f64::max);
    let u = clauses
        .iter()
        .map(|c| c.interval.upper())
        .fold(f64::MIN, f64::max);
    Interval::new(l, u)
}

fn minimum(clauses: &[ClauseContribution]) -> Interval {
    let l = clauses
        .iter()
        .map(|c| c.interval.lower())
        .fold(f64::MAX, f64::min);
    let u = clauses
        .iter()
        .map(|c| c.interval.upper())
        .fold(f64::MAX, f64::min);
    Interval::new(l, u)
}

/// A legal burden-of-proof threshold: the mean lower bound must clear
/// `threshold` for the head to collapse to certainty; the mean upper bound
/// only collapses to certainty the same way, otherwise it is carried
/// through unchanged (spec §4.7 legal burden table).
fn legal_burden(clauses: &[ClauseContribution], threshold: f64) -> Interval {
    let n = clauses.len() as f64;
    let mean_l = clauses.iter().map(|c| c.interval.lower()).sum::<f64>() / n;
    let mean_u = clauses.iter().map(|c| c.interval.upper()).sum::<f64>() / n;
    let l = if mean_l >= threshold { 1.0 } else { 0.0 };
    let u = if mean_u >= threshold { 1.0 } else { mean_u };
    Interval::new(l, u)
}

/// Weighted mean using the rule's `clause_class -> weight` map, falling
/// back to the engine's `annotation_context`. If no weights are specified
/// anywhere, every clause defaults to weight 1 (making this equal to
/// [`average`] -- the law tested in spec §8). If weights *are* specified,
/// a class absent from the map gets weight 0, per spec §4.7 "missing class
/// = weight 0".
fn precedent_weighted(
    clauses: &[ClauseContribution],
    rule_weights: &HashMap<String, f64>,
    context: &AnnotationContext,
) -> Interval {
    let mut merged = context.precedent_weights.clone();
    for (k, v) in rule_weights {
        merged.insert(k.clone(), *v);
    }
    let default_weight = if merged.is_empty() { 1.0 } else { 0.0 };

    let weight_for = |class: &Option<String>| -> f64 {
        class
            .as_ref()
            .and_then(|c| merged.get(c).copied())
            .unwrap_or(default_weight)
            .max(0.0)
    };

    let weights: Vec<f64> = clauses.iter().map(|c| weight_for(&c.clause_class)).collect();
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        tracing::warn!("precedent_weighted: all weights zero or negative, returning [0,1]");
        return Interval::FULL;
    }

    let l = clauses
        .iter()
        .zip(&weights)
        .map(|(c, w)| w * c.interval.lower())
        .sum::<f64>()
        / total;
    let u = clauses
        .iter()
        .zip(&weights)
        .map(|(c, w)| w * c.interval.upper())
        .sum::<f64>()
        / total;
    Interval::new(l, u)
}
