//! Temporal scheduler: per-step merge of proposed fact updates (spec §4.8, C9).

use std::collections::BTreeMap;

use crate::interval::Interval;
use crate::rule::UpdateMode;

/// One rule's proposed update to a statement key for the current step.
#[derive(Debug, Clone)]
pub struct ProposedUpdate {
    pub stmt_key: String,
    pub interval: Interval,
    pub mode: UpdateMode,
    pub set_static: bool,
    pub rule_id: String,
}

/// The result of folding every proposal for one statement key together.
#[derive(Debug, Clone)]
pub struct MergedUpdate {
    pub interval: Interval,
    pub mode: UpdateMode,
    pub set_static: bool,
    pub contributing_rules: Vec<String>,
}

/// Group proposals by statement key and fold each group deterministically
/// (spec §4.8):
///
/// 1. Sort the group by `(width ascending, rule_id ascending)`.
/// 2. Fold left to right: `intersection` mode takes the meet; `override`
///    mode keeps whichever interval is narrower, incumbent winning ties.
///
/// Returns a map sorted by statement key.
pub fn merge(proposals: Vec<ProposedUpdate>) -> BTreeMap<String, MergedUpdate> {
    let mut groups: BTreeMap<String, Vec<ProposedUpdate>> = BTreeMap::new();
    for p in proposals {
        groups.entry(p.stmt_key.clone()).or_default().push(p);
    }

    let mut out = BTreeMap::new();
    for (key, mut group) in groups {
        group.sort_by(|a, b| {
            a.interval
                .width()
                .partial_cmp(&b.interval.width())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.rule_id.cmp(&b.rule_id))
        });

        let mut iter = group.into_iter();
        let first = iter.next().expect("group is never empty: built from its own key");
        let mode = first.mode;
        let mut acc = first.interval;
        let mut set_static = first.set_static;
        let mut contributing_rules = vec![first.rule_id];

        for next in iter {
            contributing_rules.push(next.rule_id);
            set_static = set_static || next.set_static;
            acc = match mode {
                UpdateMode::Intersection => Interval::meet(acc, next.interval),
                UpdateMode::Override => {
                    if Interval::narrower(next.interval, acc) {
                        next.interval
                    } else {
                        acc
                    }
                }
            };
        }

        contributing_rules.sort();
        contributing_rules.dedup();
        out.insert(
            key,
            MergedUpdate {
                interval: acc,
                mode,
                set_static,
                contributing_rules,
            },
        );
    }
    out
}
