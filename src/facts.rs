//! Mutable fact working set (spec §3, §4.3, C3).

use std::collections::BTreeMap;

use thiserror::Error;

use crate::interval::Interval;

#[derive(Debug, Clone, Copy)]
struct Entry {
    interval: Interval,
    is_static: bool,
}

/// The target half of a statement key: a single node id, or an ordered
/// edge pair (spec §3 "L(n)" / "L(u,v)").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Node(String),
    Edge(String, String),
}

/// Per-label maps from node id / edge pair to interval, with a static bit.
///
/// Keys with no recorded entry are implicitly `[0,1]` when read by the
/// grounder/threshold evaluator, but are never enumerated as grounding
/// candidates (spec §3 invariant "absent facts are never enumerated").
#[derive(Debug, Clone, Default)]
pub struct FactsIndex {
    node_facts: BTreeMap<String, BTreeMap<String, Entry>>,
    edge_facts: BTreeMap<String, BTreeMap<(String, String), Entry>>,
}

/// Attempt to mutate a statement key already marked `static` (spec §4.3).
/// Callers treat this as non-fatal: log and skip (spec §7).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("attempt to mutate static fact {stmt_key}")]
pub struct StaticViolation {
    pub stmt_key: String,
}

impl FactsIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_node(&self, label: &str, node_id: &str) -> Interval {
        self.get_node_if_present(label, node_id)
            .unwrap_or(Interval::FULL)
    }

    pub fn get_node_if_present(&self, label: &str, node_id: &str) -> Option<Interval> {
        self.node_facts
            .get(label)
            .and_then(|m| m.get(node_id))
            .map(|e| e.interval)
    }

    pub fn get_edge(&self, label: &str, u: &str, v: &str) -> Interval {
        self.get_edge_if_present(label, u, v).unwrap_or(Interval::FULL)
    }

    pub fn get_edge_if_present(&self, label: &str, u: &str, v: &str) -> Option<Interval> {
        self.edge_facts
            .get(label)
            .and_then(|m| m.get(&(u.to_string(), v.to_string())))
            .map(|e| e.interval)
    }

    pub fn has_edge_fact(&self, label: &str, u: &str, v: &str) -> bool {
        self.get_edge_if_present(label, u, v).is_some()
    }

    pub fn is_node_static(&self, label: &str, node_id: &str) -> bool {
        self.node_facts
            .get(label)
            .and_then(|m| m.get(node_id))
            .is_some_and(|e| e.is_static)
    }

    pub fn is_edge_static(&self, label: &str, u: &str, v: &str) -> bool {
        self.edge_facts
            .get(label)
            .and_then(|m| m.get(&(u.to_string(), v.to_string())))
            .is_some_and(|e| e.is_static)
    }

    /// Sorted node ids currently carrying a recorded interval for `label`
    /// (spec §4.3 `iter(label)`).
    pub fn node_targets(&self, label: &str) -> Vec<&str> {
        self.node_facts
            .get(label)
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Sorted `(u, v)` pairs currently carrying a recorded interval for
    /// `label`.
    pub fn edge_targets(&self, label: &str) -> Vec<(&str, &str)> {
        self.edge_facts
            .get(label)
            .map(|m| m.keys().map(|(u, v)| (u.as_str(), v.as_str())).collect())
            .unwrap_or_default()
    }

    /// Record a node fact. Fails without mutating state if the key is
    /// already `static`.
    pub fn set_node(
        &mut self,
        label: &str,
        node_id: &str,
        interval: Interval,
        is_static: bool,
    ) -> Result<(), StaticViolation> {
        if self.is_node_static(label, node_id) {
            return Err(StaticViolation {
                stmt_key: node_key(label, node_id),
            });
        }
        let slot = self.node_facts.entry(label.to_string()).or_default();
        slot.insert(
            node_id.to_string(),
            Entry {
                interval,
                is_static,
            },
        );
        Ok(())
    }

    /// Record an edge fact. Fails without mutating state if the key is
    /// already `static`.
    pub fn set_edge(
        &mut self,
        label: &str,
        u: &str,
        v: &str,
        interval: Interval,
        is_static: bool,
    ) -> Result<(), StaticViolation> {
        if self.is_edge_static(label, u, v) {
            return Err(StaticViolation {
                stmt_key: edge_key(label, u, v),
            });
        }
        let slot = self.edge_facts.entry(label.to_string()).or_default();
        slot.insert(
            (u.to_string(), v.to_string()),
            Entry {
                interval,
                is_static,
            },
        );
        Ok(())
    }

    /// Every currently-recorded fact as `(stmt_key, interval)`, sorted by
    /// key (used by C11 export).
    pub fn snapshot(&self) -> BTreeMap<String, Interval> {
        let mut out = BTreeMap::new();
        for (label, m) in &self.node_facts {
            for (id, e) in m {
                out.insert(node_key(label, id), e.interval);
            }
        }
        for (label, m) in &self.edge_facts {
            for ((u, v), e) in m {
                out.insert(edge_key(label, u, v), e.interval);
            }
        }
        out
    }
}

pub fn node_key(label: &str, node_id: &str) -> String {
    format!("{label}({node_id})")
}

pub fn edge_key(label: &str, u: &str, v: &str) -> String {
    format!("{label}({u},{v})")
}

/// Parse a statement key of the form `L(n)` or `L(u,v)` back into its label
/// and target (spec §3). Returns `None` for anything else.
pub fn parse_stmt_key(key: &str) -> Option<(String, Target)> {
    let open = key.find('(')?;
    if !key.ends_with(')') || open == 0 {
        return None;
    }
    let label = key[..open].to_string();
    let inner = &key[open + 1..key.len() - 1];
    let parts: Vec<&str> = inner.split(',').collect();
    match parts.as_slice() {
        [n] if !n.is_empty() => Some((label, Target::Node((*n).to_string()))),
        [u, v] if !u.is_empty() && !v.is_empty() => {
            Some((label, Target::Edge((*u).to_string(), (*v).to_string())))
        }
        _ => None,
    }
}
