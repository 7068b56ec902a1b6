//! Grounder: enumerate variable assignments satisfying a rule's body in a
//! fixed, deterministic order (spec §4.5, C6).

use std::collections::HashMap;

use crate::facts::FactsIndex;
use crate::graph::Graph;
use crate::interval::Interval;
use crate::rule::{Clause, ClauseKind, Rule};
use crate::threshold;

/// One satisfying assignment: the variable bindings, plus the per-clause
/// interval used to satisfy each clause, in the rule's *source* clause
/// order (not the cost-based evaluation order), for the annotation stage.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub bindings: HashMap<String, String>,
    pub clause_intervals: Vec<Interval>,
}

/// Enumerate all satisfying assignments for `rule` against the current
/// facts/graph, in the deterministic order of spec §4.5:
///
/// 1. Clauses are evaluated in an ascending-cost order: node clauses
///    before edge clauses, then by the size of the label's current target
///    set, then by source order (a stable tie-break).
/// 2. An unbound node-clause variable is enumerated over
///    `facts.node_targets(label)` (sorted); an unbound edge-clause
///    variable is narrowed through graph adjacency when the other
///    endpoint is already bound, or enumerated over
///    `facts.edge_targets(label)` when neither is.
/// 3. A clause whose variables are already fully bound acts as a filter.
pub fn ground(rule: &Rule, facts: &FactsIndex, graph: &Graph) -> Vec<Assignment> {
    let order = cost_order(rule, facts);
    let mut partial = vec![PartialAssignment::new()];

    for &clause_idx in &order {
        let clause = &rule.body[clause_idx];
        let mut next = Vec::new();
        for pa in partial {
            extend(clause, clause_idx, pa, facts, graph, &mut next);
        }
        partial = next;
        if partial.is_empty() {
            return Vec::new();
        }
    }

    partial
        .into_iter()
        .map(|pa| {
            let mut clause_intervals = vec![Interval::FULL; rule.body.len()];
            for (idx, iv) in pa.clause_intervals {
                clause_intervals[idx] = iv;
            }
            Assignment {
                bindings: pa.bindings,
                clause_intervals,
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
struct PartialAssignment {
    bindings: HashMap<String, String>,
    clause_intervals: Vec<(usize, Interval)>,
}

impl PartialAssignment {
    fn new() -> Self {
        PartialAssignment {
            bindings: HashMap::new(),
            clause_intervals: Vec::new(),
        }
    }
}

fn cost_order(rule: &Rule, facts: &FactsIndex) -> Vec<usize> {
    let mut idxs: Vec<usize> = (0..rule.body.len()).collect();
    idxs.sort_by(|&a, &b| {
        let ca = &rule.body[a];
        let cb = &rule.body[b];
        kind_rank(ca.kind)
            .cmp(&kind_rank(cb.kind))
            .then_with(|| label_cardinality(ca, facts).cmp(&label_cardinality(cb, facts)))
            .then(a.cmp(&b))
    });
    idxs
}

fn kind_rank(kind: ClauseKind) -> u8 {
    match kind {
        ClauseKind::Node => 0,
        ClauseKind::Edge => 1,
    }
}

fn label_cardinality(clause: &Clause, facts: &FactsIndex) -> usize {
    match clause.kind {
        ClauseKind::Node => facts.node_targets(&clause.label).len(),
        ClauseKind::Edge => facts.edge_targets(&clause.label).len(),
    }
}

fn extend(
    clause: &Clause,
    clause_idx: usize,
    pa: PartialAssignment,
    facts: &FactsIndex,
    graph: &Graph,
    out: &mut Vec<PartialAssignment>,
) {
    match clause.kind {
        ClauseKind::Node => extend_node(clause, clause_idx, pa, facts, out),
        ClauseKind::Edge => extend_edge(clause, clause_idx, pa, facts, graph, out),
    }
}

fn extend_node(
    clause: &Clause,
    clause_idx: usize,
    pa: PartialAssignment,
    facts: &FactsIndex,
    out: &mut Vec<PartialAssignment>,
) {
    let var = &clause.vars[0];
    if let Some(bound) = pa.bindings.get(var).cloned() {
        let interval = facts.get_node(&clause.label, &bound);
        if threshold::satisfies(interval, &clause.threshold) {
            let mut next = pa;
            next.clause_intervals.push((clause_idx, interval));
            out.push(next);
        }
        return;
    }
    for target in facts.node_targets(&clause.label) {
        let interval = facts.get_node(&clause.label, target);
        if threshold::satisfies(interval, &clause.threshold) {
            let mut next = pa.clone();
            next.bindings.insert(var.clone(), target.to_string());
            next.clause_intervals.push((clause_idx, interval));
            out.push(next);
        }
    }
}

fn extend_edge(
    clause: &Clause,
    clause_idx: usize,
    pa: PartialAssignment,
    facts: &FactsIndex,
    graph: &Graph,
    out: &mut Vec<PartialAssignment>,
) {
    let u_var = &clause.vars[0];
    let v_var = &clause.vars[1];
    let u_bound = pa.bindings.get(u_var).cloned();
    let v_bound = pa.bindings.get(v_var).cloned();

    let candidates: Vec<(String, String)> = match (&u_bound, &v_bound) {
        (Some(u), Some(v)) => vec![(u.clone(), v.clone())],
        (Some(u), None) => graph
            .out_neighbors(u)
            .iter()
            .map(|v| (u.clone(), v.clone()))
            .collect(),
        (None, Some(v)) => graph
            .in_neighbors(v)
            .iter()
            .map(|u| (u.clone(), v.clone()))
            .collect(),
        (None, None) => facts
            .edge_targets(&clause.label)
            .into_iter()
            .map(|(u, v)| (u.to_string(), v.to_string()))
            .collect(),
    };

    for (u, v) in candidates {
        if u_var == v_var && u != v {
            continue;
        }
        if !facts.has_edge_fact(&clause.label, &u, &v) {
            continue;
        }
        let interval = facts.get_edge(&clause.label, &u, &v);
        if !threshold::satisfies(interval, &clause.threshold) {
            continue;
        }
        let mut next = pa.clone();
        next.bindings.insert(u_var.clone(), u);
        next.bindings.insert(v_var.clone(), v);
        next.clause_intervals.push((clause_idx, interval));
        out.push(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::ThresholdOp;
    use crate::rule::{HeadTemplate, Threshold, ThresholdBase};

    fn ge(value: f64) -> Threshold {
        Threshold {
            op: ThresholdOp::Ge,
            value,
            base: ThresholdBase::Total,
        }
    }

    fn node_clause(label: &str, var: &str, value: f64) -> Clause {
        Clause {
            kind: ClauseKind::Node,
            label: label.to_string(),
            vars: vec![var.to_string()],
            threshold: ge(value),
            clause_class: None,
        }
    }

    fn single_var_rule(clauses: Vec<Clause>) -> Rule {
        Rule {
            id: "r1".to_string(),
            head: HeadTemplate {
                label: "Head".to_string(),
                vars: vec!["X".to_string()],
            },
            body: clauses,
            annotation: "average".to_string(),
            mode: None,
            is_static: false,
            precedent_weights: HashMap::new(),
        }
    }

    #[test]
    fn grounds_single_node_clause_over_qualifying_targets() {
        let mut facts = FactsIndex::new();
        facts.set_node("Disability", "p1", Interval::new(1.0, 1.0), false).unwrap();
        facts.set_node("Disability", "p2", Interval::new(0.1, 0.1), false).unwrap();
        let graph = Graph::builder().build();
        let rule = single_var_rule(vec![node_clause("Disability", "X", 0.5)]);

        let assignments = ground(&rule, &facts, &graph);
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].bindings["X"], "p1");
    }

    #[test]
    fn join_across_two_node_clauses_requires_both() {
        let mut facts = FactsIndex::new();
        facts.set_node("A", "p1", Interval::new(1.0, 1.0), false).unwrap();
        facts.set_node("A", "p2", Interval::new(1.0, 1.0), false).unwrap();
        facts.set_node("B", "p1", Interval::new(1.0, 1.0), false).unwrap();
        let graph = Graph::builder().build();
        let rule = single_var_rule(vec![node_clause("A", "X", 0.5), node_clause("B", "X", 0.5)]);

        let assignments = ground(&rule, &facts, &graph);
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].bindings["X"], "p1");
    }

    #[test]
    fn edge_clause_with_one_bound_endpoint_uses_adjacency() {
        let mut facts = FactsIndex::new();
        facts.set_edge("Cites", "a", "b", Interval::new(0.8, 0.8), false).unwrap();
        facts.set_edge("Cites", "a", "c", Interval::new(0.1, 0.1), false).unwrap();
        let graph = Graph::builder().add_edge("a", "b").add_edge("a", "c").build();

        let rule = Rule {
            id: "r1".to_string(),
            head: HeadTemplate {
                label: "Head".to_string(),
                vars: vec!["U".to_string(), "V".to_string()],
            },
            body: vec![Clause {
                kind: ClauseKind::Edge,
                label: "Cites".to_string(),
                vars: vec!["U".to_string(), "V".to_string()],
                threshold: ge(0.5),
                clause_class: None,
            }],
            annotation: "average".to_string(),
            mode: None,
            is_static: false,
            precedent_weights: HashMap::new(),
        };

        let assignments = ground(&rule, &facts, &graph);
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].bindings["U"], "a");
        assert_eq!(assignments[0].bindings["V"], "b");
    }

    #[test]
    fn no_qualifying_targets_yields_no_assignments() {
        let facts = FactsIndex::new();
        let graph = Graph::builder().build();
        let rule = single_var_rule(vec![node_clause("Unknown", "X", 0.5)]);
        assert!(ground(&rule, &facts, &graph).is_empty());
    }
}
