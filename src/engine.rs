//! Fixed-point driver: repeatedly ground every rule, aggregate, merge, and
//! apply updates until convergence, `tmax`, or cancellation (spec §4.9, §5,
//! §8, C10).

use std::collections::BTreeMap;

use crate::annotation::{self, ClauseContribution};
use crate::config::{ConvergencePolicy, EngineConfig};
use crate::error::EngineInternalError;
use crate::facts::{self, FactsIndex};
use crate::graph::Graph;
use crate::grounder::{self, Assignment};
use crate::interpretation::{Interpretation, TerminationReason, TraceEntry};
use crate::interval::Interval;
use crate::rule::{HeadTemplate, Rule, UpdateMode};
use crate::scheduler::{self, ProposedUpdate};
use crate::timeout::QueryTimeout;

/// Run the fixed-point loop to completion.
///
/// `tmax` is checked as a hard ceiling *before* each step's work begins
/// (spec §5), so a run that converges in step `t` reports `steps() == t`
/// and never performs step `t + 1`'s grounding.
pub fn run(
    rules: &[Rule],
    graph: &Graph,
    mut facts: FactsIndex,
    config: &EngineConfig,
    timeout: &QueryTimeout,
) -> Result<Interpretation, EngineInternalError> {
    let mut supports: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut trace: Vec<TraceEntry> = Vec::new();
    let mut warning_count = 0usize;
    let mut reason = TerminationReason::Tmax;
    let mut steps_run = 0u64;

    // Evaluated in lexicographic id order every step (spec §5), independent
    // of whatever order the caller's `rules` slice happens to be in.
    let mut ordered_rules: Vec<&Rule> = rules.iter().collect();
    ordered_rules.sort_by(|a, b| a.id.cmp(&b.id));

    for t in 1..=config.tmax {
        if timeout.check().is_err() {
            reason = TerminationReason::Cancelled;
            break;
        }
        steps_run = t;

        let mut proposals = Vec::new();
        for rule in ordered_rules.iter().copied() {
            let assignments = grounder::ground(rule, &facts, graph);
            for assignment in &assignments {
                fire_rule(rule, assignment, t, config, &mut proposals, &mut trace);
            }
        }

        let merged = scheduler::merge(proposals);
        let mut facts_added = 0usize;
        let mut max_bound_delta = 0.0f64;

        for (key, update) in merged {
            let (label, target) = facts::parse_stmt_key(&key).ok_or_else(|| {
                EngineInternalError(format!("scheduler produced malformed statement key '{key}'"))
            })?;

            let existing = match &target {
                facts::Target::Node(id) => facts.get_node_if_present(&label, id),
                facts::Target::Edge(u, v) => facts.get_edge_if_present(&label, u, v),
            };
            let existing_interval = existing.unwrap_or(Interval::FULL);
            if existing.is_none() {
                facts_added += 1;
            }

            let combined = match update.mode {
                UpdateMode::Intersection => Interval::meet(existing_interval, update.interval),
                UpdateMode::Override => {
                    if Interval::narrower(update.interval, existing_interval) {
                        update.interval
                    } else {
                        existing_interval
                    }
                }
            };
            let delta = (combined.lower() - existing_interval.lower())
                .abs()
                .max((combined.upper() - existing_interval.upper()).abs());
            max_bound_delta = max_bound_delta.max(delta);

            let write_result = match &target {
                facts::Target::Node(id) => facts.set_node(&label, id, combined, update.set_static),
                facts::Target::Edge(u, v) => facts.set_edge(&label, u, v, combined, update.set_static),
            };
            match write_result {
                Ok(()) => {
                    let entry = supports.entry(key).or_default();
                    entry.extend(update.contributing_rules);
                    entry.sort();
                    entry.dedup();
                }
                Err(violation) => {
                    tracing::warn!(stmt_key = %violation.stmt_key, "skipped write to static fact");
                    warning_count += 1;
                }
            }
        }

        let converged = match config.convergence {
            ConvergencePolicy::DeltaInterpretation(k) => facts_added <= k,
            ConvergencePolicy::DeltaBound(eps) => max_bound_delta <= eps,
            ConvergencePolicy::Perfect => false,
        };
        if converged {
            reason = TerminationReason::Converged;
            break;
        }
    }

    Ok(Interpretation::build(
        &facts,
        supports,
        trace,
        reason,
        steps_run,
        config,
        warning_count,
    ))
}

fn fire_rule(
    rule: &Rule,
    assignment: &Assignment,
    t: u64,
    config: &EngineConfig,
    proposals: &mut Vec<ProposedUpdate>,
    trace: &mut Vec<TraceEntry>,
) {
    let Some(head_key) = instantiate_head(&rule.head, &assignment.bindings) else {
        tracing::warn!(rule = %rule.id, "head variable unbound at fire time, skipping");
        return;
    };

    let contributions: Vec<ClauseContribution> = rule
        .body
        .iter()
        .zip(&assignment.clause_intervals)
        .map(|(clause, interval)| ClauseContribution {
            interval: *interval,
            clause_class: clause.clause_class.clone(),
        })
        .collect();

    let interval = annotation::apply(
        &rule.annotation,
        &contributions,
        &rule.precedent_weights,
        &config.annotation_context,
    );

    proposals.push(ProposedUpdate {
        stmt_key: head_key.clone(),
        interval,
        mode: rule.effective_mode(config.default_mode),
        set_static: rule.is_static,
        rule_id: rule.id.clone(),
    });

    if config.emit_trace {
        trace.push(TraceEntry {
            t,
            rule: rule.id.clone(),
            head: head_key,
            clauses: clause_stmt_keys(rule, assignment),
        });
    }
}

/// Instantiate a rule head against a satisfying assignment's bindings into
/// a statement key. `None` only if the DSL compiler's head/body binding
/// check was somehow bypassed; defensive, not expected in practice.
fn instantiate_head(head: &HeadTemplate, bindings: &std::collections::HashMap<String, String>) -> Option<String> {
    match head.vars.as_slice() {
        [n] => bindings.get(n).map(|id| facts::node_key(&head.label, id)),
        [u, v] => {
            let u = bindings.get(u)?;
            let v = bindings.get(v)?;
            Some(facts::edge_key(&head.label, u, v))
        }
        _ => None,
    }
}

/// The statement key each body clause was satisfied through, in source
/// clause order, for trace output.
fn clause_stmt_keys(rule: &Rule, assignment: &Assignment) -> Vec<String> {
    rule.body
        .iter()
        .map(|clause| match clause.vars.as_slice() {
            [n] => assignment
                .bindings
                .get(n)
                .map(|id| facts::node_key(&clause.label, id))
                .unwrap_or_default(),
            [u, v] => match (assignment.bindings.get(u), assignment.bindings.get(v)) {
                (Some(u), Some(v)) => facts::edge_key(&clause.label, u, v),
                _ => String::new(),
            },
            _ => String::new(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::ThresholdOp;
    use crate::rule::{Clause, ClauseKind, Threshold, ThresholdBase};
    use std::time::Duration;

    fn ge(value: f64) -> Threshold {
        Threshold {
            op: ThresholdOp::Ge,
            value,
            base: ThresholdBase::Total,
        }
    }

    fn rule(id: &str, head_label: &str, body_label: &str, annotation: &str) -> Rule {
        Rule {
            id: id.to_string(),
            head: HeadTemplate {
                label: head_label.to_string(),
                vars: vec!["X".to_string()],
            },
            body: vec![Clause {
                kind: ClauseKind::Node,
                label: body_label.to_string(),
                vars: vec!["X".to_string()],
                threshold: ge(0.5),
                clause_class: None,
            }],
            annotation: annotation.to_string(),
            mode: None,
            is_static: false,
            precedent_weights: Default::default(),
        }
    }

    #[test]
    fn single_step_derivation_converges_with_delta_zero() {
        let mut facts = FactsIndex::new();
        facts.set_node("Disability", "p1", Interval::new(1.0, 1.0), false).unwrap();
        let graph = Graph::builder().add_node("p1").build();
        let rules = vec![rule("r1", "AccommodationRequired", "Disability", "average")];
        let config = EngineConfig::default();
        let timeout = QueryTimeout::infinite();

        let interp = run(&rules, &graph, facts, &config, &timeout).unwrap();
        assert_eq!(interp.reason(), TerminationReason::Converged);
        assert_eq!(interp.facts()["AccommodationRequired(p1)"], Interval::new(1.0, 1.0));
        assert_eq!(interp.supports()["AccommodationRequired(p1)"], vec!["r1".to_string()]);
    }

    #[test]
    fn chained_rules_converge_one_step_after_the_chain_settles() {
        let mut facts = FactsIndex::new();
        facts.set_node("Disability", "p1", Interval::new(1.0, 1.0), false).unwrap();
        let graph = Graph::builder().add_node("p1").build();
        let rules = vec![
            rule("r1", "Mid", "Disability", "average"),
            rule("r2", "Final", "Mid", "average"),
        ];
        let config = EngineConfig::default();
        let timeout = QueryTimeout::infinite();

        // step 1 derives Mid(p1); Final(p1) can't ground until Mid(p1)
        // exists, so step 2 derives it; step 3 adds nothing new and
        // converges.
        let interp = run(&rules, &graph, facts, &config, &timeout).unwrap();
        assert_eq!(interp.steps(), 3);
        assert_eq!(interp.facts()["Final(p1)"], Interval::new(1.0, 1.0));
    }

    #[test]
    fn perfect_policy_always_runs_to_tmax() {
        let mut facts = FactsIndex::new();
        facts.set_node("Disability", "p1", Interval::new(1.0, 1.0), false).unwrap();
        let graph = Graph::builder().add_node("p1").build();
        let rules = vec![rule("r1", "AccommodationRequired", "Disability", "average")];
        let mut config = EngineConfig::default();
        config.convergence = ConvergencePolicy::Perfect;
        config.tmax = 3;
        let timeout = QueryTimeout::infinite();

        let interp = run(&rules, &graph, facts, &config, &timeout).unwrap();
        assert_eq!(interp.reason(), TerminationReason::Tmax);
        assert_eq!(interp.steps(), 3);
    }

    #[test]
    fn cancellation_is_observed_before_step_work() {
        let facts = FactsIndex::new();
        let graph = Graph::builder().build();
        let rules: Vec<Rule> = Vec::new();
        let config = EngineConfig::default();
        let timeout = QueryTimeout::new(Some(Duration::from_secs(10)));
        timeout.cancel();

        let interp = run(&rules, &graph, facts, &config, &timeout).unwrap();
        assert_eq!(interp.reason(), TerminationReason::Cancelled);
        assert_eq!(interp.steps(), 0);
    }

    #[test]
    fn static_rule_blocks_further_updates() {
        let mut facts = FactsIndex::new();
        facts.set_node("Disability", "p1", Interval::new(1.0, 1.0), false).unwrap();
        let graph = Graph::builder().add_node("p1").build();
        let mut r1 = rule("r1", "Fixed", "Disability", "average");
        r1.is_static = true;
        let rules = vec![r1];
        let mut config = EngineConfig::default();
        config.convergence = ConvergencePolicy::Perfect;
        config.tmax = 2;
        let timeout = QueryTimeout::infinite();

        // step 1 sets Fixed(p1) static; step 2's identical proposal hits the
        // already-static key and is logged/skipped rather than applied.
        let interp = run(&rules, &graph, facts, &config, &timeout).unwrap();
        assert_eq!(interp.facts()["Fixed(p1)"], Interval::new(1.0, 1.0));
        assert_eq!(interp.warning_count(), 1);
    }
}
