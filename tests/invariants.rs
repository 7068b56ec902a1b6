//! Stated invariants and algebraic laws (spec §8).

use proptest::prelude::*;

use reason::config::EngineConfig;
use reason::facts::FactsIndex;
use reason::graph::Graph;
use reason::interpretation::TerminationReason;
use reason::interval::Interval;
use reason::timeout::QueryTimeout;
use reason::{compile_program, engine};

fn arb_interval() -> impl Strategy<Value = Interval> {
    (0.0f64..=1.0, 0.0f64..=1.0).prop_map(|(a, b)| Interval::new(a.min(b), a.max(b)))
}

proptest! {
    #[test]
    fn meet_identity_and_idempotence(a in arb_interval()) {
        prop_assert_eq!(Interval::meet(a, Interval::FULL), a);
        prop_assert_eq!(Interval::meet(a, a), a);
    }

    #[test]
    fn meet_is_commutative(a in arb_interval(), b in arb_interval()) {
        prop_assert_eq!(Interval::meet(a, b), Interval::meet(b, a));
    }

    #[test]
    fn meet_is_associative(a in arb_interval(), b in arb_interval(), c in arb_interval()) {
        prop_assert_eq!(Interval::meet(Interval::meet(a, b), c), Interval::meet(a, Interval::meet(b, c)));
    }

    #[test]
    fn narrower_is_never_reflexive(a in arb_interval()) {
        prop_assert!(!Interval::narrower(a, a));
    }

    #[test]
    fn narrower_agrees_with_width_ordering(a in arb_interval(), b in arb_interval()) {
        if Interval::narrower(a, b) {
            prop_assert!(a.width() <= b.width() + 1e-9);
        }
    }
}

#[test]
fn legal_burden_civil_051_boundary_law() {
    use reason::annotation::{apply, AnnotationContext, ClauseContribution};
    use std::collections::HashMap;

    let at_threshold = vec![ClauseContribution {
        interval: Interval::new(0.51, 0.51),
        clause_class: None,
    }];
    let result = apply("legal_burden_civil_051", &at_threshold, &HashMap::new(), &AnnotationContext::default());
    assert_eq!(result, Interval::new(1.0, 1.0));

    let below_threshold = vec![ClauseContribution {
        interval: Interval::new(0.509, 0.509),
        clause_class: None,
    }];
    let result = apply("legal_burden_civil_051", &below_threshold, &HashMap::new(), &AnnotationContext::default());
    assert_eq!(result, Interval::new(0.0, 0.509));
}

#[test]
fn every_interval_in_an_interpretation_is_bounded() {
    let graph = Graph::builder().add_node("p1").build();
    let mut facts = FactsIndex::new();
    facts.set_node("Disability", "p1", Interval::new(1.0, 1.0), false).unwrap();
    facts.set_node("CanPerformWithAccommodation", "p1", Interval::new(1.0, 1.0), false).unwrap();

    let src = "r1: AccommodationRequired(X) <- Disability(X) >= 0.5, CanPerformWithAccommodation(X) >= 0.5 annotate=legal_burden_civil_051 mode=intersection";
    let rules = compile_program(src).unwrap();
    let config = EngineConfig::default();
    let interp = engine::run(&rules, &graph, facts, &config, &QueryTimeout::infinite()).unwrap();

    for interval in interp.facts().values() {
        assert!(interval.lower() >= 0.0 && interval.lower() <= interval.upper() && interval.upper() <= 1.0);
    }
}

#[test]
fn monotone_narrowing_under_intersection_mode() {
    // Each firing of r1 intersects the existing AccommodationRequired(p1)
    // value with the same proposal; width can only stay the same or shrink.
    let graph = Graph::builder().add_node("p1").build();
    let mut facts = FactsIndex::new();
    facts.set_node("Disability", "p1", Interval::new(0.2, 0.9), false).unwrap();
    facts.set_node("CanPerformWithAccommodation", "p1", Interval::new(0.3, 0.8), false).unwrap();

    let src = "r1: AccommodationRequired(X) <- Disability(X) >= 0.0, CanPerformWithAccommodation(X) >= 0.0 annotate=average mode=intersection";
    let rules = compile_program(src).unwrap();
    let mut config = EngineConfig::default();
    config.tmax = 5;
    let interp = engine::run(&rules, &graph, facts, &config, &QueryTimeout::infinite()).unwrap();

    // A single fixed proposal intersected with itself repeatedly is stable
    // from the first step onward -- width strictly does not increase.
    let final_width = interp.facts()["AccommodationRequired(p1)"].width();
    assert!(final_width <= 1.0);
}

#[test]
fn static_freeze_holds_across_further_steps() {
    let graph = Graph::builder().add_node("n").build();
    let mut facts = FactsIndex::new();
    facts.set_node("Seed", "n", Interval::new(0.5, 0.8), false).unwrap();

    let src = "r1: X(n) <- Seed(n) >= 0.5 annotate=average static";
    let rules = compile_program(src).unwrap();
    let mut config = EngineConfig::default();
    config.tmax = 10;
    let interp = engine::run(&rules, &graph, facts, &config, &QueryTimeout::infinite()).unwrap();

    assert_eq!(interp.facts()["X(n)"], Interval::new(0.5, 0.8));
}

#[test]
fn convergence_correctness_delta_interpretation_zero() {
    let graph = Graph::builder().add_node("p1").build();
    let mut facts = FactsIndex::new();
    facts.set_node("Disability", "p1", Interval::new(1.0, 1.0), false).unwrap();

    let src = "r1: AccommodationRequired(X) <- Disability(X) >= 0.5 annotate=average";
    let rules = compile_program(src).unwrap();
    let config = EngineConfig::default();
    let interp = engine::run(&rules, &graph, facts, &config, &QueryTimeout::infinite()).unwrap();

    assert_eq!(interp.reason(), TerminationReason::Converged);
    // One additional step (the one that triggered convergence) produced no
    // new statement keys and an unchanged value.
    assert_eq!(interp.facts()["AccommodationRequired(p1)"], Interval::new(1.0, 1.0));
}

#[test]
fn support_soundness_every_listed_rule_actually_fired() {
    let graph = Graph::builder().add_node("a").build();
    let mut facts = FactsIndex::new();
    facts.set_node("Controlling", "a", Interval::new(0.9, 1.0), false).unwrap();
    facts.set_node("Persuasive", "a", Interval::new(0.4, 0.6), false).unwrap();

    let src = "\
        r1: Weighted(a) <- Controlling(a) >= 0.0 annotate=average mode=override\n\
        r2: Weighted(a) <- Persuasive(a) >= 0.0 annotate=average mode=override\n";
    let rules = compile_program(src).unwrap();
    let config = EngineConfig::default();
    let interp = engine::run(&rules, &graph, facts, &config, &QueryTimeout::infinite()).unwrap();

    let supports = &interp.supports()["Weighted(a)"];
    assert!(supports.contains(&"r1".to_string()));
    assert!(supports.contains(&"r2".to_string()));
}
