//! Rule model (spec §3, §4.4, C4): the typed form a DSL source compiles to.

use std::collections::HashMap;

use crate::interval::ThresholdOp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseKind {
    Node,
    Edge,
}

/// Which quantity a percent threshold is taken over. Only distinguishable
/// at the aggregator level (e.g. an annotation reasoning over a collection
/// with some members absent); at a single clause the two coincide (spec
/// §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdBase {
    Total,
    Available,
}

#[derive(Debug, Clone)]
pub struct Threshold {
    pub op: ThresholdOp,
    /// Already normalized out of percent form into a `[0,1]` fraction.
    pub value: f64,
    pub base: ThresholdBase,
}

#[derive(Debug, Clone)]
pub struct Clause {
    pub kind: ClauseKind,
    pub label: String,
    /// One variable for a node clause, two for an edge clause.
    pub vars: Vec<String>,
    pub threshold: Threshold,
    /// Optional precedent-weighting class (used only by `precedent_weighted`).
    pub clause_class: Option<String>,
}

/// How a rule's per-step proposal combines with the statement's existing
/// value (spec §3, §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    Intersection,
    Override,
}

#[derive(Debug, Clone)]
pub struct HeadTemplate {
    pub label: String,
    /// One variable for a node head, two for an edge head.
    pub vars: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub head: HeadTemplate,
    pub body: Vec<Clause>,
    pub annotation: String,
    /// `None` means "use the engine's configured `default_mode`" (spec §6).
    pub mode: Option<UpdateMode>,
    pub is_static: bool,
    /// Clause-class -> weight, used only by the `precedent_weighted`
    /// annotation (spec §4.4, §4.7).
    pub precedent_weights: HashMap<String, f64>,
}

impl Rule {
    pub fn effective_mode(&self, default_mode: UpdateMode) -> UpdateMode {
        self.mode.unwrap_or(default_mode)
    }
}
