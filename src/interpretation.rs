//! Run output: the final fact set plus provenance and termination metadata
//! (spec §4.9, §6, C11).

use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::facts::FactsIndex;
use crate::interval::{format_6dp, Interval};

/// Why the fixed-point loop stopped (spec §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// A convergence policy declared the interpretation stable.
    Converged,
    /// `tmax` steps ran without convergence.
    Tmax,
    /// Wall-clock timeout or cooperative cancellation fired.
    Cancelled,
}

impl TerminationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            TerminationReason::Converged => "converged",
            TerminationReason::Tmax => "tmax",
            TerminationReason::Cancelled => "cancelled",
        }
    }
}

/// One step's firing of one rule, recorded when trace emission is enabled
/// (spec §6 `emit_trace`).
#[derive(Debug, Clone)]
pub struct TraceEntry {
    pub t: u64,
    pub rule: String,
    pub head: String,
    pub clauses: Vec<String>,
}

/// The result of a completed (or stopped) run.
#[derive(Debug, Clone)]
pub struct Interpretation {
    facts: BTreeMap<String, Interval>,
    supports: BTreeMap<String, Vec<String>>,
    trace: Vec<TraceEntry>,
    reason: TerminationReason,
    steps: u64,
    emit_facts: bool,
    emit_trace: bool,
    warning_count: usize,
}

impl Interpretation {
    pub(crate) fn build(
        facts: &FactsIndex,
        supports: BTreeMap<String, Vec<String>>,
        trace: Vec<TraceEntry>,
        reason: TerminationReason,
        steps: u64,
        config: &EngineConfig,
        warning_count: usize,
    ) -> Self {
        Interpretation {
            facts: facts.snapshot(),
            supports,
            trace,
            reason,
            steps,
            emit_facts: config.emit_facts,
            emit_trace: config.emit_trace,
            warning_count,
        }
    }

    pub fn reason(&self) -> TerminationReason {
        self.reason
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    /// Final value of every statement key the run touched, sorted by key.
    pub fn facts(&self) -> &BTreeMap<String, Interval> {
        &self.facts
    }

    /// Sorted, deduplicated list of contributing rule ids per statement key.
    pub fn supports(&self) -> &BTreeMap<String, Vec<String>> {
        &self.supports
    }

    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    /// Canonical wire format (spec §6): hand-built, not routed through a
    /// generic `serde_json::Value` tree, so every interval bound is a
    /// fixed six-decimal-digit literal regardless of what `f64` prints as.
    pub fn to_json_string(&self) -> String {
        let mut out = String::from("{\"facts\":{");
        if self.emit_facts {
            let mut first = true;
            for (key, interval) in &self.facts {
                if !first {
                    out.push(',');
                }
                first = false;
                out.push('"');
                escape_into(key, &mut out);
                out.push_str("\":[");
                out.push_str(&format_6dp(interval.lower()));
                out.push(',');
                out.push_str(&format_6dp(interval.upper()));
                out.push(']');
            }
        }
        out.push_str("},\"supports\":{");

        let mut first = true;
        for (key, rules) in &self.supports {
            if !first {
                out.push(',');
            }
            first = false;
            out.push('"');
            escape_into(key, &mut out);
            out.push_str("\":[");
            let mut sorted = rules.clone();
            sorted.sort();
            sorted.dedup();
            for (i, rule) in sorted.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push('"');
                escape_into(rule, &mut out);
                out.push('"');
            }
            out.push(']');
        }
        out.push('}');

        if self.emit_trace {
            out.push_str(",\"trace\":[");
            for (i, entry) in self.trace.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str("{\"t\":");
                out.push_str(&entry.t.to_string());
                out.push_str(",\"rule\":\"");
                escape_into(&entry.rule, &mut out);
                out.push_str("\",\"head\":\"");
                escape_into(&entry.head, &mut out);
                out.push_str("\",\"clauses\":[");
                for (j, c) in entry.clauses.iter().enumerate() {
                    if j > 0 {
                        out.push(',');
                    }
                    out.push('"');
                    escape_into(c, &mut out);
                    out.push('"');
                }
                out.push_str("]}");
            }
            out.push(']');
        }

        out.push_str(",\"meta\":{\"reason\":\"");
        out.push_str(self.reason.as_str());
        out.push_str("\",\"steps\":");
        out.push_str(&self.steps.to_string());
        out.push_str(",\"warnings\":");
        out.push_str(&self.warning_count.to_string());
        out.push_str("}}");

        out
    }
}

fn escape_into(s: &str, out: &mut String) {
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(ch),
        }
    }
}
