//! Error taxonomy for the reasoning engine (spec §7).
//!
//! Only [`CompilationError`], [`ConfigError`], and [`EngineInternalError`]
//! are ever returned as `Err`. The other conditions named in spec §7 --
//! `StaticViolation`, `AnnotationError`, an unknown label grounding to
//! nothing -- are recoverable and are logged via `tracing::warn!` rather
//! than surfaced through these types, per spec §7 "Propagation": they are
//! "logged and soft-suppressed to preserve determinism of termination."

use thiserror::Error;

/// A single rejected piece of rule-DSL input (spec §4.4, §4.10).
///
/// The compiler is the only component allowed to reject input, and it
/// never partially loads a program: every error found across a whole
/// source file is collected and returned together.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompilationError {
    #[error("rule {rule_id}: clause {clause_index}: variable(s) '{var}' not bound by any earlier clause")]
    UnboundClauseVariable {
        rule_id: String,
        clause_index: usize,
        var: String,
    },

    #[error("rule {rule_id}: head variable '{var}' does not appear in any body clause")]
    UnboundHeadVariable { rule_id: String, var: String },

    #[error("rule {rule_id}: unknown annotation '{name}'")]
    UnknownAnnotation { rule_id: String, name: String },

    #[error("rule {rule_id}: missing required 'annotate=' option")]
    MissingAnnotation { rule_id: String },

    #[error("rule {rule_id}: clause {clause_index}: malformed threshold '{text}'")]
    MalformedThreshold {
        rule_id: String,
        clause_index: usize,
        text: String,
    },

    #[error("rule {rule_id}: {message}")]
    Syntax { rule_id: String, message: String },
}

/// Malformed CLI/engine configuration (ambient addition, SPEC_FULL §10.1 --
/// distinct from the engine's own `CompilationError`/`EngineInternalError`).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error(transparent)]
    Figment(#[from] figment::Error),
}

/// A fatal invariant violation (spec §4.9 "Failure semantics": malformed
/// statement key, inconsistent index state). Always aborts the run.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("internal engine error: {0}")]
pub struct EngineInternalError(pub String);
