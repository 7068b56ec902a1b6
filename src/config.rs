//! Engine configuration (spec §6, SPEC_FULL §10.1, C12).
//!
//! The engine's `run()` entry point takes a plain [`EngineConfig`] value and
//! never reads environment variables itself (spec §9 design note: "replace
//! env-var toggles with explicit config passed to run"). This module only
//! concerns *loading* that config for the CLI, layering a TOML file under
//! `REASON_`-prefixed environment overrides -- the same shape the teacher
//! crate's `src/config.rs` uses for its own `figment::providers::{Toml,
//! Env}` layering.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::annotation::AnnotationContext;
use crate::error::ConfigError;
use crate::rule::UpdateMode;

/// Stopping criterion for the fixed-point loop (spec §4.9, §6).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConvergencePolicy {
    /// Stop when a step adds at most `k` brand-new statement keys.
    DeltaInterpretation(usize),
    /// Stop when the largest interval-width change in a step is `<= epsilon`.
    DeltaBound(f64),
    /// Never stop early; always run to `tmax`.
    Perfect,
}

impl ConvergencePolicy {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let text = text.trim();
        if text == "perfect" {
            return Ok(ConvergencePolicy::Perfect);
        }
        if let Some(rest) = text.strip_prefix("delta_interpretation:") {
            let k: usize = rest
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("bad delta_interpretation value '{rest}'")))?;
            return Ok(ConvergencePolicy::DeltaInterpretation(k));
        }
        if let Some(rest) = text.strip_prefix("delta_bound:") {
            let eps: f64 = rest
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("bad delta_bound value '{rest}'")))?;
            return Ok(ConvergencePolicy::DeltaBound(eps));
        }
        Err(ConfigError::Invalid(format!("unrecognized convergence policy '{text}'")))
    }
}

impl std::fmt::Display for ConvergencePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConvergencePolicy::DeltaInterpretation(k) => write!(f, "delta_interpretation:{k}"),
            ConvergencePolicy::DeltaBound(e) => write!(f, "delta_bound:{e}"),
            ConvergencePolicy::Perfect => write!(f, "perfect"),
        }
    }
}

/// The engine's validated run configuration (spec §6 Configuration table).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub tmax: u64,
    pub convergence: ConvergencePolicy,
    pub default_mode: UpdateMode,
    pub emit_facts: bool,
    pub emit_trace: bool,
    pub annotation_context: AnnotationContext,
    /// Ambient addition (SPEC_FULL §10.1): wall-clock ceiling enforced at
    /// step boundaries alongside the cancellation token (spec §5).
    pub wall_clock_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            tmax: 100,
            convergence: ConvergencePolicy::DeltaInterpretation(0),
            default_mode: UpdateMode::Intersection,
            emit_facts: false,
            emit_trace: false,
            annotation_context: AnnotationContext::default(),
            wall_clock_timeout: None,
        }
    }
}

/// On-disk / environment shape loaded by `figment` before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct RawConfig {
    tmax: u64,
    convergence: String,
    default_mode: String,
    emit_facts: bool,
    emit_trace: bool,
    precedent_weights: HashMap<String, f64>,
    wall_clock_timeout_secs: Option<u64>,
}

impl Default for RawConfig {
    fn default() -> Self {
        RawConfig {
            tmax: 100,
            convergence: "delta_interpretation:0".to_string(),
            default_mode: "intersection".to_string(),
            emit_facts: false,
            emit_trace: false,
            precedent_weights: HashMap::new(),
            wall_clock_timeout_secs: None,
        }
    }
}

impl EngineConfig {
    /// Load defaults from `path` (or `reason.toml` in the cwd if `path` is
    /// `None` and it exists), overridden by `REASON_*` environment
    /// variables, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(RawConfig::default()));
        match path {
            Some(path) if path.exists() => {
                figment = figment.merge(Toml::file(path));
            }
            Some(_) => {}
            None if Path::new("reason.toml").exists() => {
                figment = figment.merge(Toml::file("reason.toml"));
            }
            None => {}
        }
        figment = figment.merge(Env::prefixed("REASON_").split("__"));

        let raw: RawConfig = figment.extract()?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        if raw.tmax < 1 {
            return Err(ConfigError::Invalid("tmax must be >= 1".to_string()));
        }
        let convergence = ConvergencePolicy::parse(&raw.convergence)?;
        let default_mode = match raw.default_mode.as_str() {
            "intersection" => UpdateMode::Intersection,
            "override" => UpdateMode::Override,
            other => return Err(ConfigError::Invalid(format!("unknown default_mode '{other}'"))),
        };
        Ok(EngineConfig {
            tmax: raw.tmax,
            convergence,
            default_mode,
            emit_facts: raw.emit_facts,
            emit_trace: raw.emit_trace,
            annotation_context: AnnotationContext {
                precedent_weights: raw.precedent_weights,
            },
            wall_clock_timeout: raw.wall_clock_timeout_secs.map(Duration::from_secs),
        })
    }
}
