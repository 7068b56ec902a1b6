//! CLI surface (spec §6): `reason --rules R --graph G --facts F [...]`.
//!
//! Thin glue over the library (SPEC_FULL §12): reads a rule-DSL file, an ad
//! hoc graph topology file, and an ad hoc facts file (both documented in
//! `DESIGN.md`, using the same `Label(target)` statement-key syntax as the
//! wire export so the three input kinds read uniformly), runs the engine,
//! and prints the canonical JSON interpretation to stdout.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use reason::config::{ConvergencePolicy, EngineConfig};
use reason::facts::{self, FactsIndex, Target};
use reason::graph::Graph;
use reason::interval::Interval;
use reason::interpretation::TerminationReason;
use reason::timeout::QueryTimeout;
use reason::{compile_program, engine};

#[derive(Parser, Debug)]
#[command(name = "reason", about = "Deterministic fixed-point inference over interval-valued legal facts")]
struct Cli {
    /// Rule-DSL source file.
    #[arg(long)]
    rules: PathBuf,
    /// Graph topology file (`NODE <id>` / `EDGE <u> <v>` lines).
    #[arg(long)]
    graph: PathBuf,
    /// Initial facts file (`Label(target) <lower> <upper> [static]` lines).
    #[arg(long)]
    facts: PathBuf,
    /// Optional `reason.toml`-shaped config file; defaults to `reason.toml` in cwd if present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    tmax: Option<u64>,
    #[arg(long)]
    convergence: Option<String>,
    #[arg(long)]
    emit_facts: bool,
    #[arg(long)]
    emit_trace: bool,
    /// Wall-clock ceiling for the whole run, in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    std::process::exit(run(cli));
}

fn run(cli: Cli) -> i32 {
    let mut config = match EngineConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return 4;
        }
    };
    if let Some(tmax) = cli.tmax {
        config.tmax = tmax;
    }
    if let Some(raw) = &cli.convergence {
        match ConvergencePolicy::parse(raw) {
            Ok(policy) => config.convergence = policy,
            Err(e) => {
                eprintln!("configuration error: {e}");
                return 4;
            }
        }
    }
    config.emit_facts |= cli.emit_facts;
    config.emit_trace |= cli.emit_trace;
    if let Some(secs) = cli.timeout_secs {
        config.wall_clock_timeout = Some(Duration::from_secs(secs));
    }

    let rules_src = match fs::read_to_string(&cli.rules) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to read rules file '{}': {e}", cli.rules.display());
            return 4;
        }
    };
    let rules = match compile_program(&rules_src) {
        Ok(rules) => rules,
        Err(errors) => {
            for e in &errors {
                eprintln!("compilation error: {e}");
            }
            return 3;
        }
    };

    let graph_src = match fs::read_to_string(&cli.graph) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to read graph file '{}': {e}", cli.graph.display());
            return 4;
        }
    };
    let graph = parse_graph_file(&graph_src);

    let facts_src = match fs::read_to_string(&cli.facts) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to read facts file '{}': {e}", cli.facts.display());
            return 4;
        }
    };
    let facts = match parse_facts_file(&facts_src) {
        Ok(facts) => facts,
        Err(e) => {
            eprintln!("malformed facts file: {e}");
            return 4;
        }
    };

    let timeout = QueryTimeout::new(config.wall_clock_timeout);
    match engine::run(&rules, &graph, facts, &config, &timeout) {
        Ok(interp) => {
            println!("{}", interp.to_json_string());
            match interp.reason() {
                TerminationReason::Converged => 0,
                TerminationReason::Tmax => 1,
                TerminationReason::Cancelled => 2,
            }
        }
        Err(e) => {
            eprintln!("internal engine error: {e}");
            4
        }
    }
}

fn parse_graph_file(text: &str) -> Graph {
    let mut builder = Graph::builder();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("NODE") => {
                if let Some(id) = parts.next() {
                    builder = builder.add_node(id);
                }
            }
            Some("EDGE") => {
                if let (Some(u), Some(v)) = (parts.next(), parts.next()) {
                    builder = builder.add_edge(u, v);
                }
            }
            _ => tracing::warn!(line, "ignoring unrecognized graph file line"),
        }
    }
    builder.build()
}

fn parse_facts_file(text: &str) -> Result<FactsIndex, String> {
    let mut facts = FactsIndex::new();
    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let key = parts
            .next()
            .ok_or_else(|| format!("line {}: missing statement key", lineno + 1))?;
        let lower: f64 = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| format!("line {}: missing or invalid lower bound", lineno + 1))?;
        let upper: f64 = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| format!("line {}: missing or invalid upper bound", lineno + 1))?;
        let is_static = parts.next() == Some("static");

        let (label, target) = facts::parse_stmt_key(key)
            .ok_or_else(|| format!("line {}: malformed statement key '{key}'", lineno + 1))?;
        let interval = Interval::new(lower, upper);
        let result = match target {
            Target::Node(id) => facts.set_node(&label, &id, interval, is_static),
            Target::Edge(u, v) => facts.set_edge(&label, &u, &v, interval, is_static),
        };
        result.map_err(|e| format!("line {}: {e}", lineno + 1))?;
    }
    Ok(facts)
}
