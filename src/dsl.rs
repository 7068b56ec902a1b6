//! Rule DSL compiler (spec §3, §4.4, §4.10, C5).
//!
//! Grammar, one rule per logical line:
//!
//! ```text
//! <id> : <Head> <- <clause>(,<clause>)* [ annotate=<name> ] [ mode=<intersection|override> ] [ static ]
//! ```
//!
//! A clause is `Label(Vars) >=|<=|= threshold[%][@total|@available]`. This
//! crate resolves two details spec §9 leaves open, both recorded in
//! `DESIGN.md`:
//!
//! - a clause may carry a trailing `:class` tag (`Controlling(a) >= 0.5:controlling`)
//!   to populate `clause_class` for `precedent_weighted`;
//! - a rule may carry a trailing `weights=class:w|class:w|...` option to
//!   populate `precedent_weights`.
//!
//! `#` introduces a line comment; blank lines are ignored (spec §6).

use std::collections::{HashMap, HashSet};

use crate::annotation;
use crate::error::CompilationError;
use crate::interval::ThresholdOp;
use crate::rule::{Clause, ClauseKind, HeadTemplate, Rule, Threshold, ThresholdBase, UpdateMode};

/// Compile an entire rule-DSL source file. All-or-nothing: either every
/// rule parses and passes safety checks, or every error found across the
/// whole program is returned together (spec §4.10).
pub fn compile_program(source: &str) -> Result<Vec<Rule>, Vec<CompilationError>> {
    let mut rules = Vec::new();
    let mut errors = Vec::new();

    for raw_line in source.lines() {
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        match compile_rule(line) {
            Ok(rule) => rules.push(rule),
            Err(mut errs) => errors.append(&mut errs),
        }
    }

    if errors.is_empty() {
        rules.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rules)
    } else {
        Err(errors)
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn syntax_err(id: &str, message: impl Into<String>) -> CompilationError {
    CompilationError::Syntax {
        rule_id: id.to_string(),
        message: message.into(),
    }
}

fn compile_rule(line: &str) -> Result<Rule, Vec<CompilationError>> {
    let (id, rest) = line
        .split_once(':')
        .ok_or_else(|| vec![syntax_err("<unknown>", "expected '<id> : <head> <- <body>'")])?;
    let id = id.trim().to_string();

    let (head_text, body_text) = rest
        .split_once("<-")
        .ok_or_else(|| vec![syntax_err(&id, "expected '<-' separating head and body")])?;

    let mut errors = Vec::new();

    let head = match parse_label_and_vars(head_text.trim()) {
        Some((label, vars)) if (1..=2).contains(&vars.len()) => Some(HeadTemplate { label, vars }),
        Some((_, vars)) => {
            errors.push(syntax_err(&id, format!("head must have 1 or 2 variables, got {}", vars.len())));
            None
        }
        None => {
            errors.push(syntax_err(&id, format!("malformed head '{}'", head_text.trim())));
            None
        }
    };

    let (clauses_text, options_text) = split_options(body_text);

    let mut clauses = Vec::new();
    for (idx, clause_text) in split_by_comma(clauses_text).into_iter().enumerate() {
        let clause_text = clause_text.trim();
        if clause_text.is_empty() {
            continue;
        }
        match parse_clause(&id, idx, clause_text) {
            Ok(c) => clauses.push(c),
            Err(e) => errors.push(e),
        }
    }
    if clauses.is_empty() {
        errors.push(syntax_err(&id, "rule body must have at least one clause"));
    }

    let (annotation, mode, is_static, precedent_weights) = parse_options(&id, options_text, &mut errors);

    if let Some(head) = &head {
        let body_vars: HashSet<&str> = clauses.iter().flat_map(|c| c.vars.iter().map(String::as_str)).collect();
        for var in &head.vars {
            if !body_vars.contains(var.as_str()) {
                errors.push(CompilationError::UnboundHeadVariable {
                    rule_id: id.clone(),
                    var: var.clone(),
                });
            }
        }
    }

    // Every clause after the first must share a variable with an earlier
    // clause -- otherwise it is an unconnected join with no way to prune the
    // resulting Cartesian product (spec §4.4's "reject ... clause variables
    // unbound by earlier clauses", resolved this way in `DESIGN.md`).
    let mut bound: HashSet<String> = HashSet::new();
    for (idx, clause) in clauses.iter().enumerate() {
        if idx > 0 && !clause.vars.iter().any(|v| bound.contains(v)) {
            errors.push(CompilationError::UnboundClauseVariable {
                rule_id: id.clone(),
                clause_index: idx,
                var: clause.vars.join(","),
            });
        }
        for v in &clause.vars {
            bound.insert(v.clone());
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(Rule {
        id,
        head: head.expect("checked above: errors would be non-empty otherwise"),
        body: clauses,
        annotation: annotation.expect("checked in parse_options: errors would be non-empty otherwise"),
        mode,
        is_static,
        precedent_weights,
    })
}

/// Find where the clause list ends and the trailing rule options
/// (`annotate=`, `mode=`, `weights=`, `static`) begin: the earliest
/// top-level (outside parens) occurrence of any option keyword, preceded by
/// whitespace or start-of-string.
fn split_options(text: &str) -> (&str, &str) {
    const KEYWORDS: &[&str] = &["annotate=", "mode=", "weights=", "static"];
    let idx = KEYWORDS.iter().filter_map(|kw| find_top_level(text, kw)).min();
    match idx {
        Some(i) => (&text[..i], &text[i..]),
        None => (text, ""),
    }
}

fn find_top_level(text: &str, needle: &str) -> Option<usize> {
    let mut depth = 0i32;
    let mut prev: Option<char> = None;
    for (idx, ch) in text.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
        if depth == 0 && (idx == 0 || prev == Some(' ')) && text[idx..].starts_with(needle) {
            return Some(idx);
        }
        prev = Some(ch);
    }
    None
}

fn tokenize_options(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

#[allow(clippy::type_complexity)]
fn parse_options(
    id: &str,
    text: &str,
    errors: &mut Vec<CompilationError>,
) -> (Option<String>, Option<UpdateMode>, bool, HashMap<String, f64>) {
    let mut annotation = None;
    let mut mode = None;
    let mut is_static = false;
    let mut weights = HashMap::new();

    for token in tokenize_options(text) {
        if token == "static" {
            is_static = true;
        } else if let Some(name) = token.strip_prefix("annotate=") {
            if !annotation::is_known_annotation(name) {
                errors.push(CompilationError::UnknownAnnotation {
                    rule_id: id.to_string(),
                    name: name.to_string(),
                });
            }
            annotation = Some(name.to_string());
        } else if let Some(val) = token.strip_prefix("mode=") {
            match val {
                "intersection" => mode = Some(UpdateMode::Intersection),
                "override" => mode = Some(UpdateMode::Override),
                other => errors.push(syntax_err(id, format!("unknown mode '{other}'"))),
            }
        } else if let Some(val) = token.strip_prefix("weights=") {
            for pair in val.split('|') {
                match pair.split_once(':') {
                    Some((class, w)) => match w.trim().parse::<f64>() {
                        Ok(w) => {
                            weights.insert(class.trim().to_string(), w);
                        }
                        Err(_) => errors.push(syntax_err(id, format!("invalid weight '{w}' for class '{class}'"))),
                    },
                    None => errors.push(syntax_err(id, format!("malformed weights entry '{pair}'"))),
                }
            }
        } else if !token.is_empty() {
            errors.push(syntax_err(id, format!("unrecognized rule option '{token}'")));
        }
    }

    if annotation.is_none() {
        errors.push(CompilationError::MissingAnnotation { rule_id: id.to_string() });
    }

    (annotation, mode, is_static, weights)
}

/// Split `Label(a, b)` into `("Label", ["a", "b"])`.
fn parse_label_and_vars(text: &str) -> Option<(String, Vec<String>)> {
    let open = text.find('(')?;
    if open == 0 || !text.ends_with(')') {
        return None;
    }
    let label = text[..open].trim().to_string();
    if label.is_empty() {
        return None;
    }
    let inner = &text[open + 1..text.len() - 1];
    let vars: Vec<String> = split_by_comma(inner)
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    Some((label, vars))
}

/// Paren-aware comma split (commas inside `(...)` do not split).
fn split_by_comma(input: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    for ch in input.chars() {
        match ch {
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth -= 1;
                current.push(ch);
            }
            ',' if depth == 0 => {
                result.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() || !result.is_empty() {
        result.push(current);
    }
    result
}

fn parse_clause(id: &str, idx: usize, text: &str) -> Result<Clause, CompilationError> {
    let (op_start, op_end, op) = find_op(text).ok_or_else(|| CompilationError::MalformedThreshold {
        rule_id: id.to_string(),
        clause_index: idx,
        text: text.to_string(),
    })?;

    let label_part = text[..op_start].trim();
    let threshold_part = text[op_end..].trim();

    let (label, vars) = parse_label_and_vars(label_part).ok_or_else(|| CompilationError::Syntax {
        rule_id: id.to_string(),
        message: format!("clause {idx}: malformed atom '{label_part}'"),
    })?;

    let kind = match vars.len() {
        1 => ClauseKind::Node,
        2 => ClauseKind::Edge,
        n => {
            return Err(CompilationError::Syntax {
                rule_id: id.to_string(),
                message: format!("clause {idx}: expected 1 or 2 variables, got {n}"),
            })
        }
    };

    let (threshold, clause_class) = parse_threshold(threshold_part, op).map_err(|_| CompilationError::MalformedThreshold {
        rule_id: id.to_string(),
        clause_index: idx,
        text: threshold_part.to_string(),
    })?;

    Ok(Clause {
        kind,
        label,
        vars,
        threshold,
        clause_class,
    })
}

fn find_op(s: &str) -> Option<(usize, usize, ThresholdOp)> {
    let bytes = s.as_bytes();
    for i in 0..bytes.len() {
        match bytes[i] {
            b'>' if bytes.get(i + 1) == Some(&b'=') => return Some((i, i + 2, ThresholdOp::Ge)),
            b'<' if bytes.get(i + 1) == Some(&b'=') => return Some((i, i + 2, ThresholdOp::Le)),
            b'=' => return Some((i, i + 1, ThresholdOp::Eq)),
            _ => {}
        }
    }
    None
}

fn parse_threshold(text: &str, op: ThresholdOp) -> Result<(Threshold, Option<String>), String> {
    let mut text = text.trim();

    let mut class = None;
    if let Some(idx) = text.rfind(':') {
        class = Some(text[idx + 1..].trim().to_string());
        text = text[..idx].trim();
    }

    let mut base = ThresholdBase::Total;
    if let Some(idx) = text.find('@') {
        let base_str = text[idx + 1..].trim();
        base = match base_str {
            "total" => ThresholdBase::Total,
            "available" => ThresholdBase::Available,
            other => return Err(format!("unknown threshold base '{other}'")),
        };
        text = text[..idx].trim();
    }

    let mut percent = false;
    if let Some(stripped) = text.strip_suffix('%') {
        percent = true;
        text = stripped.trim();
    }

    let mut value: f64 = text.parse().map_err(|_| format!("invalid threshold number '{text}'"))?;
    if percent {
        if !(0.0..=100.0).contains(&value) {
            return Err(format!("percent threshold {value} out of [0,100]"));
        }
        value /= 100.0;
    }

    Ok((Threshold { op, value, base }, class))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_simple_rule() {
        let src = "r1: AccommodationRequired(X) <- Disability(X) >= 0.5, CanPerformWithAccommodation(X) >= 0.5 annotate=legal_burden_civil_051 mode=intersection";
        let rules = compile_program(src).unwrap();
        assert_eq!(rules.len(), 1);
        let rule = &rules[0];
        assert_eq!(rule.id, "r1");
        assert_eq!(rule.head.label, "AccommodationRequired");
        assert_eq!(rule.body.len(), 2);
        assert_eq!(rule.annotation, "legal_burden_civil_051");
        assert_eq!(rule.mode, Some(UpdateMode::Intersection));
    }

    #[test]
    fn percent_and_base_threshold_parse() {
        let src = "r1: H(X) <- L(X) >= 51%@available annotate=average";
        let rules = compile_program(src).unwrap();
        let clause = &rules[0].body[0];
        assert!((clause.threshold.value - 0.51).abs() < 1e-9);
        assert_eq!(clause.threshold.base, ThresholdBase::Available);
    }

    #[test]
    fn clause_class_and_weights_parse() {
        let src = "r1: H(a) <- Controlling(a) >= 0.5:controlling, Persuasive(a) >= 0.5:persuasive annotate=precedent_weighted weights=controlling:3|persuasive:1";
        let rules = compile_program(src).unwrap();
        let rule = &rules[0];
        assert_eq!(rule.body[0].clause_class, Some("controlling".to_string()));
        assert_eq!(rule.precedent_weights.get("controlling"), Some(&3.0));
        assert_eq!(rule.precedent_weights.get("persuasive"), Some(&1.0));
    }

    #[test]
    fn static_keyword_sets_flag() {
        let src = "r1: H(X) <- L(X) >= 0.5 annotate=average static";
        let rules = compile_program(src).unwrap();
        assert!(rules[0].is_static);
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let src = "# a comment\n\nr1: H(X) <- L(X) >= 0.5 annotate=average\n";
        let rules = compile_program(src).unwrap();
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn rejects_unbound_head_variable() {
        let src = "r1: H(Y) <- L(X) >= 0.5 annotate=average";
        let errs = compile_program(src).unwrap_err();
        assert!(matches!(errs[0], CompilationError::UnboundHeadVariable { .. }));
    }

    #[test]
    fn rejects_unknown_annotation() {
        let src = "r1: H(X) <- L(X) >= 0.5 annotate=nonexistent";
        let errs = compile_program(src).unwrap_err();
        assert!(errs.iter().any(|e| matches!(e, CompilationError::UnknownAnnotation { .. })));
    }

    #[test]
    fn rejects_malformed_threshold() {
        let src = "r1: H(X) <- L(X) >= abc annotate=average";
        let errs = compile_program(src).unwrap_err();
        assert!(matches!(errs[0], CompilationError::MalformedThreshold { .. }));
    }

    #[test]
    fn rejects_missing_annotation() {
        let src = "r1: H(X) <- L(X) >= 0.5";
        let errs = compile_program(src).unwrap_err();
        assert!(errs.iter().any(|e| matches!(e, CompilationError::MissingAnnotation { .. })));
    }

    #[test]
    fn rejects_disconnected_edge_clause() {
        let src = "r1: H(X) <- L(X) >= 0.5, Cites(U,V) >= 0.5 annotate=average";
        let errs = compile_program(src).unwrap_err();
        assert!(errs.iter().any(|e| matches!(e, CompilationError::UnboundClauseVariable { .. })));
    }

    #[test]
    fn compilation_is_all_or_nothing_across_the_whole_program() {
        let src = "r1: H(X) <- L(X) >= 0.5 annotate=average\nr2: H(Y) <- L(X) >= 0.5 annotate=average\n";
        let errs = compile_program(src).unwrap_err();
        // r1 is fine; r2 has an unbound head variable. The whole program
        // still fails, and r1's success doesn't mask r2's error.
        assert!(errs.iter().any(|e| matches!(e, CompilationError::UnboundHeadVariable { rule_id, .. } if rule_id == "r2")));
    }
}
