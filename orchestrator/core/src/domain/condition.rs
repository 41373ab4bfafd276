// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Condition expressions for sequence flows and gateway splits.
//!
//! Supported grammar, checked in this order:
//!
//! | Form | Meaning |
//! |------|---------|
//! | empty / absent | always true |
//! | `flag`, `!flag` | truthiness of a variable |
//! | `a == b`, `a != b` | equality against a literal, boolean or variable |
//! | `a > b`, `a < b`, `a >= b`, `a <= b` | numeric comparison |
//! | `a && b`, `a \|\| b` | single-level conjunction / disjunction |
//! | `x in y` | membership of `x` in list variable `y` |
//!
//! Evaluation never panics and never propagates an error past the two
//! degrading entry points: [`ConditionEvaluator::evaluate`] (split semantics,
//! malformed is false) and [`ConditionEvaluator::evaluate_guard`] (sequence
//! guard semantics, malformed is true).

use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::warn;

/// Flat variable mapping read by conditions.
pub type Variables = HashMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    Ne,
    Ge,
    Le,
    Gt,
    Lt,
}

impl Operator {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Operator::Eq => ordering == Ordering::Equal,
            Operator::Ne => ordering != Ordering::Equal,
            Operator::Gt => ordering == Ordering::Greater,
            Operator::Lt => ordering == Ordering::Less,
            Operator::Ge => ordering != Ordering::Less,
            Operator::Le => ordering != Ordering::Greater,
        }
    }
}

// Two-character operators must be probed before their one-character prefixes.
const OPERATORS: [(&str, Operator); 6] = [
    ("==", Operator::Eq),
    ("!=", Operator::Ne),
    (">=", Operator::Ge),
    ("<=", Operator::Le),
    (">", Operator::Gt),
    ("<", Operator::Lt),
];

pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// Evaluate with split semantics: unparseable expressions are false.
    pub fn evaluate(expression: Option<&str>, variables: &Variables) -> bool {
        Self::evaluate_or(expression, variables, false)
    }

    /// Evaluate with sequence-guard semantics: unparseable expressions are true.
    pub fn evaluate_guard(expression: Option<&str>, variables: &Variables) -> bool {
        Self::evaluate_or(expression, variables, true)
    }

    fn evaluate_or(expression: Option<&str>, variables: &Variables, fallback: bool) -> bool {
        match Self::try_evaluate(expression, variables) {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    expression = expression.unwrap_or_default(),
                    error = %e,
                    fallback,
                    "Condition evaluation failed, using fallback"
                );
                fallback
            }
        }
    }

    pub fn try_evaluate(
        expression: Option<&str>,
        variables: &Variables,
    ) -> Result<bool, ConditionError> {
        let expression = match expression.map(str::trim) {
            None | Some("") => return Ok(true),
            Some(e) => e,
        };

        if is_identifier(expression) {
            return Ok(truthy(lookup(variables, expression)));
        }

        // Combinators split first: each operand is an atom, nesting is not supported.
        match (expression.contains("&&"), expression.contains("||")) {
            (true, true) => Err(ConditionError::MixedOperators(expression.to_string())),
            (true, false) => {
                for operand in expression.split("&&") {
                    if !Self::evaluate_atom(operand.trim(), variables)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (false, true) => {
                for operand in expression.split("||") {
                    if Self::evaluate_atom(operand.trim(), variables)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            (false, false) => Self::evaluate_atom(expression, variables),
        }
    }

    fn evaluate_atom(atom: &str, variables: &Variables) -> Result<bool, ConditionError> {
        if atom.is_empty() {
            return Err(ConditionError::Malformed(atom.to_string()));
        }

        if is_identifier(atom) {
            return Ok(truthy(lookup(variables, atom)));
        }

        if let Some(negated) = atom.strip_prefix('!') {
            let negated = negated.trim();
            if is_identifier(negated) {
                return Ok(!truthy(lookup(variables, negated)));
            }
        }

        if let Some((lhs, op, rhs)) = split_comparison(atom) {
            let left = resolve_left(lhs.trim(), variables, atom)?;
            let right = resolve_right(rhs.trim(), variables, atom)?;
            return match op {
                Operator::Eq => Ok(loose_eq(&left, &right)),
                Operator::Ne => Ok(!loose_eq(&left, &right)),
                Operator::Gt | Operator::Lt | Operator::Ge | Operator::Le => {
                    let l = numeric(&left, lhs, atom)?;
                    let r = numeric(&right, rhs, atom)?;
                    Ok(l.partial_cmp(&r).is_some_and(|ordering| op.holds(ordering)))
                }
            };
        }

        if let Some((needle, haystack)) = atom.split_once(" in ") {
            let haystack = haystack.trim();
            if !is_identifier(haystack) {
                return Err(ConditionError::Malformed(atom.to_string()));
            }
            let needle = resolve_right(needle.trim(), variables, atom)?;
            return match lookup(variables, haystack) {
                Some(Value::Array(items)) => Ok(items.iter().any(|item| loose_eq(item, &needle))),
                Some(Value::Object(map)) => Ok(needle.as_str().is_some_and(|k| map.contains_key(k))),
                _ => Err(ConditionError::NotAList(haystack.to_string())),
            };
        }

        Err(ConditionError::Malformed(atom.to_string()))
    }
}

fn split_comparison(atom: &str) -> Option<(&str, Operator, &str)> {
    OPERATORS.iter().find_map(|(token, op)| {
        atom.find(token)
            .map(|idx| (&atom[..idx], *op, &atom[idx + token.len()..]))
    })
}

/// Identifiers: letters, digits, `_`, `.` for nested lookups; must not start with a digit.
fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        && !matches!(s, "true" | "false" | "null")
}

/// Flat key first, then a dotted path through nested objects.
fn lookup<'a>(variables: &'a Variables, name: &str) -> Option<&'a Value> {
    if let Some(value) = variables.get(name) {
        return Some(value);
    }
    let mut segments = name.split('.');
    let mut current = variables.get(segments.next()?)?;
    for segment in segments {
        current = current.get(segment)?;
    }
    Some(current)
}

fn literal(token: &str) -> Option<Value> {
    if token.len() >= 2 {
        let quoted = (token.starts_with('"') && token.ends_with('"'))
            || (token.starts_with('\'') && token.ends_with('\''));
        if quoted {
            return Some(Value::String(token[1..token.len() - 1].to_string()));
        }
    }
    match token {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        "null" => return Some(Value::Null),
        _ => {}
    }
    if let Ok(i) = token.parse::<i64>() {
        return Some(Value::from(i));
    }
    token.parse::<f64>().ok().map(Value::from)
}

/// Left operand: a literal, or a variable (missing variables read as null).
fn resolve_left(token: &str, variables: &Variables, atom: &str) -> Result<Value, ConditionError> {
    if let Some(value) = literal(token) {
        return Ok(value);
    }
    if is_identifier(token) {
        return Ok(lookup(variables, token).cloned().unwrap_or(Value::Null));
    }
    Err(ConditionError::Malformed(atom.to_string()))
}

/// Right operand: a literal, a known variable, or a bare word taken as a string.
fn resolve_right(token: &str, variables: &Variables, atom: &str) -> Result<Value, ConditionError> {
    if let Some(value) = literal(token) {
        return Ok(value);
    }
    if is_identifier(token) {
        return Ok(lookup(variables, token)
            .cloned()
            .unwrap_or_else(|| Value::String(token.to_string())));
    }
    Err(ConditionError::Malformed(atom.to_string()))
}

fn numeric(value: &Value, operand: &str, atom: &str) -> Result<f64, ConditionError> {
    as_number(value).ok_or_else(|| ConditionError::NotNumeric {
        operand: operand.trim().to_string(),
        expression: atom.to_string(),
    })
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            match (as_number(left), as_number(right)) {
                (Some(l), Some(r)) => l == r,
                _ => false,
            }
        }
        _ => left == right,
    }
}

/// Missing, `null`, `false`, `0`, `""`, `[]` and `{}` are false.
pub fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConditionError {
    #[error("malformed expression '{0}'")]
    Malformed(String),

    #[error("expression '{0}' mixes '&&' and '||'")]
    MixedOperators(String),

    #[error("operand '{operand}' is not numeric in '{expression}'")]
    NotNumeric { operand: String, expression: String },

    #[error("'{0}' does not resolve to a list")]
    NotAList(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(value: Value) -> Variables {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_empty_expression_is_true() {
        let v = Variables::new();
        assert!(ConditionEvaluator::evaluate(None, &v));
        assert!(ConditionEvaluator::evaluate(Some("   "), &v));
    }

    #[test]
    fn test_identifier_truthiness() {
        let v = vars(json!({"yes": true, "zero": 0, "name": "x", "empty": [], "nested": {"flag": true}}));
        assert!(ConditionEvaluator::evaluate(Some("yes"), &v));
        assert!(!ConditionEvaluator::evaluate(Some("zero"), &v));
        assert!(ConditionEvaluator::evaluate(Some("name"), &v));
        assert!(!ConditionEvaluator::evaluate(Some("empty"), &v));
        assert!(!ConditionEvaluator::evaluate(Some("missing"), &v));
        assert!(ConditionEvaluator::evaluate(Some("nested.flag"), &v));
        assert!(ConditionEvaluator::evaluate(Some("!missing"), &v));
    }

    #[test]
    fn test_equality_and_comparison() {
        let v = vars(json!({"status": "approved", "score": 7, "ratio": "0.5", "done": true}));
        assert!(ConditionEvaluator::evaluate(Some("status == 'approved'"), &v));
        assert!(ConditionEvaluator::evaluate(Some("status == approved"), &v));
        assert!(ConditionEvaluator::evaluate(Some("status != \"rejected\""), &v));
        assert!(ConditionEvaluator::evaluate(Some("done == true"), &v));
        assert!(ConditionEvaluator::evaluate(Some("score >= 7"), &v));
        assert!(ConditionEvaluator::evaluate(Some("score > 6.5"), &v));
        assert!(!ConditionEvaluator::evaluate(Some("score < 7"), &v));
        assert!(ConditionEvaluator::evaluate(Some("ratio <= 0.5"), &v));
        assert!(ConditionEvaluator::evaluate(Some("score == 7.0"), &v));
    }

    #[test]
    fn test_ordering_operators_at_the_boundary() {
        let v = vars(json!({"score": 5, "label": "high"}));
        assert!(ConditionEvaluator::evaluate(Some("score >= 5"), &v));
        assert!(ConditionEvaluator::evaluate(Some("score <= 5"), &v));
        assert!(!ConditionEvaluator::evaluate(Some("score > 5"), &v));
        assert!(!ConditionEvaluator::evaluate(Some("score < 5"), &v));
        assert!(matches!(
            ConditionEvaluator::try_evaluate(Some("label < 3"), &v),
            Err(ConditionError::NotNumeric { .. })
        ));
        assert!(Operator::Ge.holds(Ordering::Equal) && !Operator::Gt.holds(Ordering::Equal));
    }

    #[test]
    fn test_single_level_combinators() {
        let v = vars(json!({"a": true, "b": false, "n": 3}));
        assert!(!ConditionEvaluator::evaluate(Some("a && b"), &v));
        assert!(ConditionEvaluator::evaluate(Some("a || b"), &v));
        assert!(ConditionEvaluator::evaluate(Some("a && n > 2"), &v));
        assert!(matches!(
            ConditionEvaluator::try_evaluate(Some("a && b || n"), &v),
            Err(ConditionError::MixedOperators(_))
        ));
    }

    #[test]
    fn test_membership() {
        let v = vars(json!({"role": "admin", "roles": ["admin", "ops"], "limits": {"cpu": 2}}));
        assert!(ConditionEvaluator::evaluate(Some("role in roles"), &v));
        assert!(!ConditionEvaluator::evaluate(Some("'guest' in roles"), &v));
        assert!(ConditionEvaluator::evaluate(Some("cpu in limits"), &v));
        assert!(matches!(
            ConditionEvaluator::try_evaluate(Some("role in role"), &v),
            Err(ConditionError::NotAList(_))
        ));
    }

    #[test]
    fn test_malformed_fallbacks_differ_by_entry_point() {
        let v = vars(json!({"name": "x"}));
        for expr in ["name >", "=== nope", "name > 'abc'", "1abc"] {
            assert!(!ConditionEvaluator::evaluate(Some(expr), &v), "split: {expr}");
            assert!(ConditionEvaluator::evaluate_guard(Some(expr), &v), "guard: {expr}");
        }
    }
}
