//! Predicate evaluation engine.
//!
//! Evaluates predicates against anything implementing [`FieldSource`].
//!
//! # Evaluation Semantics
//!
//! - Comparisons against a missing or non-numeric field are `false`
//! - `EXISTS`: true for any present, non-null value
//! - `AND`: Short-circuits on first `false`
//! - `OR`: Short-circuits on first `true`
//! - `ANY(path, p)`: the array at `path` has at least one element matching `p`
//! - `NONE(path, p)`: the array at `path` exists and no element matches `p`

use crate::domain::predicate::{Literal, Predicate};
use crate::domain::record::FieldSource;
use serde_json::Value;

const EPSILON: f64 = 1e-9;

pub fn evaluate<S: FieldSource + ?Sized>(predicate: &Predicate, source: &S) -> bool {
    match predicate {
        Predicate::Exists(path) => source.value(path).is_some(),
        Predicate::Above { path, value } => source.number(path).is_some_and(|v| v > *value),
        Predicate::Below { path, value } => source.number(path).is_some_and(|v| v < *value),
        Predicate::AtLeast { path, value } => source.number(path).is_some_and(|v| v >= *value),
        Predicate::AtMost { path, value } => source.number(path).is_some_and(|v| v <= *value),
        Predicate::Between { path, lower, upper } => source
            .number(path)
            .is_some_and(|v| v >= *lower && v <= *upper),
        Predicate::Equals { path, value } => source
            .value(path)
            .is_some_and(|found| literal_matches(value, &found)),
        Predicate::And(items) => items.iter().all(|p| evaluate(p, source)),
        Predicate::Or(items) => items.iter().any(|p| evaluate(p, source)),
        Predicate::Not(inner) => !evaluate(inner, source),
        Predicate::AnyOf { path, predicate } => match source.value(path).as_deref() {
            Some(Value::Array(items)) => items.iter().any(|item| evaluate(predicate, item)),
            _ => false,
        },
        Predicate::NoneOf { path, predicate } => match source.value(path).as_deref() {
            Some(Value::Array(items)) => !items.iter().any(|item| evaluate(predicate, item)),
            _ => false,
        },
    }
}

fn literal_matches(literal: &Literal, found: &Value) -> bool {
    match (literal, found) {
        (Literal::Number(expected), Value::Number(n)) => n
            .as_f64()
            .is_some_and(|actual| (actual - expected).abs() < EPSILON),
        (Literal::Text(expected), Value::String(actual)) => expected == actual,
        (Literal::Bool(expected), Value::Bool(actual)) => expected == actual,
        _ => false,
    }
}
