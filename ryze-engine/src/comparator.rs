//! Value comparison used by assertions
//!
//! Equality is loose across JSON types: `1`, `1.0` and `"1"` are equal, and
//! `true` equals `"true"`. Strings holding JSON compare structurally against
//! arrays and objects.

use crate::assertion::Rule;
use regex::RegexBuilder;
use ryze_core::template::value_to_text;
use serde_json::Value;
use std::cmp::Ordering;

/// Apply a rule; `Err` carries a message when the comparison is not possible
pub fn apply(rule: Rule, actual: &Value, expected: &Value, ignore_case: bool) -> Result<bool, String> {
    match rule {
        Rule::Equals => Ok(loose_equals(actual, expected, ignore_case)),
        Rule::NotEquals => Ok(!loose_equals(actual, expected, ignore_case)),
        Rule::Same => Ok(actual == expected),
        Rule::Contains => Ok(contains(actual, expected, ignore_case)),
        Rule::NotContains => Ok(!contains(actual, expected, ignore_case)),
        Rule::Regex => matches_regex(actual, expected, ignore_case),
        Rule::Greater => ordering(actual, expected).map(|o| o == Ordering::Greater),
        Rule::GreaterOrEquals => ordering(actual, expected).map(|o| o != Ordering::Less),
        Rule::Less => ordering(actual, expected).map(|o| o == Ordering::Less),
        Rule::LessOrEquals => ordering(actual, expected).map(|o| o != Ordering::Greater),
        Rule::IsEmpty => Ok(is_empty(actual)),
        Rule::IsNotEmpty => Ok(!is_empty(actual)),
        Rule::AnyEquals => Ok(any(actual, expected, |a, e| loose_equals(a, e, ignore_case))),
        Rule::AnyContains => Ok(any(actual, expected, |a, e| contains(a, e, ignore_case))),
    }
}

pub fn loose_equals(actual: &Value, expected: &Value, ignore_case: bool) -> bool {
    match (actual, expected) {
        (Value::Null, Value::Null) => true,
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            match (n.as_f64(), s.trim().parse::<f64>()) {
                (Some(a), Ok(b)) => a == b,
                _ => false,
            }
        }
        (Value::Bool(b), Value::String(s)) | (Value::String(s), Value::Bool(b)) => {
            s.trim().eq_ignore_ascii_case(if *b { "true" } else { "false" })
        }
        (Value::String(a), Value::String(b)) => {
            if ignore_case {
                a.to_lowercase() == b.to_lowercase()
            } else {
                a == b
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b)
                    .all(|(x, y)| loose_equals(x, y, ignore_case))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter().all(|(key, x)| {
                    b.get(key)
                        .is_some_and(|y| loose_equals(x, y, ignore_case))
                })
        }
        (structured @ (Value::Array(_) | Value::Object(_)), Value::String(s))
        | (Value::String(s), structured @ (Value::Array(_) | Value::Object(_))) => {
            serde_json::from_str::<Value>(s)
                .map(|parsed| loose_equals(structured, &parsed, ignore_case))
                .unwrap_or(false)
        }
        _ => actual == expected,
    }
}

/// Substring for text, membership for arrays, key or value for objects
pub fn contains(haystack: &Value, needle: &Value, ignore_case: bool) -> bool {
    match haystack {
        Value::Null => false,
        Value::Array(items) => items.iter().any(|item| loose_equals(item, needle, ignore_case)),
        Value::Object(map) => {
            let key = value_to_text(needle);
            map.contains_key(&key) || map.values().any(|v| loose_equals(v, needle, ignore_case))
        }
        other => {
            let text = value_to_text(other);
            let needle = value_to_text(needle);
            if ignore_case {
                text.to_lowercase().contains(&needle.to_lowercase())
            } else {
                text.contains(&needle)
            }
        }
    }
}

pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Numeric ordering of two values; numeric strings are accepted
pub fn ordering(actual: &Value, expected: &Value) -> Result<Ordering, String> {
    let a = as_number(actual).ok_or_else(|| format!("{} is not numeric", actual))?;
    let b = as_number(expected).ok_or_else(|| format!("{} is not numeric", expected))?;
    a.partial_cmp(&b)
        .ok_or_else(|| format!("{} and {} cannot be ordered", actual, expected))
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Unanchored search: the pattern passes when it matches anywhere in the
/// text. Use `^...$` to require a full match.
fn matches_regex(actual: &Value, pattern: &Value, ignore_case: bool) -> Result<bool, String> {
    let pattern = value_to_text(pattern);
    let regex = RegexBuilder::new(&pattern)
        .case_insensitive(ignore_case)
        .build()
        .map_err(|e| format!("invalid pattern {}: {}", pattern, e))?;
    Ok(regex.is_match(&value_to_text(actual)))
}

/// `actual` matches any of the expected values, or any element of an
/// array `actual` matches `expected`
fn any(actual: &Value, expected: &Value, check: impl Fn(&Value, &Value) -> bool) -> bool {
    match (actual, expected) {
        (Value::Array(items), Value::Array(candidates)) => items
            .iter()
            .any(|a| candidates.iter().any(|e| check(a, e))),
        (_, Value::Array(candidates)) => candidates.iter().any(|e| check(actual, e)),
        (Value::Array(items), _) => items.iter().any(|a| check(a, expected)),
        _ => check(actual, expected),
    }
}
