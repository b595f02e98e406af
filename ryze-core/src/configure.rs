//! Protocol configure items and the helpers used to merge them
//!
//! Merging never mutates its inputs: `local.merge(&named)` returns a new item
//! where every field set on `local` is kept and every unset field is taken
//! from `named`. Maps are unioned key by key and JSON objects are unioned
//! recursively, local entries winning on conflict.

use crate::context::Context;
use crate::error::TemplateError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Protocol specific configuration fragment
pub trait ConfigureItem: Clone + Debug + Send + Sync + 'static {
    /// Reference used when the item does not name one
    const DEFAULT_REF: &'static str;

    /// Explicit reference name, if any
    fn ref_name(&self) -> Option<&str>;

    /// Combine with an inherited item; `self` wins field by field
    fn merge(&self, other: &Self) -> Self;

    /// Resolve every templated field against the context
    fn evaluate(&self, ctx: &Context) -> Result<Self, TemplateError>;

    /// Reference used for registry lookups
    fn effective_ref(&self) -> &str {
        self.ref_name()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or(Self::DEFAULT_REF)
    }

    /// Whether the item names a reference other than the protocol default
    fn has_explicit_ref(&self) -> bool {
        self.effective_ref() != Self::DEFAULT_REF
    }
}

/// Keep `local` when set, otherwise take `other`
pub fn merge_option<T: Clone>(local: &Option<T>, other: &Option<T>) -> Option<T> {
    local.clone().or_else(|| other.clone())
}

/// Like [`merge_option`] but a blank local string counts as unset
pub fn merge_string(local: &Option<String>, other: &Option<String>) -> Option<String> {
    match local {
        Some(value) if !value.trim().is_empty() => Some(value.clone()),
        _ => other.clone(),
    }
}

/// Key-wise union, local entries winning
pub fn merge_map<V: Clone>(local: &BTreeMap<String, V>, other: &BTreeMap<String, V>) -> BTreeMap<String, V> {
    let mut merged = other.clone();
    merged.extend(local.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Deep union of JSON objects, local entries winning; non-objects are kept
/// whole
pub fn merge_json(local: &Option<Value>, other: &Option<Value>) -> Option<Value> {
    match (local, other) {
        (Some(l), Some(o)) => Some(merge_json_value(l, o)),
        (Some(l), None) => Some(l.clone()),
        (None, o) => o.clone(),
    }
}

fn merge_json_value(local: &Value, other: &Value) -> Value {
    match (local, other) {
        (Value::Object(l), Value::Object(o)) => {
            let mut merged = o.clone();
            for (key, value) in l {
                let combined = match o.get(key) {
                    Some(existing) => merge_json_value(value, existing),
                    None => value.clone(),
                };
                merged.insert(key.clone(), combined);
            }
            Value::Object(merged)
        }
        (l, _) => l.clone(),
    }
}

/// Resolve an optional templated string
pub fn evaluate_string(ctx: &Context, value: &Option<String>) -> Result<Option<String>, TemplateError> {
    value.as_deref().map(|s| ctx.resolve_string(s)).transpose()
}

/// Resolve every value of a templated string map
pub fn evaluate_map(ctx: &Context, map: &BTreeMap<String, String>) -> Result<BTreeMap<String, String>, TemplateError> {
    map.iter()
        .map(|(k, v)| Ok((k.clone(), ctx.resolve_string(v)?)))
        .collect()
}

/// Resolve an optional templated JSON value
pub fn evaluate_json(ctx: &Context, value: &Option<Value>) -> Result<Option<Value>, TemplateError> {
    value.as_ref().map(|v| ctx.resolve_value(v)).transpose()
}
