//! Minimal JSON path queries used by templates, extractors and assertions.
//!
//! Supported syntax: `$`, `$.field`, `$.field.nested`, `$.array[0]`,
//! `$.array[-1]` (from the end) and `$.array[*].field` (collects into an
//! array). The leading `$` and dot are optional.

use crate::error::ExtractionError;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(String),
    Index(i64),
    Wildcard,
}

/// Query a JSON value, returning `Ok(None)` when the path does not exist
pub fn query(value: &Value, path: &str) -> Result<Option<Value>, ExtractionError> {
    let segments = parse(path)?;
    Ok(walk(value, &segments))
}

fn parse(path: &str) -> Result<Vec<Segment>, ExtractionError> {
    let path = path.trim();
    let path = path.strip_prefix('$').unwrap_or(path);
    let path = path.strip_prefix('.').unwrap_or(path);

    let mut segments = Vec::new();
    for raw in split_path_segments(path) {
        let (name, indices) = match raw.find('[') {
            Some(start) => (&raw[..start], &raw[start..]),
            None => (raw.as_str(), ""),
        };
        if !name.is_empty() {
            segments.push(Segment::Key(name.to_string()));
        }

        let mut rest = indices;
        while !rest.is_empty() {
            let close = rest
                .find(']')
                .ok_or_else(|| ExtractionError::InvalidExpression(path.to_string()))?;
            let inner = rest[1..close].trim();
            let inner = inner.trim_matches(|c| c == '\'' || c == '"');
            if inner == "*" {
                segments.push(Segment::Wildcard);
            } else if let Ok(index) = inner.parse::<i64>() {
                segments.push(Segment::Index(index));
            } else if !inner.is_empty() {
                segments.push(Segment::Key(inner.to_string()));
            } else {
                return Err(ExtractionError::InvalidExpression(path.to_string()));
            }
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return Err(ExtractionError::InvalidExpression(path.to_string()));
            }
        }
    }
    Ok(segments)
}

/// Split a path into segments, respecting array brackets.
fn split_path_segments(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_bracket = false;

    for ch in path.chars() {
        match ch {
            '.' if !in_bracket => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            '[' => {
                in_bracket = true;
                current.push(ch);
            }
            ']' => {
                in_bracket = false;
                current.push(ch);
            }
            _ => current.push(ch),
        }
    }

    if !current.is_empty() {
        segments.push(current);
    }

    segments
}

fn walk(current: &Value, segments: &[Segment]) -> Option<Value> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(current.clone());
    };

    match head {
        Segment::Key(key) => walk(current.get(key.as_str())?, rest),
        Segment::Index(index) => {
            let items = current.as_array()?;
            let position = if *index < 0 {
                items.len().checked_sub(index.unsigned_abs() as usize)?
            } else {
                *index as usize
            };
            walk(items.get(position)?, rest)
        }
        Segment::Wildcard => {
            let items: Vec<Value> = match current {
                Value::Array(items) => items.iter().filter_map(|v| walk(v, rest)).collect(),
                Value::Object(map) => map.values().filter_map(|v| walk(v, rest)).collect(),
                _ => return None,
            };
            Some(Value::Array(items))
        }
    }
}
