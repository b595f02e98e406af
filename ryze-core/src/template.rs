//! `${...}` template resolution against a [`Context`]
//!
//! A template that consists of exactly one placeholder evaluates to the raw
//! variable value, so numbers stay numbers and objects stay objects. Mixed
//! text interpolates every placeholder as text. Placeholders may navigate
//! into JSON values (`${user.tags[0]}`), call registered functions
//! (`${base64_encode(${user}:${password})}`) or be nested (`${user_${n}}`).

use crate::context::Context;
use crate::error::TemplateError;
use crate::json_path;
use serde_json::Value;
use std::borrow::Cow;

#[derive(Debug, PartialEq)]
enum Piece<'a> {
    Text(&'a str),
    Expr(&'a str),
}

/// Check whether a string holds at least one placeholder
pub fn contains_placeholder(text: &str) -> bool {
    text.contains("${")
}

/// Render a value the way it is interpolated inside a larger string
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn resolve(ctx: &Context, template: &str, strict: bool) -> Result<Value, TemplateError> {
    let pieces = match split(template) {
        Ok(pieces) => pieces,
        Err(_) if !strict => return Ok(Value::String(template.to_string())),
        Err(e) => return Err(e),
    };

    if let [Piece::Expr(expr)] = pieces.as_slice() {
        return match evaluate(ctx, expr, strict) {
            Ok(value) => Ok(value),
            Err(_) if !strict => Ok(Value::String(template.to_string())),
            Err(e) => Err(e),
        };
    }

    let mut out = String::with_capacity(template.len());
    for piece in pieces {
        match piece {
            Piece::Text(text) => out.push_str(text),
            Piece::Expr(expr) => match evaluate(ctx, expr, strict) {
                Ok(value) => out.push_str(&value_to_text(&value)),
                Err(_) if !strict => {
                    out.push_str("${");
                    out.push_str(expr);
                    out.push('}');
                }
                Err(e) => return Err(e),
            },
        }
    }
    Ok(Value::String(out))
}

pub(crate) fn resolve_value(ctx: &Context, value: &Value, strict: bool) -> Result<Value, TemplateError> {
    match value {
        Value::String(s) if contains_placeholder(s) => resolve(ctx, s, strict),
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_value(ctx, item, strict))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut resolved = serde_json::Map::with_capacity(map.len());
            for (key, item) in map {
                resolved.insert(key.clone(), resolve_value(ctx, item, strict)?);
            }
            Ok(Value::Object(resolved))
        }
        other => Ok(other.clone()),
    }
}

fn split(template: &str) -> Result<Vec<Piece<'_>>, TemplateError> {
    let bytes = template.as_bytes();
    let mut pieces = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'$' && bytes.get(i + 1) == Some(&b'{') {
            let mut depth = 1;
            let mut j = i + 2;
            while j < bytes.len() {
                match bytes[j] {
                    b'{' => depth += 1,
                    b'}' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
                j += 1;
            }
            if depth != 0 {
                return Err(TemplateError::Malformed(template.to_string()));
            }
            if text_start < i {
                pieces.push(Piece::Text(&template[text_start..i]));
            }
            pieces.push(Piece::Expr(&template[i + 2..j]));
            i = j + 1;
            text_start = i;
        } else {
            i += 1;
        }
    }

    if text_start < bytes.len() {
        pieces.push(Piece::Text(&template[text_start..]));
    }
    Ok(pieces)
}

fn evaluate(ctx: &Context, expr: &str, strict: bool) -> Result<Value, TemplateError> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(TemplateError::Malformed("${}".to_string()));
    }

    if let Some((name, raw_args)) = parse_call(expr) {
        let args = split_args(raw_args)
            .into_iter()
            .map(|arg| resolve_arg(ctx, arg, strict))
            .collect::<Result<Vec<_>, _>>()?;
        let function = ctx
            .functions()
            .get(name)
            .ok_or_else(|| TemplateError::UnknownFunction(name.to_string()))?;
        return function.call(ctx, &args);
    }

    let expr: Cow<'_, str> = if contains_placeholder(expr) {
        Cow::Owned(value_to_text(&resolve(ctx, expr, strict)?))
    } else {
        Cow::Borrowed(expr)
    };

    lookup(ctx, &expr).ok_or_else(|| TemplateError::Unresolved(expr.to_string()))
}

pub(crate) fn lookup(ctx: &Context, expr: &str) -> Option<Value> {
    if let Some(value) = ctx.get(expr) {
        return Some(value.clone());
    }

    let split_at = expr.find(['.', '['])?;
    let (name, rest) = expr.split_at(split_at);
    let root = ctx.get(name)?;
    match root {
        Value::String(text) => {
            let parsed: Value = serde_json::from_str(text).ok()?;
            json_path::query(&parsed, rest).ok().flatten()
        }
        other => json_path::query(other, rest).ok().flatten(),
    }
}

fn parse_call(expr: &str) -> Option<(&str, &str)> {
    let name_end = expr
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(expr.len());
    let name = &expr[..name_end];
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let rest = expr[name_end..].trim_start();
    let inner = rest.strip_prefix('(')?.strip_suffix(')')?;
    Some((name, inner))
}

fn split_args(raw: &str) -> Vec<&str> {
    if raw.trim().is_empty() {
        return Vec::new();
    }

    let mut args = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, ch) in raw.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '(') | (None, '{') => depth += 1,
            (None, ')') | (None, '}') => depth -= 1,
            (None, ',') if depth == 0 => {
                args.push(&raw[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    args.push(&raw[start..]);
    args
}

fn resolve_arg(ctx: &Context, arg: &str, strict: bool) -> Result<String, TemplateError> {
    let arg = arg.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| {
            arg.strip_prefix(*q)
                .and_then(|rest| rest.strip_suffix(*q))
        })
        .unwrap_or(arg);

    if contains_placeholder(unquoted) {
        Ok(value_to_text(&resolve(ctx, unquoted, strict)?))
    } else {
        Ok(unquoted.to_string())
    }
}
