//! Template functions callable as `${name(arg, ...)}`

use crate::context::Context;
use crate::error::TemplateError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use rand::distributions::{Alphanumeric, DistString};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::Value;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use url::form_urlencoded;
use uuid::Uuid;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A function that can be invoked from a template
pub trait TemplateFunction: Send + Sync {
    /// Name used in templates
    fn name(&self) -> &str;

    /// Invoke the function with already-resolved arguments
    fn call(&self, ctx: &Context, args: &[String]) -> Result<Value, TemplateError>;
}

/// Registry of template functions, shared by every context of a session
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn TemplateFunction>>,
}

impl FunctionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in functions
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Base64Encode);
        registry.register(Base64Decode);
        registry.register(Timestamp);
        registry.register(TimeShift);
        registry.register(Property);
        registry.register(UuidFn);
        registry.register(UrlEncode);
        registry.register(UrlDecode);
        registry.register(Random);
        registry.register(RandomString);
        registry.register(JsonRead);
        registry.register(MessageDigest);
        registry
    }

    /// Register a function, replacing any function of the same name
    pub fn register<F: TemplateFunction + 'static>(&mut self, function: F) -> &mut Self {
        self.functions
            .insert(function.name().to_string(), Arc::new(function));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn TemplateFunction>> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Sorted function names
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

fn failed(name: &str, message: impl Into<String>) -> TemplateError {
    TemplateError::FunctionFailed {
        name: name.to_string(),
        message: message.into(),
    }
}

fn required_arg<'a>(name: &str, args: &'a [String], index: usize) -> Result<&'a str, TemplateError> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| failed(name, format!("missing argument {}", index + 1)))
}

/// `${base64_encode(text)}`
pub struct Base64Encode;

impl TemplateFunction for Base64Encode {
    fn name(&self) -> &str {
        "base64_encode"
    }

    fn call(&self, _ctx: &Context, args: &[String]) -> Result<Value, TemplateError> {
        let input = required_arg(self.name(), args, 0)?;
        Ok(Value::String(STANDARD.encode(input.as_bytes())))
    }
}

/// `${base64_decode(text)}`
pub struct Base64Decode;

impl TemplateFunction for Base64Decode {
    fn name(&self) -> &str {
        "base64_decode"
    }

    fn call(&self, _ctx: &Context, args: &[String]) -> Result<Value, TemplateError> {
        let input = required_arg(self.name(), args, 0)?;
        let bytes = STANDARD
            .decode(input.trim())
            .map_err(|e| failed(self.name(), e.to_string()))?;
        let text = String::from_utf8(bytes).map_err(|e| failed(self.name(), e.to_string()))?;
        Ok(Value::String(text))
    }
}

/// `${timestamp()}`, `${timestamp(format)}` or `${timestamp(format, offset)}`.
///
/// Without a format the epoch milliseconds are returned as a number. The
/// format is a strftime pattern; `yyyy-MM-dd HH:mm:ss.SSS` style patterns
/// are translated. The offset is an ISO-8601 duration such as `P1D` or
/// `-PT30M`.
pub struct Timestamp;

impl TemplateFunction for Timestamp {
    fn name(&self) -> &str {
        "timestamp"
    }

    fn call(&self, _ctx: &Context, args: &[String]) -> Result<Value, TemplateError> {
        if args.len() > 2 {
            return Err(failed(self.name(), "expects at most 2 arguments"));
        }
        shift_time(self.name(), Utc::now(), args.first(), args.get(1))
    }
}

/// `${time_shift(format, date, offset)}`: like `timestamp`, but shifts
/// `date` instead of now. `date` is epoch milliseconds, RFC 3339,
/// `yyyy-MM-dd HH:mm:ss` or `yyyy-MM-dd` (read as UTC); blank means now.
pub struct TimeShift;

impl TemplateFunction for TimeShift {
    fn name(&self) -> &str {
        "time_shift"
    }

    fn call(&self, _ctx: &Context, args: &[String]) -> Result<Value, TemplateError> {
        let base = match args.get(1).map(|s| s.trim()).filter(|s| !s.is_empty()) {
            Some(date) => parse_date(date)
                .ok_or_else(|| failed(self.name(), format!("invalid date '{}'", date)))?,
            None => Utc::now(),
        };
        shift_time(self.name(), base, args.first(), args.get(2))
    }
}

fn shift_time(
    name: &str,
    mut time: DateTime<Utc>,
    format: Option<&String>,
    offset: Option<&String>,
) -> Result<Value, TemplateError> {
    if let Some(offset) = offset.map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let delta = parse_iso_duration(offset)
            .ok_or_else(|| failed(name, format!("invalid duration '{}'", offset)))?;
        time = time
            .checked_add_signed(delta)
            .ok_or_else(|| failed(name, "timestamp out of range"))?;
    }

    let format = format.map(|s| s.trim()).unwrap_or_default();
    if format.is_empty() {
        return Ok(Value::from(time.timestamp_millis()));
    }

    let pattern = if format.contains('%') {
        format.to_string()
    } else {
        translate_pattern(format)
    };
    if StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
        return Err(failed(name, format!("invalid format '{}'", format)));
    }
    Ok(Value::String(time.format(&pattern).to_string()))
}

fn parse_date(input: &str) -> Option<DateTime<Utc>> {
    if input.bytes().all(|b| b.is_ascii_digit()) {
        return DateTime::from_timestamp_millis(input.parse().ok()?);
    }
    if let Ok(time) = DateTime::parse_from_rfc3339(input) {
        return Some(time.with_timezone(&Utc));
    }
    if let Ok(time) = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S") {
        return Some(time.and_utc());
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|time| time.and_utc())
}

fn translate_pattern(pattern: &str) -> String {
    [
        ("yyyy", "%Y"),
        ("MM", "%m"),
        ("dd", "%d"),
        ("HH", "%H"),
        ("mm", "%M"),
        ("ss", "%S"),
        ("SSS", "%3f"),
    ]
    .iter()
    .fold(pattern.to_string(), |acc, (from, to)| acc.replace(from, to))
}

/// Parse `[-]PnW`, `[-]PnDTnHnMnS` style durations. Years and months are
/// rejected since they have no fixed length.
pub fn parse_iso_duration(input: &str) -> Option<TimeDelta> {
    let (negative, rest) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input.strip_prefix('+').unwrap_or(input)),
    };
    let rest = rest.strip_prefix('P').or_else(|| rest.strip_prefix('p'))?;
    if rest.is_empty() {
        return None;
    }

    let mut seconds: i64 = 0;
    let mut in_time = false;
    let mut number = String::new();
    let mut seen_unit = false;

    for ch in rest.chars() {
        match ch.to_ascii_uppercase() {
            'T' if !in_time && number.is_empty() => in_time = true,
            c if c.is_ascii_digit() => number.push(c),
            unit => {
                let value: i64 = number.parse().ok()?;
                number.clear();
                let factor = match (unit, in_time) {
                    ('W', false) => 7 * 86_400,
                    ('D', false) => 86_400,
                    ('H', true) => 3_600,
                    ('M', true) => 60,
                    ('S', true) => 1,
                    _ => return None,
                };
                seconds = seconds.checked_add(value.checked_mul(factor)?)?;
                seen_unit = true;
            }
        }
    }

    if !number.is_empty() || !seen_unit {
        return None;
    }
    let delta = TimeDelta::try_seconds(seconds)?;
    Some(if negative { -delta } else { delta })
}

/// `${property(name)}` or `${property(name, default)}`, read from the process
/// environment
pub struct Property;

impl TemplateFunction for Property {
    fn name(&self) -> &str {
        "property"
    }

    fn call(&self, _ctx: &Context, args: &[String]) -> Result<Value, TemplateError> {
        let key = required_arg(self.name(), args, 0)?;
        match std::env::var(key) {
            Ok(value) => Ok(Value::String(value)),
            Err(_) => args
                .get(1)
                .map(|default| Value::String(default.clone()))
                .ok_or_else(|| failed(self.name(), format!("property '{}' is not set", key))),
        }
    }
}

/// `${uuid()}`, a random v4 UUID
pub struct UuidFn;

impl TemplateFunction for UuidFn {
    fn name(&self) -> &str {
        "uuid"
    }

    fn call(&self, _ctx: &Context, _args: &[String]) -> Result<Value, TemplateError> {
        Ok(Value::String(Uuid::new_v4().to_string()))
    }
}

/// `${url_encode(text)}`, form encoding: spaces become `+`
pub struct UrlEncode;

impl TemplateFunction for UrlEncode {
    fn name(&self) -> &str {
        "url_encode"
    }

    fn call(&self, _ctx: &Context, args: &[String]) -> Result<Value, TemplateError> {
        let input = required_arg(self.name(), args, 0)?;
        Ok(Value::String(form_urlencoded::byte_serialize(input.as_bytes()).collect()))
    }
}

/// `${url_decode(text)}`, the inverse of `url_encode`
pub struct UrlDecode;

impl TemplateFunction for UrlDecode {
    fn name(&self) -> &str {
        "url_decode"
    }

    fn call(&self, _ctx: &Context, args: &[String]) -> Result<Value, TemplateError> {
        let input = required_arg(self.name(), args, 0)?;
        let mut bytes = Vec::with_capacity(input.len());
        let mut rest = input.as_bytes();
        while let Some((&b, tail)) = rest.split_first() {
            match b {
                b'+' => bytes.push(b' '),
                b'%' => {
                    let hex = tail
                        .get(..2)
                        .filter(|h| h.iter().all(u8::is_ascii_hexdigit))
                        .and_then(|h| std::str::from_utf8(h).ok())
                        .and_then(|h| u8::from_str_radix(h, 16).ok())
                        .ok_or_else(|| failed(self.name(), format!("invalid escape in '{}'", input)))?;
                    bytes.push(hex);
                    rest = &tail[2..];
                    continue;
                }
                other => bytes.push(other),
            }
            rest = tail;
        }
        let text = String::from_utf8(bytes).map_err(|e| failed(self.name(), e.to_string()))?;
        Ok(Value::String(text))
    }
}

/// `${random()}`, `${random(max)}` or `${random(min, max)}`: an integer in
/// the inclusive range, `0..=i32::MAX` by default
pub struct Random;

impl TemplateFunction for Random {
    fn name(&self) -> &str {
        "random"
    }

    fn call(&self, _ctx: &Context, args: &[String]) -> Result<Value, TemplateError> {
        let bound = |index: usize| -> Result<Option<i64>, TemplateError> {
            match args.get(index).map(|s| s.trim()).filter(|s| !s.is_empty()) {
                Some(text) => text
                    .parse()
                    .map(Some)
                    .map_err(|_| failed(self.name(), format!("'{}' is not an integer", text))),
                None => Ok(None),
            }
        };
        let (min, max) = match (bound(0)?, bound(1)?) {
            (Some(min), Some(max)) => (min, max),
            (Some(max), None) => (0, max),
            (None, Some(max)) => (0, max),
            (None, None) => (0, i64::from(i32::MAX)),
        };
        if min > max {
            return Err(failed(self.name(), format!("min {} is greater than max {}", min, max)));
        }
        Ok(Value::from(rand::thread_rng().gen_range(min..=max)))
    }
}

/// `${random_string(length)}` or `${random_string(length, chars)}`.
/// Alphanumeric unless `chars` lists the characters to draw from.
pub struct RandomString;

impl TemplateFunction for RandomString {
    fn name(&self) -> &str {
        "random_string"
    }

    fn call(&self, _ctx: &Context, args: &[String]) -> Result<Value, TemplateError> {
        let raw = required_arg(self.name(), args, 0)?.trim();
        let length: usize = raw
            .parse()
            .map_err(|_| failed(self.name(), format!("invalid length '{}'", raw)))?;

        let mut rng = rand::thread_rng();
        let text = match args.get(1).filter(|chars| !chars.is_empty()) {
            Some(chars) => {
                let pool: Vec<char> = chars.chars().collect();
                (0..length)
                    .filter_map(|_| pool.choose(&mut rng).copied())
                    .collect()
            }
            None => Alphanumeric.sample_string(&mut rng, length),
        };
        Ok(Value::String(text))
    }
}

/// `${json_read(json, path)}`, query a JSON document. Missing paths
/// yield null.
pub struct JsonRead;

impl TemplateFunction for JsonRead {
    fn name(&self) -> &str {
        "json_read"
    }

    fn call(&self, _ctx: &Context, args: &[String]) -> Result<Value, TemplateError> {
        let text = required_arg(self.name(), args, 0)?;
        let path = required_arg(self.name(), args, 1)?;
        let document: Value =
            serde_json::from_str(text).map_err(|e| failed(self.name(), format!("invalid JSON: {}", e)))?;
        let found = crate::json_path::query(&document, path).map_err(|e| failed(self.name(), e.to_string()))?;
        Ok(found.unwrap_or(Value::Null))
    }
}

/// `${digest(algorithm, text)}`, lowercase hex of a SHA-2 digest
/// (`sha224`, `sha256`, `sha384` or `sha512`)
pub struct MessageDigest;

impl TemplateFunction for MessageDigest {
    fn name(&self) -> &str {
        "digest"
    }

    fn call(&self, _ctx: &Context, args: &[String]) -> Result<Value, TemplateError> {
        let algorithm = required_arg(self.name(), args, 0)?;
        let input = required_arg(self.name(), args, 1)?.as_bytes();
        let digest = match algorithm.trim().to_lowercase().replace('-', "").as_str() {
            "sha224" => hex::encode(Sha224::digest(input)),
            "sha256" => hex::encode(Sha256::digest(input)),
            "sha384" => hex::encode(Sha384::digest(input)),
            "sha512" => hex::encode(Sha512::digest(input)),
            other => return Err(failed(self.name(), format!("unsupported algorithm '{}'", other))),
        };
        Ok(Value::String(digest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_base64_functions() {
        let ctx = Context::new();
        let encoded = Base64Encode.call(&ctx, &args(&["ryze:secret"])).unwrap();
        assert_eq!(encoded, Value::String("cnl6ZTpzZWNyZXQ=".to_string()));
        let decoded = Base64Decode.call(&ctx, &args(&["cnl6ZTpzZWNyZXQ="])).unwrap();
        assert_eq!(decoded, Value::String("ryze:secret".to_string()));
        assert!(Base64Decode.call(&ctx, &args(&["***"])).is_err());
        assert!(Base64Encode.call(&ctx, &[]).is_err());
    }

    #[test]
    fn test_iso_durations() {
        assert_eq!(parse_iso_duration("P1D"), TimeDelta::try_days(1));
        assert_eq!(parse_iso_duration("-P7D"), TimeDelta::try_days(7).map(|d| -d));
        assert_eq!(parse_iso_duration("PT1H30M"), TimeDelta::try_minutes(90));
        assert_eq!(parse_iso_duration("P1W"), TimeDelta::try_days(7));
        assert_eq!(parse_iso_duration("P1Y"), None);
        assert_eq!(parse_iso_duration("P"), None);
        assert_eq!(parse_iso_duration("1D"), None);
    }

    #[test]
    fn test_timestamp_formats() {
        let ctx = Context::new();
        let millis = Timestamp.call(&ctx, &[]).unwrap();
        assert!(millis.as_i64().unwrap() > 0);

        let year = Timestamp.call(&ctx, &args(&["yyyy"])).unwrap();
        assert_eq!(year.as_str().unwrap().len(), 4);

        let day = Timestamp.call(&ctx, &args(&["%Y-%m-%d", "P1D"])).unwrap();
        assert_eq!(day.as_str().unwrap().len(), 10);

        assert!(Timestamp.call(&ctx, &args(&["%Q"])).is_err());
        assert!(Timestamp.call(&ctx, &args(&["yyyy", "soon"])).is_err());
    }

    #[test]
    fn test_property_lookup() {
        let ctx = Context::new();
        temp_env::with_var("RYZE_TEST_PROPERTY", Some("on"), || {
            let value = Property.call(&ctx, &args(&["RYZE_TEST_PROPERTY"])).unwrap();
            assert_eq!(value, Value::String("on".to_string()));
        });
        temp_env::with_var_unset("RYZE_TEST_PROPERTY_MISSING", || {
            let value = Property
                .call(&ctx, &args(&["RYZE_TEST_PROPERTY_MISSING", "off"]))
                .unwrap();
            assert_eq!(value, Value::String("off".to_string()));
            assert!(Property
                .call(&ctx, &args(&["RYZE_TEST_PROPERTY_MISSING"]))
                .is_err());
        });
    }

    #[test]
    fn test_time_shift() {
        let ctx = Context::new();
        let shifted = TimeShift
            .call(&ctx, &args(&["yyyy-MM-dd HH:mm", "2024-02-28 23:30:00", "PT1H"]))
            .unwrap();
        assert_eq!(shifted, Value::String("2024-02-29 00:30".to_string()));

        let back = TimeShift.call(&ctx, &args(&["", "1700000000000", "-PT1S"])).unwrap();
        assert_eq!(back, Value::from(1_699_999_999_000_i64));

        let day = TimeShift.call(&ctx, &args(&["%d", "2024-03-01T08:00:00+09:00"])).unwrap();
        assert_eq!(day, Value::String("29".to_string()));

        assert!(TimeShift.call(&ctx, &[]).unwrap().as_i64().unwrap() > 0);
        assert!(TimeShift.call(&ctx, &args(&["", "yesterday"])).is_err());
        assert!(Timestamp.call(&ctx, &args(&["", "", "P1D"])).is_err());
    }

    #[test]
    fn test_uuid() {
        let ctx = Context::new();
        let first = UuidFn.call(&ctx, &[]).unwrap();
        let second = UuidFn.call(&ctx, &[]).unwrap();
        assert_ne!(first, second);
        let parsed = Uuid::parse_str(first.as_str().unwrap()).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn test_url_encoding() {
        let ctx = Context::new();
        let encoded = UrlEncode.call(&ctx, &args(&["a b&c=d/é"])).unwrap();
        assert_eq!(encoded, Value::String("a+b%26c%3Dd%2F%C3%A9".to_string()));
        let decoded = UrlDecode.call(&ctx, &args(&["a+b%26c%3Dd%2F%C3%A9"])).unwrap();
        assert_eq!(decoded, Value::String("a b&c=d/é".to_string()));
        assert!(UrlDecode.call(&ctx, &args(&["100%"])).is_err());
        assert!(UrlDecode.call(&ctx, &args(&["%zz"])).is_err());
    }

    #[test]
    fn test_random() {
        let ctx = Context::new();
        for _ in 0..50 {
            let value = Random.call(&ctx, &args(&["5", "7"])).unwrap().as_i64().unwrap();
            assert!((5..=7).contains(&value));
        }
        assert_eq!(Random.call(&ctx, &args(&["3", "3"])).unwrap(), Value::from(3));
        let below = Random.call(&ctx, &args(&["2"])).unwrap().as_i64().unwrap();
        assert!((0..=2).contains(&below));
        assert!(Random.call(&ctx, &[]).unwrap().as_i64().unwrap() >= 0);
        assert!(Random.call(&ctx, &args(&["9", "1"])).is_err());
        assert!(Random.call(&ctx, &args(&["one"])).is_err());
    }

    #[test]
    fn test_random_string() {
        let ctx = Context::new();
        let text = RandomString.call(&ctx, &args(&["12"])).unwrap();
        let text = text.as_str().unwrap();
        assert_eq!(text.len(), 12);
        assert!(text.chars().all(|c| c.is_ascii_alphanumeric()));

        let binary = RandomString.call(&ctx, &args(&["20", "01"])).unwrap();
        assert!(binary.as_str().unwrap().chars().all(|c| c == '0' || c == '1'));
        assert_eq!(binary.as_str().unwrap().len(), 20);

        assert_eq!(RandomString.call(&ctx, &args(&["0"])).unwrap(), Value::String(String::new()));
        assert!(RandomString.call(&ctx, &args(&["-1"])).is_err());
        assert!(RandomString.call(&ctx, &[]).is_err());
    }

    #[test]
    fn test_json_read() {
        let ctx = Context::new();
        let doc = r#"{"data":{"id":7,"tags":["a","b"]}}"#;
        assert_eq!(JsonRead.call(&ctx, &args(&[doc, "$.data.id"])).unwrap(), Value::from(7));
        assert_eq!(JsonRead.call(&ctx, &args(&[doc, "$.data.tags[-1]"])).unwrap(), Value::from("b"));
        assert_eq!(JsonRead.call(&ctx, &args(&[doc, "$.data.missing"])).unwrap(), Value::Null);
        assert!(JsonRead.call(&ctx, &args(&["{", "$.a"])).is_err());
    }

    #[test]
    fn test_digest() {
        let ctx = Context::new();
        let sha256 = MessageDigest.call(&ctx, &args(&["SHA-256", "abc"])).unwrap();
        assert_eq!(
            sha256,
            Value::String("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad".to_string())
        );
        let sha512 = MessageDigest.call(&ctx, &args(&["sha512", ""])).unwrap();
        assert!(sha512.as_str().unwrap().starts_with("cf83e1357eefb8bd"));
        assert!(MessageDigest.call(&ctx, &args(&["md4", "abc"])).is_err());
    }

    #[test]
    fn test_functions_from_templates() {
        let ctx = Context::new();
        assert_eq!(
            ctx.resolve("${url_encode('x y')}-${digest(sha256, '')}").unwrap(),
            Value::String(
                "x+y-e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855".to_string()
            )
        );
        assert_eq!(ctx.resolve("${json_read('{\"n\":1}', n)}").unwrap(), Value::from(1));
    }

    #[test]
    fn test_registry_names() {
        let registry = FunctionRegistry::with_builtins();
        assert_eq!(
            registry.names(),
            vec![
                "base64_decode",
                "base64_encode",
                "digest",
                "json_read",
                "property",
                "random",
                "random_string",
                "time_shift",
                "timestamp",
                "url_decode",
                "url_encode",
                "uuid",
            ]
        );
    }
}
