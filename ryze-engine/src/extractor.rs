//! Extractors: pull a value out of a result into a variable

use regex::Regex;
use ryze_core::{json_path, Context, ExtractionError, RealResponse, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

fn default_group() -> usize {
    1
}

/// Declarative extraction rule
///
/// Expressions may contain `${...}` placeholders; they are resolved against
/// the context right before extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Extractor {
    /// JSON path into the response body
    #[serde(alias = "jsonpath", alias = "json_path")]
    Json {
        #[serde(alias = "refName")]
        ref_name: String,
        #[serde(alias = "field", alias = "expression")]
        path: String,
        #[serde(default, alias = "defaultValue", skip_serializing_if = "Option::is_none")]
        default_value: Option<Value>,
    },

    /// Regular expression over the response body
    Regex {
        #[serde(alias = "refName")]
        ref_name: String,
        #[serde(alias = "field", alias = "expression")]
        pattern: String,
        /// Capture group to read; 0 is the whole match
        #[serde(default = "default_group")]
        group: usize,
        /// Which match to read, counting from 0
        #[serde(default, alias = "matchNum")]
        match_num: usize,
        #[serde(default, alias = "defaultValue", skip_serializing_if = "Option::is_none")]
        default_value: Option<Value>,
    },

    /// The whole response body as text
    Result {
        #[serde(alias = "refName")]
        ref_name: String,
    },

    /// A response header, matched case-insensitively
    Header {
        #[serde(alias = "refName")]
        ref_name: String,
        #[serde(alias = "field")]
        name: String,
        #[serde(default, alias = "defaultValue", skip_serializing_if = "Option::is_none")]
        default_value: Option<Value>,
    },
}

impl Extractor {
    pub fn json(ref_name: impl Into<String>, path: impl Into<String>) -> Self {
        Extractor::Json {
            ref_name: ref_name.into(),
            path: path.into(),
            default_value: None,
        }
    }

    pub fn regex(ref_name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Extractor::Regex {
            ref_name: ref_name.into(),
            pattern: pattern.into(),
            group: default_group(),
            match_num: 0,
            default_value: None,
        }
    }

    pub fn result(ref_name: impl Into<String>) -> Self {
        Extractor::Result {
            ref_name: ref_name.into(),
        }
    }

    pub fn header(ref_name: impl Into<String>, name: impl Into<String>) -> Self {
        Extractor::Header {
            ref_name: ref_name.into(),
            name: name.into(),
            default_value: None,
        }
    }

    /// Value stored when extraction fails; ignored by `result` extractors
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        match &mut self {
            Extractor::Json { default_value, .. }
            | Extractor::Regex { default_value, .. }
            | Extractor::Header { default_value, .. } => *default_value = Some(value.into()),
            Extractor::Result { .. } => {}
        }
        self
    }

    pub fn ref_name(&self) -> &str {
        match self {
            Extractor::Json { ref_name, .. }
            | Extractor::Regex { ref_name, .. }
            | Extractor::Result { ref_name }
            | Extractor::Header { ref_name, .. } => ref_name,
        }
    }

    pub fn default_value(&self) -> Option<&Value> {
        match self {
            Extractor::Json { default_value, .. }
            | Extractor::Regex { default_value, .. }
            | Extractor::Header { default_value, .. } => default_value.as_ref(),
            Extractor::Result { .. } => None,
        }
    }

    /// Check the definition before any request is made
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.ref_name().trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing("ref_name".to_string()));
        }
        match self {
            Extractor::Json { path, .. } if path.trim().is_empty() => {
                Err(ValidationError::RequiredFieldMissing("path".to_string()))
            }
            Extractor::Header { name, .. } if name.trim().is_empty() => {
                Err(ValidationError::RequiredFieldMissing("name".to_string()))
            }
            Extractor::Regex { pattern, .. } => {
                if pattern.is_empty() {
                    return Err(ValidationError::RequiredFieldMissing("pattern".to_string()));
                }
                if ryze_core::template::contains_placeholder(pattern) {
                    return Ok(());
                }
                Regex::new(pattern).map(|_| ()).map_err(|e| ValidationError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Run the extraction against a response
    pub fn extract(&self, response: Option<&RealResponse>, ctx: &Context) -> Result<Value, ExtractionError> {
        let response = response.ok_or(ExtractionError::NoResponse)?;

        match self {
            Extractor::Json { path, .. } => {
                let path = resolve_expression(ctx, path)?;
                let body = response.json().ok_or(ExtractionError::NotJson)?;
                json_path::query(&body, &path)?.ok_or(ExtractionError::PathNotFound { path })
            }
            Extractor::Regex {
                pattern,
                group,
                match_num,
                ..
            } => {
                let pattern = resolve_expression(ctx, pattern)?;
                let regex = Regex::new(&pattern)
                    .map_err(|e| ExtractionError::InvalidExpression(e.to_string()))?;
                let body = response.body_text();
                let result = regex
                    .captures_iter(&body)
                    .nth(*match_num)
                    .and_then(|captures| captures.get(*group))
                    .map(|m| Value::String(m.as_str().to_string()))
                    .ok_or(ExtractionError::NoMatch { pattern });
                result
            }
            Extractor::Result { .. } => Ok(Value::String(response.body_text().into_owned())),
            Extractor::Header { name, .. } => {
                let name = resolve_expression(ctx, name)?;
                response
                    .header(&name)
                    .map(|v| Value::String(v.to_string()))
                    .ok_or(ExtractionError::MissingHeader(name))
            }
        }
    }

    /// Extract, falling back to the default value. `None` leaves the
    /// variable unset.
    pub fn extract_or_default(&self, response: Option<&RealResponse>, ctx: &Context) -> Option<Value> {
        match self.extract(response, ctx) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Extractor for '{}' failed: {}", self.ref_name(), e);
                self.default_value().cloned()
            }
        }
    }
}

fn resolve_expression(ctx: &Context, expression: &str) -> Result<String, ExtractionError> {
    ctx.resolve_string(expression)
        .map_err(|e| ExtractionError::InvalidExpression(e.to_string()))
}
