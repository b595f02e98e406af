//! Assertions: rules checked against a result after extraction
//!
//! Every assertion of a sampler is evaluated, even after one fails, so a
//! report always lists the complete set of outcomes.

use crate::comparator;
use regex::Regex;
use ryze_core::template::contains_placeholder;
use ryze_core::{json_path, AssertionOutcome, Context, RealResponse, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Comparison rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Rule {
    /// Loose equality, also spelled `===`
    Equals,
    NotEquals,
    /// Strict equality, no type coercion
    Same,
    Contains,
    NotContains,
    Regex,
    Greater,
    GreaterOrEquals,
    Less,
    LessOrEquals,
    IsEmpty,
    IsNotEmpty,
    AnyEquals,
    AnyContains,
}

impl Rule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rule::Equals => "==",
            Rule::NotEquals => "!=",
            Rule::Same => "same",
            Rule::Contains => "contains",
            Rule::NotContains => "not_contains",
            Rule::Regex => "regex",
            Rule::Greater => ">",
            Rule::GreaterOrEquals => ">=",
            Rule::Less => "<",
            Rule::LessOrEquals => "<=",
            Rule::IsEmpty => "is_empty",
            Rule::IsNotEmpty => "is_not_empty",
            Rule::AnyEquals => "any_equals",
            Rule::AnyContains => "any_contains",
        }
    }

    /// Rules that ignore the expected value
    pub fn is_unary(&self) -> bool {
        matches!(self, Rule::IsEmpty | Rule::IsNotEmpty)
    }
}

impl FromStr for Rule {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rule = match s.trim().to_lowercase().as_str() {
            "==" | "=" | "===" | "eq" | "qe" | "is" | "equal" | "equals" | "等于" | "相等" | "equalsmatcher" => {
                Rule::Equals
            }
            "!=" | "<>" | "ne" | "neq" | "not" | "is_not" | "not_equal" | "not_equals" | "notequals" | "不等于"
            | "notequalsmatcher" => Rule::NotEquals,
            "same" | "object" | "same_object" | "sameobjectmatcher" => Rule::Same,
            "contains" | "contain" | "ct" | "包含" | "⊆" | "containsmatcher" => Rule::Contains,
            "not_contains" | "not_contain" | "notcontains" | "!contains" | "nct" | "不包含" | "⊈"
            | "notcontainsmatcher" => Rule::NotContains,
            "regex" | "rx" | "match" | "matches" | "正则" | "正则表达式" | "regexmatcher" => Rule::Regex,
            ">" | "gt" | "greater" | "greater_than" | "greatermatcher" => Rule::Greater,
            ">=" | "ge" | "gte" | "greater_or_equals" | "greater_than_or_equals" | "大于等于"
            | "greaterorequalsmatcher" => Rule::GreaterOrEquals,
            "<" | "lt" | "less" | "less_than" | "小于" | "lessmatcher" => Rule::Less,
            "<=" | "le" | "lte" | "less_or_equals" | "less_than_or_equals" | "小于等于" | "lessorequalsmatcher" => {
                Rule::LessOrEquals
            }
            "is_empty" | "isempty" | "empty" => Rule::IsEmpty,
            "is_not_empty" | "isnotempty" | "not_empty" => Rule::IsNotEmpty,
            "any_equals" | "anyequals" | "equals_any" | "equal_any" | "any_equal" | "eq_any" | "any_eq"
            | "anyequalsmatcher" => Rule::AnyEquals,
            "any_contains" | "anycontains" | "contains_any" | "contain_any" | "anycontainsmatcher" => {
                Rule::AnyContains
            }
            other => return Err(ValidationError::InvalidRule(other.to_string())),
        };
        Ok(rule)
    }
}

impl TryFrom<String> for Rule {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rule> for String {
    fn from(rule: Rule) -> Self {
        rule.as_str().to_string()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the actual value comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Accessor {
    /// Protocol status code
    #[serde(alias = "status_code")]
    Status,
    /// JSON path into the body; a missing path reads as null
    #[serde(alias = "jsonpath", alias = "json_path")]
    Json {
        #[serde(alias = "field", alias = "expression")]
        path: String,
    },
    Header {
        #[serde(alias = "field")]
        name: String,
    },
    /// Whole body as text
    Result,
    /// A context variable or a path below one; unset reads as null
    Variable {
        #[serde(alias = "field")]
        name: String,
    },
}

impl Accessor {
    fn read(&self, response: Option<&RealResponse>, ctx: &Context) -> Result<Value, String> {
        if let Accessor::Variable { name } = self {
            return Ok(ctx.lookup(name).unwrap_or(Value::Null));
        }
        let response = response.ok_or_else(|| "no response available".to_string())?;

        match self {
            Accessor::Status => response
                .status
                .map(Value::from)
                .ok_or_else(|| "response has no status code".to_string()),
            Accessor::Json { path } => {
                let path = ctx.resolve_string(path).map_err(|e| e.to_string())?;
                let body = response
                    .json()
                    .ok_or_else(|| "response body is not JSON".to_string())?;
                json_path::query(&body, &path)
                    .map(|v| v.unwrap_or(Value::Null))
                    .map_err(|e| e.to_string())
            }
            Accessor::Header { name } => {
                let name = ctx.resolve_string(name).map_err(|e| e.to_string())?;
                Ok(response
                    .header(&name)
                    .map(|v| Value::String(v.to_string()))
                    .unwrap_or(Value::Null))
            }
            Accessor::Result => Ok(Value::String(response.body_text().into_owned())),
            Accessor::Variable { .. } => Ok(Value::Null),
        }
    }
}

impl fmt::Display for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accessor::Status => write!(f, "status"),
            Accessor::Json { path } => write!(f, "json {}", path),
            Accessor::Header { name } => write!(f, "header {}", name),
            Accessor::Result => write!(f, "result"),
            Accessor::Variable { name } => write!(f, "variable {}", name),
        }
    }
}

/// One check against a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    #[serde(flatten)]
    pub accessor: Accessor,
    pub rule: Rule,
    #[serde(default)]
    pub expected: Value,
    #[serde(default, alias = "ignoreCase")]
    pub ignore_case: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Assertion {
    pub fn new(accessor: Accessor, rule: Rule, expected: impl Into<Value>) -> Self {
        Self {
            accessor,
            rule,
            expected: expected.into(),
            ignore_case: false,
            description: None,
        }
    }

    pub fn status(rule: Rule, expected: impl Into<Value>) -> Self {
        Self::new(Accessor::Status, rule, expected)
    }

    pub fn json(path: impl Into<String>, rule: Rule, expected: impl Into<Value>) -> Self {
        Self::new(Accessor::Json { path: path.into() }, rule, expected)
    }

    pub fn header(name: impl Into<String>, rule: Rule, expected: impl Into<Value>) -> Self {
        Self::new(Accessor::Header { name: name.into() }, rule, expected)
    }

    pub fn result(rule: Rule, expected: impl Into<Value>) -> Self {
        Self::new(Accessor::Result, rule, expected)
    }

    pub fn variable(name: impl Into<String>, rule: Rule, expected: impl Into<Value>) -> Self {
        Self::new(Accessor::Variable { name: name.into() }, rule, expected)
    }

    pub fn ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.accessor {
            Accessor::Json { path } if path.trim().is_empty() => {
                return Err(ValidationError::RequiredFieldMissing("path".to_string()));
            }
            Accessor::Header { name } | Accessor::Variable { name } if name.trim().is_empty() => {
                return Err(ValidationError::RequiredFieldMissing("name".to_string()));
            }
            _ => {}
        }

        if self.rule == Rule::Regex {
            let pattern = match &self.expected {
                Value::String(s) => s.as_str(),
                Value::Null => return Err(ValidationError::RequiredFieldMissing("expected".to_string())),
                _ => return Ok(()),
            };
            if !contains_placeholder(pattern) {
                Regex::new(pattern).map_err(|e| ValidationError::InvalidPattern {
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                })?;
            }
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.description.clone().unwrap_or_else(|| {
            if self.rule.is_unary() {
                format!("{} {}", self.accessor, self.rule)
            } else {
                format!("{} {} {}", self.accessor, self.rule, self.expected)
            }
        })
    }

    /// Evaluate against a response and the current context. Never panics
    /// and never short-circuits: problems become a failed outcome.
    pub fn evaluate(&self, response: Option<&RealResponse>, ctx: &Context) -> AssertionOutcome {
        let description = self.describe();

        let expected = match ctx.resolve_value(&self.expected) {
            Ok(expected) => expected,
            Err(e) => {
                return AssertionOutcome::fail(
                    description,
                    Value::Null,
                    self.expected.clone(),
                    format!("Cannot resolve expected value: {}", e),
                )
            }
        };

        let actual = match self.accessor.read(response, ctx) {
            Ok(actual) => actual,
            Err(message) => {
                return AssertionOutcome::fail(
                    description,
                    Value::Null,
                    expected,
                    format!("Cannot read {}: {}", self.accessor, message),
                )
            }
        };

        match comparator::apply(self.rule, &actual, &expected, self.ignore_case) {
            Ok(true) => AssertionOutcome::pass(description, actual, expected),
            Ok(false) => {
                let message = format!(
                    "Expected {} {} {}, got {}",
                    self.accessor, self.rule, expected, actual
                );
                AssertionOutcome::fail(description, actual, expected, message)
            }
            Err(message) => AssertionOutcome::fail(description, actual, expected, message),
        }
    }
}
