//! Execution records produced by every element run

use crate::types::{ElementId, ElementKind, Phase, TestStatus};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Protocol request as shown to reports
#[derive(Debug, Clone, Default, Serialize)]
pub struct RealRequest {
    /// Human readable rendering of the request
    pub format: String,
    /// Size of the request payload in bytes
    pub size: usize,
}

impl RealRequest {
    pub fn new(format: impl Into<String>, size: usize) -> Self {
        Self {
            format: format.into(),
            size,
        }
    }
}

impl fmt::Display for RealRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format)
    }
}

/// Protocol response in the uniform shape read by extractors and assertions
#[derive(Debug, Clone, Default, Serialize)]
pub struct RealResponse {
    /// Protocol status code, when the protocol has one
    pub status: Option<u16>,
    pub headers: BTreeMap<String, String>,
    #[serde(serialize_with = "serialize_body")]
    pub body: Vec<u8>,
    /// Human readable rendering of the response
    pub format: String,
}

fn serialize_body<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(body))
}

impl RealResponse {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn size(&self) -> usize {
        self.body.len()
    }

    /// Body decoded as UTF-8, invalid sequences replaced
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Body parsed as JSON, if it is JSON
    pub fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for RealResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.format.is_empty() {
            f.write_str(&self.body_text())
        } else {
            f.write_str(&self.format)
        }
    }
}

/// Category of a captured failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Invalid definition, unresolvable reference or template
    Configuration,
    /// Protocol adapter failed to build, send or read
    Execution,
    /// A synchronous processor broke
    Processor,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Configuration => "configuration",
            FailureKind::Execution => "execution",
            FailureKind::Processor => "processor",
        };
        f.write_str(s)
    }
}

/// Failure captured on a broken result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

/// Outcome of one assertion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssertionOutcome {
    pub description: String,
    pub passed: bool,
    pub actual: Value,
    pub expected: Value,
    pub message: String,
}

impl AssertionOutcome {
    pub fn pass(description: impl Into<String>, actual: Value, expected: Value) -> Self {
        Self {
            description: description.into(),
            passed: true,
            actual,
            expected,
            message: String::new(),
        }
    }

    pub fn fail(
        description: impl Into<String>,
        actual: Value,
        expected: Value,
        message: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            passed: false,
            actual,
            expected,
            message: message.into(),
        }
    }
}

/// One element execution record
#[derive(Debug, Clone, Serialize)]
pub struct SampleResult {
    pub id: ElementId,
    pub title: String,
    pub kind: ElementKind,
    pub status: TestStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Wall-clock time spent in the protocol call
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    pub request: Option<RealRequest>,
    pub response: Option<RealResponse>,
    pub failure: Option<Failure>,
    pub assertions: Vec<AssertionOutcome>,
    /// Variables written by this element's extractors
    pub extracted: Vec<String>,
    /// Lifecycle phases traversed, in order
    pub phases: Vec<Phase>,
    pub children: Vec<SampleResult>,
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

impl SampleResult {
    pub fn new(id: ElementId, title: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            id,
            title: title.into(),
            kind,
            status: TestStatus::Passed,
            start_time: Utc::now(),
            end_time: None,
            elapsed: Duration::ZERO,
            request: None,
            response: None,
            failure: None,
            assertions: Vec::new(),
            extracted: Vec::new(),
            phases: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Result of an element that never ran
    pub fn skipped(id: ElementId, title: impl Into<String>, kind: ElementKind) -> Self {
        let mut result = Self::new(id, title, kind);
        result.status = TestStatus::Skipped;
        result.finish();
        result
    }

    /// Mark the result broken and capture the failure
    pub fn break_with(&mut self, kind: FailureKind, message: impl Into<String>) {
        self.status = TestStatus::Broken;
        self.failure = Some(Failure {
            kind,
            message: message.into(),
        });
    }

    /// Demote the status, keeping the worst
    pub fn demote(&mut self, status: TestStatus) {
        self.status = self.status.worst(status);
    }

    /// Record an assertion outcome; a failing one demotes to failed
    pub fn add_assertion(&mut self, outcome: AssertionOutcome) {
        if !outcome.passed {
            self.demote(TestStatus::Failed);
        }
        self.assertions.push(outcome);
    }

    /// Attach a child result, demoting this result when the child failed
    pub fn add_child(&mut self, child: SampleResult) {
        if child.status.is_failure() {
            self.demote(child.status);
        }
        self.children.push(child);
    }

    pub fn finish(&mut self) {
        self.end_time = Some(Utc::now());
    }

    pub fn is_passed(&self) -> bool {
        self.status == TestStatus::Passed
    }

    pub fn is_broken(&self) -> bool {
        self.status == TestStatus::Broken
    }

    pub fn failed_assertions(&self) -> impl Iterator<Item = &AssertionOutcome> {
        self.assertions.iter().filter(|a| !a.passed)
    }

    /// Find a direct or nested child by title
    pub fn find(&self, title: &str) -> Option<&SampleResult> {
        self.children.iter().find_map(|child| {
            if child.title == title {
                Some(child)
            } else {
                child.find(title)
            }
        })
    }

    /// Elapsed time as `0.25 s`
    pub fn duration_display(&self) -> String {
        format!("{:.2} s", self.elapsed.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_helpers() {
        let response = RealResponse::new(r#"{"data":{"id":1}}"#)
            .with_status(200)
            .with_header("Content-Type", "application/json");
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.json().unwrap()["data"]["id"], json!(1));
        assert_eq!(response.size(), 17);
        assert_eq!(response.to_string(), r#"{"data":{"id":1}}"#);
    }

    #[test]
    fn test_assertions_demote_to_failed() {
        let mut result = SampleResult::new(ElementId::new(), "t", ElementKind::Sampler);
        result.add_assertion(AssertionOutcome::pass("a", json!(1), json!(1)));
        assert!(result.is_passed());
        result.add_assertion(AssertionOutcome::fail("b", json!(1), json!(2), "1 != 2"));
        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.failed_assertions().count(), 1);
    }

    #[test]
    fn test_broken_child_demotes_parent() {
        let mut parent = SampleResult::new(ElementId::new(), "suite", ElementKind::Suite);
        let mut child = SampleResult::new(ElementId::new(), "child", ElementKind::Sampler);
        child.break_with(FailureKind::Execution, "connection refused");
        parent.add_child(SampleResult::skipped(ElementId::new(), "off", ElementKind::Sampler));
        assert!(parent.is_passed());
        parent.add_child(child);
        assert!(parent.is_broken());
        assert!(parent.find("child").is_some());
    }

    #[test]
    fn test_serialize_result() {
        let mut result = SampleResult::new(ElementId::new(), "t", ElementKind::Sampler);
        result.elapsed = Duration::from_millis(250);
        result.response = Some(RealResponse::new("ok"));
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["elapsed"], json!(250));
        assert_eq!(value["response"]["body"], json!("ok"));
        assert_eq!(value["status"], json!("passed"));
        assert_eq!(result.duration_display(), "0.25 s");
    }
}
