//! Test support: an in-memory protocol and a recording listener

use async_trait::async_trait;
use ryze_core::configure::{
    evaluate_json, evaluate_map, evaluate_string, merge_json, merge_map, merge_option, merge_string,
};
use ryze_core::{
    ConfigureItem, Context, ElementKind, RealRequest, RealResponse, SampleResult, TemplateError, TestStatus,
};
use ryze_interfaces::{ProtocolAdapter, ProtocolError, ReportListener, StepInfo};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

/// Configure item of the stub protocol
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StubConfig {
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Where the request goes; required to build a request
    #[serde(default)]
    pub target: Option<String>,
    /// Status code answered; 200 when unset
    #[serde(default)]
    pub status: Option<u16>,
    /// Body answered, echoed back as the response
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// When set, the request fails in transport with this message
    #[serde(default)]
    pub fail: Option<String>,
}

impl StubConfig {
    pub fn target(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..Default::default()
        }
    }
}

impl ConfigureItem for StubConfig {
    const DEFAULT_REF: &'static str = "__stub_configure_element_default_ref_name__";

    fn ref_name(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    fn merge(&self, other: &Self) -> Self {
        Self {
            reference: merge_string(&self.reference, &other.reference),
            target: merge_string(&self.target, &other.target),
            status: merge_option(&self.status, &other.status),
            body: merge_json(&self.body, &other.body),
            headers: merge_map(&self.headers, &other.headers),
            fail: merge_string(&self.fail, &other.fail),
        }
    }

    fn evaluate(&self, ctx: &Context) -> Result<Self, TemplateError> {
        Ok(Self {
            reference: self.reference.clone(),
            target: evaluate_string(ctx, &self.target)?,
            status: self.status,
            body: evaluate_json(ctx, &self.body)?,
            headers: evaluate_map(ctx, &self.headers)?,
            fail: evaluate_string(ctx, &self.fail)?,
        })
    }
}

/// Request produced by [`StubAdapter`]
#[derive(Debug, Clone, PartialEq)]
pub struct StubRequest {
    pub target: String,
    pub status: u16,
    pub body: Value,
    pub headers: BTreeMap<String, String>,
    pub fail: Option<String>,
}

fn body_text(body: &Value) -> String {
    match body {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Protocol that answers every request with its own body
#[derive(Debug, Default)]
pub struct StubAdapter {
    executed: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl StubAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait before answering
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    /// Targets executed so far, in order
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ProtocolAdapter for StubAdapter {
    type Config = StubConfig;
    type Request = StubRequest;
    type Response = StubRequest;

    fn protocol(&self) -> &'static str {
        "stub"
    }

    fn build(&self, config: &StubConfig) -> Result<StubRequest, ProtocolError> {
        let target = config
            .target
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ProtocolError::Build("target is required".to_string()))?;
        Ok(StubRequest {
            target,
            status: config.status.unwrap_or(200),
            body: config.body.clone().unwrap_or(Value::Null),
            headers: config.headers.clone(),
            fail: config.fail.clone(),
        })
    }

    async fn execute(&self, request: &StubRequest) -> Result<StubRequest, ProtocolError> {
        if let Ok(mut executed) = self.executed.lock() {
            executed.push(request.target.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &request.fail {
            Some(message) => Err(ProtocolError::Transport(message.clone())),
            None => Ok(request.clone()),
        }
    }

    fn format_request(&self, request: &StubRequest) -> RealRequest {
        let body = body_text(&request.body);
        RealRequest::new(format!("STUB {}\n{}", request.target, body), body.len())
    }

    fn format_response(&self, response: StubRequest) -> Result<RealResponse, ProtocolError> {
        let body = body_text(&response.body);
        let mut real = RealResponse::new(body.clone())
            .with_status(response.status)
            .with_format(format!("{}\n{}", response.status, body));
        for (name, value) in response.headers {
            real = real.with_header(name, value);
        }
        Ok(real)
    }
}

/// One listener event
#[derive(Debug, Clone, PartialEq)]
pub enum StepEvent {
    Started {
        title: String,
        kind: ElementKind,
        detached: bool,
    },
    Finished {
        title: String,
        kind: ElementKind,
        detached: bool,
        status: TestStatus,
    },
}

/// Listener that keeps every event for later inspection
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<StepEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StepEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Titles and statuses of finished steps, in completion order
    pub fn finished(&self) -> Vec<(String, TestStatus)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                StepEvent::Finished { title, status, .. } => Some((title, status)),
                StepEvent::Started { .. } => None,
            })
            .collect()
    }

    fn record(&self, event: StepEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl ReportListener for RecordingListener {
    fn on_step_start(&self, step: &StepInfo, _ctx: &Context) {
        self.record(StepEvent::Started {
            title: step.title.clone(),
            kind: step.kind,
            detached: step.detached,
        });
    }

    fn on_step_end(&self, step: &StepInfo, result: &SampleResult) {
        self.record(StepEvent::Finished {
            title: step.title.clone(),
            kind: step.kind,
            detached: step.detached,
            status: result.status,
        });
    }
}
