//! Pre- and post-processors
//!
//! A processor wraps any [`Node`] with an optional condition and an async
//! flag. Synchronous processors run nested in the parent's scope and their
//! results are attached to the parent. Async processors run on a snapshot
//! of the context; their outcome is reported through the listener only.

use crate::lifecycle::Lifecycle;
use crate::node::{Invocation, Node};
use crate::session::Runtime;
use ryze_core::{Context, ElementKind, FailureKind, SampleResult, TemplateError, TestStatus};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// A node run before or after its parent's request
#[derive(Debug, Clone)]
pub struct Processor {
    node: Arc<dyn Node>,
    condition: Option<String>,
    run_async: bool,
}

impl Processor {
    pub fn new(node: Arc<dyn Node>) -> Self {
        Self {
            node,
            condition: None,
            run_async: false,
        }
    }

    pub fn of(node: impl Node + 'static) -> Self {
        Self::new(Arc::new(node))
    }

    /// Only run when `condition` resolves to a truthy value
    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn run_async(mut self, run_async: bool) -> Self {
        self.run_async = run_async;
        self
    }

    pub fn node(&self) -> &Arc<dyn Node> {
        &self.node
    }

    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    pub fn is_async(&self) -> bool {
        self.run_async
    }

    /// Evaluate the condition; a blank or absent condition always runs
    pub fn should_run(&self, ctx: &Context) -> Result<bool, TemplateError> {
        match self.condition.as_deref().map(str::trim) {
            None | Some("") => Ok(true),
            Some(condition) => ctx.resolve(condition).map(|v| is_truthy(&v)),
        }
    }
}

/// Truthiness of a resolved condition
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.trim(), "1" | "t" | "T" | "true" | "TRUE" | "True"),
        Value::Number(n) => n.as_f64() == Some(1.0),
        _ => false,
    }
}

/// Where processors run relative to the parent's request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Pre,
    Post,
}

impl Stage {
    fn kind(self) -> ElementKind {
        match self {
            Stage::Pre => ElementKind::Preprocessor,
            Stage::Post => ElementKind::Postprocessor,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Stage::Pre => "preprocessor",
            Stage::Post => "postprocessor",
        }
    }
}

/// Run a processor list in order. Returns false when the parent broke and
/// must stop.
pub(crate) async fn run_processors(
    processors: &[Processor],
    stage: Stage,
    runtime: &Arc<Runtime>,
    ctx: &mut Context,
    result: &mut SampleResult,
    lifecycle: &mut Lifecycle,
) -> bool {
    for processor in processors {
        let title = ctx.resolve_display(&processor.node.meta().title);

        match processor.should_run(ctx) {
            Ok(true) => {}
            Ok(false) => {
                debug!("Skipping {} '{}': condition is false", stage.label(), title);
                continue;
            }
            Err(e) => {
                lifecycle.fail(
                    result,
                    FailureKind::Configuration,
                    format!("Condition of {} '{}' failed: {}", stage.label(), title, e),
                );
                return false;
            }
        }

        if processor.run_async {
            dispatch(runtime, Arc::clone(&processor.node), ctx.snapshot(), stage).await;
            continue;
        }

        let child = processor
            .node
            .run(runtime, ctx, Invocation::new(stage.kind()))
            .await;
        let status = child.status;
        result.add_child(child);

        if status == TestStatus::Broken {
            lifecycle.fail(
                result,
                FailureKind::Processor,
                format!("{} '{}' is broken", stage.label(), title),
            );
            return false;
        }
    }
    true
}

/// Run a processor detached from its parent
async fn dispatch(runtime: &Arc<Runtime>, node: Arc<dyn Node>, mut snapshot: Context, stage: Stage) {
    let invocation = Invocation::detached(stage.kind());

    if runtime.settings().async_processors && tokio::runtime::Handle::try_current().is_ok() {
        let rt = Arc::clone(runtime);
        let handle = tokio::spawn(async move {
            let result = node.run(&rt, &mut snapshot, invocation).await;
            report_detached(&result);
            result
        });
        runtime.track(handle).await;
    } else {
        let result = node.run(runtime, &mut snapshot, invocation).await;
        report_detached(&result);
    }
}

fn report_detached(result: &SampleResult) {
    if result.status.is_failure() {
        warn!(
            "Async processor '{}' finished {}; parent is unaffected",
            result.title, result.status
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        for truthy in [json!(true), json!("1"), json!("t"), json!("T"), json!("True"), json!(1), json!(1.0)] {
            assert!(is_truthy(&truthy), "{} should be truthy", truthy);
        }
        for falsy in [json!(false), json!("yes"), json!("0"), json!(2), json!(null), json!([1])] {
            assert!(!is_truthy(&falsy), "{} should be falsy", falsy);
        }
    }
}
