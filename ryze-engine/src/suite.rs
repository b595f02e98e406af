//! Suites: ordered groups of elements sharing a scope

use crate::configure_element::ConfigureNode;
use crate::lifecycle::Lifecycle;
use crate::node::{ElementMeta, Invocation, Node};
use crate::processor::{run_processors, Processor, Stage};
use crate::session::Runtime;
use async_trait::async_trait;
use ryze_core::{Context, ElementKind, FailureKind, Phase, SampleResult};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Runs its children strictly in declaration order
///
/// Order within one run: suite variables, configure elements,
/// preprocessors, children, postprocessors. A failing child never stops its
/// siblings; the suite takes the worst status among them.
#[derive(Debug)]
pub struct Suite {
    pub(crate) meta: ElementMeta,
    /// Declaration order is resolution order
    pub(crate) variables: Vec<(String, Value)>,
    pub(crate) configure_elements: Vec<Arc<dyn ConfigureNode>>,
    pub(crate) preprocessors: Vec<Processor>,
    pub(crate) children: Vec<Arc<dyn Node>>,
    pub(crate) postprocessors: Vec<Processor>,
}

impl Suite {
    pub fn children(&self) -> &[Arc<dyn Node>] {
        &self.children
    }

    async fn execute(
        &self,
        runtime: &Arc<Runtime>,
        ctx: &mut Context,
        result: &mut SampleResult,
        lifecycle: &mut Lifecycle,
    ) {
        for (name, value) in &self.variables {
            match ctx.resolve_value(value) {
                Ok(resolved) => ctx.put(name.clone(), resolved),
                Err(e) => {
                    lifecycle.fail(
                        result,
                        FailureKind::Configuration,
                        format!("Suite variable '{}': {}", name, e),
                    );
                    return;
                }
            }
        }
        for element in &self.configure_elements {
            element.register(ctx);
        }

        lifecycle.advance(Phase::PreProcess, result);
        if !run_processors(&self.preprocessors, Stage::Pre, runtime, ctx, result, lifecycle).await {
            return;
        }

        lifecycle.advance(Phase::Execute, result);
        for child in &self.children {
            let child_result = child.run(runtime, ctx, Invocation::new(child.kind())).await;
            debug!(
                "Suite child '{}' finished {}",
                child_result.title, child_result.status
            );
            result.add_child(child_result);
        }

        lifecycle.advance(Phase::PostProcess, result);
        run_processors(&self.postprocessors, Stage::Post, runtime, ctx, result, lifecycle).await;
    }
}

#[async_trait]
impl Node for Suite {
    fn meta(&self) -> &ElementMeta {
        &self.meta
    }

    fn kind(&self) -> ElementKind {
        ElementKind::Suite
    }

    async fn run(&self, runtime: &Arc<Runtime>, ctx: &mut Context, invocation: Invocation) -> SampleResult {
        let title = ctx.resolve_display(&self.meta.title);
        if self.meta.disabled {
            debug!("Suite '{}' is disabled", title);
            return SampleResult::skipped(self.meta.id, title, invocation.kind);
        }

        let mut scope = ctx.scope(title.clone());
        let step = invocation.step(&self.meta, &title, scope.depth());
        runtime.listener().on_step_start(&step, &scope);

        let mut result = SampleResult::new(self.meta.id, title.clone(), invocation.kind);
        let mut lifecycle = Lifecycle::start(title.as_str(), &mut result);
        let started = Instant::now();

        self.execute(runtime, &mut scope, &mut result, &mut lifecycle).await;
        drop(scope);

        if !lifecycle.is_errored() {
            lifecycle.advance(Phase::Done, &mut result);
        }
        result.elapsed = started.elapsed();
        result.finish();

        info!(
            status = %result.status,
            children = result.children.len(),
            "Suite '{}' completed in {}",
            title,
            result.duration_display()
        );
        runtime.listener().on_step_end(&step, &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::{Assertion, Rule};
    use crate::extractor::Extractor;
    use crate::sampler::Sampler;
    use crate::session::Session;
    use crate::testing::{RecordingListener, StubAdapter};
    use ryze_core::TestStatus;
    use serde_json::json;

    fn sampler(adapter: &Arc<StubAdapter>, title: &str, target: &str) -> crate::builder::SamplerBuilder<StubAdapter> {
        let target = target.to_string();
        Sampler::builder(Arc::clone(adapter))
            .title(title)
            .config(move |c| c.target = Some(target))
    }

    #[tokio::test]
    async fn test_children_run_in_order_and_siblings_continue() {
        let adapter = Arc::new(StubAdapter::new());
        let listener = Arc::new(RecordingListener::new());
        let suite = Suite::builder("ordered")
            .child(sampler(&adapter, "first", "/1").build())
            .child(
                sampler(&adapter, "second", "/2")
                    .assertion(Assertion::status(Rule::Equals, 500))
                    .build(),
            )
            .child(sampler(&adapter, "third", "/3").build())
            .build();

        let mut session = Session::builder().listener(listener.clone()).build();
        let result = session.run(&suite).await;

        assert_eq!(adapter.executed(), vec!["/1", "/2", "/3"]);
        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.children.len(), 3);
        assert_eq!(
            listener.finished(),
            vec![
                ("first".to_string(), TestStatus::Passed),
                ("second".to_string(), TestStatus::Failed),
                ("third".to_string(), TestStatus::Passed),
                ("ordered".to_string(), TestStatus::Failed),
            ]
        );
    }

    #[tokio::test]
    async fn test_broken_child_makes_suite_broken() {
        let adapter = Arc::new(StubAdapter::new());
        let suite = Suite::builder("worst wins")
            .child(
                sampler(&adapter, "failing", "/f")
                    .assertion(Assertion::status(Rule::Equals, 500))
                    .build(),
            )
            .child(
                sampler(&adapter, "broken", "/b")
                    .config(|c| c.fail = Some("refused".to_string()))
                    .build(),
            )
            .build();

        let result = Session::new().run(&suite).await;
        assert_eq!(result.status, TestStatus::Broken);
        assert!(result.failure.is_none());
    }

    #[tokio::test]
    async fn test_suite_scope_is_shared_by_children_and_dropped_after() {
        let adapter = Arc::new(StubAdapter::new());
        let suite = Suite::builder("users ${env}")
            .variable("name", "alice")
            .variable("greeting", "hello ${name}")
            .child(
                sampler(&adapter, "create", "/user")
                    .config(|c| c.body = Some(json!({"data": {"id": 11, "name": "${name}"}})))
                    .extractor(Extractor::json("id", "$.data.id"))
                    .build(),
            )
            .child(
                sampler(&adapter, "read ${id}", "/user/${id}")
                    .assertion(Assertion::variable("greeting", Rule::Equals, "hello alice"))
                    .build(),
            )
            .build();

        let mut session = Session::builder().variable("env", "qa").build();
        let result = session.run(&suite).await;

        assert_eq!(result.status, TestStatus::Passed, "{:?}", result);
        assert_eq!(result.title, "users qa");
        assert_eq!(adapter.executed(), vec!["/user", "/user/11"]);
        assert!(result.find("read 11").is_some());
        assert!(!session.context().contains("id"));
        assert!(!session.context().contains("name"));
        assert_eq!(session.context().depth(), 1);
    }

    #[tokio::test]
    async fn test_unresolved_suite_variable_breaks_suite() {
        let adapter = Arc::new(StubAdapter::new());
        let suite = Suite::builder("bad vars")
            .variable("url", "${base_url}/x")
            .child(sampler(&adapter, "never", "/never").build())
            .build();

        let result = Session::new().run(&suite).await;
        assert!(result.is_broken());
        assert!(result.children.is_empty());
        assert!(adapter.executed().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_child_is_skipped() {
        let adapter = Arc::new(StubAdapter::new());
        let suite = Suite::builder("partial")
            .child(sampler(&adapter, "off", "/off").disabled(true).build())
            .child(sampler(&adapter, "on", "/on").build())
            .build();

        let result = Session::new().run(&suite).await;
        assert_eq!(result.status, TestStatus::Passed);
        assert_eq!(result.children[0].status, TestStatus::Skipped);
        assert_eq!(adapter.executed(), vec!["/on"]);
    }
}
