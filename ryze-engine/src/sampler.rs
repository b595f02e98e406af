//! Protocol samplers and their lifecycle
//!
//! ```text
//! INIT -> PRE_PROCESS -> BUILD_REQUEST -> EXECUTE -> BUILD_RESPONSE
//!      -> POST_PROCESS -> EXTRACT -> VALIDATE -> DONE
//! ```
//!
//! Any phase may jump to `ERROR`; the remaining phases are then skipped and
//! the result is marked broken with the captured failure.

use crate::assertion::Assertion;
use crate::configure_element::ConfigureNode;
use crate::extractor::Extractor;
use crate::lifecycle::Lifecycle;
use crate::node::{ElementMeta, Invocation, Node};
use crate::processor::{run_processors, Processor, Stage};
use crate::session::Runtime;
use async_trait::async_trait;
use ryze_config::MissingRefPolicy;
use ryze_core::{
    ConfigureError, ConfigureItem, Context, ElementKind, FailureKind, Phase, RyzeError, SampleResult,
    ValidationError,
};
use ryze_interfaces::ProtocolAdapter;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Sends one protocol request per run
pub struct Sampler<A: ProtocolAdapter> {
    pub(crate) meta: ElementMeta,
    pub(crate) adapter: Arc<A>,
    pub(crate) config: A::Config,
    pub(crate) configure_elements: Vec<Arc<dyn ConfigureNode>>,
    pub(crate) preprocessors: Vec<Processor>,
    pub(crate) postprocessors: Vec<Processor>,
    pub(crate) extractors: Vec<Extractor>,
    pub(crate) assertions: Vec<Assertion>,
}

impl<A: ProtocolAdapter> Sampler<A> {
    /// Local configuration, before any merge
    pub fn config(&self) -> &A::Config {
        &self.config
    }

    pub fn extractors(&self) -> &[Extractor] {
        &self.extractors
    }

    pub fn assertions(&self) -> &[Assertion] {
        &self.assertions
    }

    fn validate(&self) -> Result<(), ValidationError> {
        for extractor in &self.extractors {
            extractor.validate()?;
        }
        for assertion in &self.assertions {
            assertion.validate()?;
        }
        Ok(())
    }

    /// Merge the local configuration over the visible named one, then
    /// resolve its templates
    fn effective_config(&self, runtime: &Runtime, ctx: &Context) -> Result<A::Config, RyzeError> {
        let ref_name = ctx.resolve_string(self.config.effective_ref())?;

        let merged = match ctx.lookup_config::<A::Config>(&ref_name)? {
            Some(named) => {
                debug!("Merging local configuration over '{}'", ref_name);
                self.config.merge(&named)
            }
            None if self.config.has_explicit_ref() => match runtime.settings().missing_ref {
                MissingRefPolicy::Error => return Err(ConfigureError::MissingRef(ref_name).into()),
                MissingRefPolicy::Ignore => {
                    warn!(
                        "Configure element '{}' not found, using local configuration",
                        ref_name
                    );
                    self.config.clone()
                }
            },
            None => self.config.clone(),
        };

        Ok(merged.evaluate(ctx)?)
    }

    async fn sample(
        &self,
        runtime: &Arc<Runtime>,
        ctx: &mut Context,
        owner: usize,
        result: &mut SampleResult,
        lifecycle: &mut Lifecycle,
    ) {
        if let Err(e) = self.validate() {
            lifecycle.fail(result, FailureKind::Configuration, e.to_string());
            return;
        }
        for element in &self.configure_elements {
            element.register(ctx);
        }

        lifecycle.advance(Phase::PreProcess, result);
        if !run_processors(&self.preprocessors, Stage::Pre, runtime, ctx, result, lifecycle).await {
            return;
        }

        lifecycle.advance(Phase::BuildRequest, result);
        let config = match self.effective_config(runtime, ctx) {
            Ok(config) => config,
            Err(e) => {
                lifecycle.fail(result, FailureKind::Configuration, e.to_string());
                return;
            }
        };
        let request = match self.adapter.build(&config) {
            Ok(request) => request,
            Err(e) => {
                let kind = if e.is_build_error() {
                    FailureKind::Configuration
                } else {
                    FailureKind::Execution
                };
                lifecycle.fail(result, kind, e.to_string());
                return;
            }
        };
        result.request = Some(self.adapter.format_request(&request));

        lifecycle.advance(Phase::Execute, result);
        let started = Instant::now();
        let outcome = self.adapter.execute(&request).await;
        result.elapsed = started.elapsed();
        let raw = match outcome {
            Ok(raw) => raw,
            Err(e) => {
                lifecycle.fail(result, FailureKind::Execution, e.to_string());
                return;
            }
        };

        lifecycle.advance(Phase::BuildResponse, result);
        match self.adapter.format_response(raw) {
            Ok(response) => result.response = Some(response),
            Err(e) => {
                lifecycle.fail(result, FailureKind::Execution, e.to_string());
                return;
            }
        }

        lifecycle.advance(Phase::PostProcess, result);
        if !run_processors(&self.postprocessors, Stage::Post, runtime, ctx, result, lifecycle).await {
            return;
        }

        lifecycle.advance(Phase::Extract, result);
        for extractor in &self.extractors {
            let Some(value) = extractor.extract_or_default(result.response.as_ref(), ctx) else {
                continue;
            };
            let name = extractor.ref_name().to_string();
            // Written to the enclosing scope, and mirrored locally so a
            // private variable of the same name cannot shadow it here.
            ctx.put_at(owner, name.clone(), value.clone());
            ctx.put(name.clone(), value);
            result.extracted.push(name);
        }

        lifecycle.advance(Phase::Validate, result);
        for assertion in &self.assertions {
            let outcome = assertion.evaluate(result.response.as_ref(), ctx);
            result.add_assertion(outcome);
        }
    }
}

#[async_trait]
impl<A: ProtocolAdapter> Node for Sampler<A> {
    fn meta(&self) -> &ElementMeta {
        &self.meta
    }

    fn kind(&self) -> ElementKind {
        ElementKind::Sampler
    }

    async fn run(&self, runtime: &Arc<Runtime>, ctx: &mut Context, invocation: Invocation) -> SampleResult {
        let title = ctx.resolve_display(&self.meta.title);
        if self.meta.disabled {
            debug!("Sampler '{}' is disabled", title);
            return SampleResult::skipped(self.meta.id, title, invocation.kind);
        }

        let owner = ctx.current_index();
        let mut scope = ctx.scope(title.clone());
        let step = invocation.step(&self.meta, &title, scope.depth());
        runtime.listener().on_step_start(&step, &scope);

        let mut result = SampleResult::new(self.meta.id, title.clone(), invocation.kind);
        let mut lifecycle = Lifecycle::start(title.as_str(), &mut result);

        self.sample(runtime, &mut scope, owner, &mut result, &mut lifecycle)
            .await;
        drop(scope);

        if !lifecycle.is_errored() {
            lifecycle.advance(Phase::Done, &mut result);
        }
        result.finish();

        info!(
            protocol = self.adapter.protocol(),
            status = %result.status,
            "{} '{}' completed in {}",
            invocation.kind,
            title,
            result.duration_display()
        );
        runtime.listener().on_step_end(&step, &result);
        result
    }
}

impl<A: ProtocolAdapter> fmt::Debug for Sampler<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sampler")
            .field("meta", &self.meta)
            .field("protocol", &self.adapter.protocol())
            .field("config", &self.config)
            .field("preprocessors", &self.preprocessors.len())
            .field("postprocessors", &self.postprocessors.len())
            .field("extractors", &self.extractors)
            .field("assertions", &self.assertions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::Rule;
    use crate::builder::SamplerBuilder;
    use crate::configure_element::ConfigureElement;
    use crate::session::Session;
    use crate::suite::Suite;
    use crate::testing::{StubAdapter, StubConfig};
    use ryze_config::ExecutionConfig;
    use ryze_core::{TemplateError, TestStatus};
    use serde_json::json;

    fn stub(adapter: &Arc<StubAdapter>, title: &str, target: &str) -> SamplerBuilder<StubAdapter> {
        let target = target.to_string();
        Sampler::builder(Arc::clone(adapter))
            .title(title)
            .config(move |c| c.target = Some(target))
    }


    #[tokio::test]
    async fn test_full_lifecycle_and_extraction() {
        let adapter = Arc::new(StubAdapter::new());
        let sampler = stub(&adapter, "get ${id}", "/users/${id}")
            .config(|c| c.body = Some(json!({"data": {"id": "${id}", "name": "alice"}})))
            .extractor(Extractor::json("user_id", "$.data.id"))
            .assertion(Assertion::status(Rule::Equals, 200))
            .assertion(Assertion::json("$.data.name", Rule::Equals, "alice"))
            .build();

        let mut session = Session::builder().variable("id", 7).build();
        let result = session.run(&sampler).await;

        assert_eq!(result.status, TestStatus::Passed);
        assert_eq!(result.title, "get 7");
        assert_eq!(
            result.phases,
            vec![
                Phase::Init,
                Phase::PreProcess,
                Phase::BuildRequest,
                Phase::Execute,
                Phase::BuildResponse,
                Phase::PostProcess,
                Phase::Extract,
                Phase::Validate,
                Phase::Done
            ]
        );
        assert_eq!(adapter.executed(), vec!["/users/7"]);
        assert_eq!(session.context().get("user_id"), Some(&json!(7)));
        assert_eq!(result.extracted, vec!["user_id"]);
        assert_eq!(session.context().depth(), 1);
    }

    #[tokio::test]
    async fn test_execute_failure_skips_extract_and_validate() {
        let adapter = Arc::new(StubAdapter::new());
        let sampler = stub(&adapter, "down", "/down")
            .config(|c| c.fail = Some("connection refused".to_string()))
            .extractor(Extractor::json("id", "$.id"))
            .assertion(Assertion::status(Rule::Equals, 200))
            .build();

        let mut session = Session::new();
        let result = session.run(&sampler).await;

        assert_eq!(result.status, TestStatus::Broken);
        let failure = result.failure.clone().unwrap();
        assert_eq!(failure.kind, FailureKind::Execution);
        assert!(failure.message.contains("connection refused"));
        assert_eq!(result.phases.last(), Some(&Phase::Error));
        assert!(!result.phases.contains(&Phase::Extract));
        assert!(result.assertions.is_empty());
        assert!(!session.context().contains("id"));
    }

    #[tokio::test]
    async fn test_build_failure_is_configuration_error() {
        let adapter = Arc::new(StubAdapter::new());
        let sampler = Sampler::builder(Arc::clone(&adapter)).title("no target").build();

        let result = Session::new().run(&sampler).await;
        assert!(result.is_broken());
        assert_eq!(result.failure.unwrap().kind, FailureKind::Configuration);
        assert_eq!(
            result.phases,
            vec![Phase::Init, Phase::PreProcess, Phase::BuildRequest, Phase::Error]
        );
        assert!(adapter.executed().is_empty());
    }

    #[tokio::test]
    async fn test_unresolved_variable_breaks_before_execute() {
        let adapter = Arc::new(StubAdapter::new());
        let sampler = stub(&adapter, "orders", "/orders/${order_id}").build();

        let result = Session::new().run(&sampler).await;
        let failure = result.failure.unwrap();
        assert_eq!(failure.kind, FailureKind::Configuration);
        assert!(failure
            .message
            .contains(&TemplateError::Unresolved("order_id".to_string()).to_string()));
        assert!(adapter.executed().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_extractor_breaks_in_init() {
        let adapter = Arc::new(StubAdapter::new());
        let sampler = stub(&adapter, "bad", "/x")
            .extractor(Extractor::regex("id", "(unclosed"))
            .build();

        let result = Session::new().run(&sampler).await;
        assert_eq!(result.phases, vec![Phase::Init, Phase::Error]);
        assert!(adapter.executed().is_empty());
    }

    #[tokio::test]
    async fn test_every_assertion_is_evaluated() {
        let adapter = Arc::new(StubAdapter::new());
        let sampler = stub(&adapter, "checks", "/x")
            .config(|c| c.body = Some(json!({"n": 3})))
            .assertion(Assertion::status(Rule::Equals, 500))
            .assertion(Assertion::json("$.n", Rule::Equals, 3))
            .assertion(Assertion::json("$.n", Rule::Greater, 10))
            .build();

        let result = Session::new().run(&sampler).await;
        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.assertions.len(), 3);
        assert_eq!(result.failed_assertions().count(), 2);
        assert_eq!(result.phases.last(), Some(&Phase::Done));
    }

    #[tokio::test]
    async fn test_default_configure_element_is_merged() {
        let adapter = Arc::new(StubAdapter::new());
        let defaults = ConfigureElement::configure("defaults", |c: &mut StubConfig| {
            c.target = Some("/base".to_string());
            c.headers.insert("X-Env".to_string(), "qa".to_string());
            c.headers.insert("X-Trace".to_string(), "outer".to_string());
        });
        let sampler = Sampler::builder(Arc::clone(&adapter))
            .title("inherits")
            .config(|c| {
                c.headers.insert("X-Trace".to_string(), "inner".to_string());
            })
            .assertion(Assertion::header("x-env", Rule::Equals, "qa"))
            .assertion(Assertion::header("x-trace", Rule::Equals, "inner"))
            .build();
        let suite = Suite::builder("suite")
            .configure_element(defaults)
            .child(sampler)
            .build();

        let result = Session::new().run(&suite).await;
        assert_eq!(result.status, TestStatus::Passed, "{:?}", result);
        assert_eq!(adapter.executed(), vec!["/base"]);
    }

    #[derive(Debug, Clone, Default)]
    struct OtherConfig {
        reference: Option<String>,
    }

    impl ConfigureItem for OtherConfig {
        const DEFAULT_REF: &'static str = "__other_default__";

        fn ref_name(&self) -> Option<&str> {
            self.reference.as_deref()
        }

        fn merge(&self, _other: &Self) -> Self {
            self.clone()
        }

        fn evaluate(&self, _ctx: &Context) -> Result<Self, TemplateError> {
            Ok(self.clone())
        }
    }

    #[tokio::test]
    async fn test_ref_of_another_protocol_is_type_mismatch() {
        let adapter = Arc::new(StubAdapter::new());
        let suite = Suite::builder("mismatch")
            .configure_element(ConfigureElement::new(
                "other",
                OtherConfig {
                    reference: Some("shared".to_string()),
                },
            ))
            .child(
                stub(&adapter, "uses shared", "/x")
                    .config(|c| c.reference = Some("shared".to_string()))
                    .build(),
            )
            .build();

        let result = Session::new().run(&suite).await;
        let child = result.find("uses shared").unwrap();
        assert!(child.is_broken());
        let failure = child.failure.clone().unwrap();
        assert_eq!(failure.kind, FailureKind::Configuration);
        assert!(failure.message.contains("shared"));
        assert_eq!(result.status, TestStatus::Broken);
    }

    #[tokio::test]
    async fn test_missing_ref_policy() {
        let adapter = Arc::new(StubAdapter::new());
        let sampler = stub(&adapter, "named", "/x")
            .config(|c| c.reference = Some("nowhere".to_string()))
            .build();

        let lenient = Session::new().run(&sampler).await;
        assert_eq!(lenient.status, TestStatus::Passed);

        let settings = ExecutionConfig {
            missing_ref: MissingRefPolicy::Error,
            ..Default::default()
        };
        let strict = Session::builder().settings(settings).build().run(&sampler).await;
        assert!(strict.is_broken());
        assert!(strict.failure.unwrap().message.contains("nowhere"));
    }

    #[tokio::test]
    async fn test_preprocessor_variables_stay_in_parent_scope() {
        let adapter = Arc::new(StubAdapter::new());
        let login = stub(&adapter, "login", "/login")
            .config(|c| c.body = Some(json!({"token": "t-1"})))
            .extractor(Extractor::json("token", "$.token"))
            .build();
        let sampler = stub(&adapter, "orders", "/orders")
            .config(|c| {
                c.headers.insert("Authorization".to_string(), "${token}".to_string());
            })
            .preprocessor(Processor::of(login))
            .assertion(Assertion::header("authorization", Rule::Equals, "t-1"))
            .build();

        let mut session = Session::new();
        let result = session.run(&sampler).await;

        assert_eq!(result.status, TestStatus::Passed);
        assert_eq!(result.children.len(), 1);
        assert_eq!(result.children[0].kind, ElementKind::Preprocessor);
        assert_eq!(adapter.executed(), vec!["/login", "/orders"]);
        assert!(!session.context().contains("token"));
    }

    #[tokio::test]
    async fn test_broken_sync_preprocessor_breaks_parent() {
        let adapter = Arc::new(StubAdapter::new());
        let broken = stub(&adapter, "setup", "/setup")
            .config(|c| c.fail = Some("timeout".to_string()))
            .build();
        let sampler = stub(&adapter, "main", "/main")
            .preprocessor(Processor::of(broken))
            .build();

        let result = Session::new().run(&sampler).await;
        assert!(result.is_broken());
        let failure = result.failure.unwrap();
        assert_eq!(failure.kind, FailureKind::Processor);
        assert!(failure.message.contains("setup"));
        assert_eq!(adapter.executed(), vec!["/setup"]);
    }

    #[tokio::test]
    async fn test_failed_sync_postprocessor_fails_parent() {
        let adapter = Arc::new(StubAdapter::new());
        let check = stub(&adapter, "check", "/check")
            .assertion(Assertion::status(Rule::Equals, 404))
            .build();
        let sampler = stub(&adapter, "main", "/main")
            .postprocessor(Processor::of(check))
            .build();

        let result = Session::new().run(&sampler).await;
        assert_eq!(result.status, TestStatus::Failed);
        assert!(result.failure.is_none());
        assert_eq!(result.phases.last(), Some(&Phase::Done));
    }

    #[tokio::test]
    async fn test_disabled_sampler_is_skipped() {
        let adapter = Arc::new(StubAdapter::new());
        let sampler = stub(&adapter, "off", "/off").disabled(true).build();

        let result = Session::new().run(&sampler).await;
        assert_eq!(result.status, TestStatus::Skipped);
        assert!(result.phases.is_empty());
        assert!(adapter.executed().is_empty());
    }
}
