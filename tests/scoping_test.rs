//! Variable scoping, lenient resolution and template functions across a run

use ryze_config::ExecutionConfig;
use ryze_core::{FunctionRegistry, TemplateError, TemplateFunction, TestStatus};
use ryze_engine::testing::{StubAdapter, StubConfig};
use ryze_engine::{Assertion, Extractor, Rule, Sampler, SamplerBuilder, Session, Suite};
use serde_json::{json, Value};
use std::sync::Arc;

fn stub(adapter: &Arc<StubAdapter>, title: &str, target: &str) -> SamplerBuilder<StubAdapter> {
    let target = target.to_string();
    Sampler::builder(Arc::clone(adapter))
        .title(title)
        .config(move |c: &mut StubConfig| c.target = Some(target))
}

#[tokio::test]
async fn test_nested_suites_isolate_extracted_variables() {
    let adapter = Arc::new(StubAdapter::new());
    let inner = Suite::builder("inner")
        .child(
            stub(&adapter, "produce", "/produce")
                .config(|c| c.body = Some(json!({"token": "inner-token"})))
                .extractor(Extractor::json("token", "$.token"))
                .build(),
        )
        .child(
            stub(&adapter, "consume", "/consume/${token}")
                .assertion(Assertion::variable("token", Rule::Equals, "inner-token"))
                .build(),
        )
        .build();
    let outer = Suite::builder("outer")
        .variable("token", "outer-token")
        .child(inner)
        .child(
            stub(&adapter, "after", "/after/${token}")
                .assertion(Assertion::variable("token", Rule::Equals, "outer-token"))
                .build(),
        )
        .build();

    let mut session = Session::new();
    let result = session.run(&outer).await;

    assert_eq!(result.status, TestStatus::Passed, "{:#?}", result);
    assert_eq!(
        adapter.executed(),
        vec!["/produce", "/consume/inner-token", "/after/outer-token"]
    );
    assert!(!session.context().contains("token"));
}

#[tokio::test]
async fn test_top_level_extraction_lands_in_session_root() {
    let adapter = Arc::new(StubAdapter::new());
    let login = stub(&adapter, "login", "/login")
        .config(|c| c.body = Some(json!({"session": {"id": "s-9", "roles": ["admin"]}})))
        .extractor(Extractor::json("session", "$.session"))
        .build();
    let profile = stub(&adapter, "profile", "/profile/${session.id}")
        .assertion(Assertion::variable("session.roles", Rule::Contains, "admin"))
        .build();

    let mut session = Session::new();
    assert!(session.run(&login).await.is_passed());
    assert_eq!(session.context().get("session"), Some(&json!({"id": "s-9", "roles": ["admin"]})));

    let result = session.run(&profile).await;
    assert_eq!(adapter.executed().last().map(String::as_str), Some("/profile/s-9"));
    assert_eq!(result.status, TestStatus::Passed);
}

#[tokio::test]
async fn test_lenient_mode_keeps_placeholders() {
    let adapter = Arc::new(StubAdapter::new());
    let settings = ExecutionConfig {
        strict_variables: false,
        ..Default::default()
    };
    let sampler = stub(&adapter, "lenient ${missing}", "/items/${missing}").build();

    let result = Session::builder().settings(settings).build().run(&sampler).await;
    assert_eq!(result.status, TestStatus::Passed);
    assert_eq!(result.title, "lenient ${missing}");
    assert_eq!(adapter.executed(), vec!["/items/${missing}"]);
}

struct Upper;

impl TemplateFunction for Upper {
    fn name(&self) -> &str {
        "upper"
    }

    fn call(&self, _ctx: &ryze_core::Context, args: &[String]) -> Result<Value, TemplateError> {
        Ok(Value::String(args.first().cloned().unwrap_or_default().to_uppercase()))
    }
}

#[tokio::test]
async fn test_template_functions_in_configuration() {
    let adapter = Arc::new(StubAdapter::new());
    let mut functions = FunctionRegistry::with_builtins();
    functions.register(Upper);

    let sampler = stub(&adapter, "functions", "/encode")
        .config(|c| {
            c.body = Some(json!({
                "auth": "${base64_encode(${user}:secret)}",
                "shout": "${upper(${user})}",
                "at": "${timestamp()}"
            }))
        })
        .assertion(Assertion::json("$.auth", Rule::Equals, "YWxpY2U6c2VjcmV0"))
        .assertion(Assertion::json("$.shout", Rule::Equals, "ALICE"))
        .assertion(Assertion::json("$.at", Rule::Greater, 0))
        .build();

    let mut session = Session::builder()
        .functions(functions)
        .variable("user", "alice")
        .build();
    let result = session.run(&sampler).await;
    assert_eq!(result.status, TestStatus::Passed, "{:#?}", result.assertions);
}
