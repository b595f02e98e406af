//! Building and running element trees from YAML documents

use anyhow::Result;
use ryze_config::{ConfigLoader, HttpConfig};
use ryze_core::{FailureKind, TestStatus};
use ryze_engine::testing::StubAdapter;
use ryze_engine::{ElementRegistry, RegistryError, Session};
use ryze_http::{HttpAdapter, HttpMethod, MockResponse};
use serde_json::{json, Value};
use std::sync::Arc;

const USER_SUITE: &str = r#"
testclass: suite
title: user api
variables:
  name: alice
configelements:
  - testclass: http
    config:
      host: api.local
      port: 8080
      headers:
        Accept: application/json
  - testclass: http
    ref: mail
    config:
      host: mail.local
      method: POST
children:
  - testclass: http
    title: create ${name}
    config:
      method: POST
      path: /user
      body:
        name: ${name}
    extractors:
      - type: json
        ref_name: id
        path: $.data.id
    validators:
      - type: status
        rule: "=="
        expected: 201
    postprocessors:
      - testclass: http
        title: notify
        ref: mail
        config:
          path: /send
        condition: ${notify}
  - testclass: http
    title: read ${id}
    config:
      path: /user/${id}
    validators:
      - type: json
        path: $.data.name
        rule: equals
        expected: ${name}
      - type: json
        path: $.data.tags
        rule: any_equals
        expected: [qa, dev]
"#;

fn registry() -> Result<ElementRegistry> {
    let adapter = HttpAdapter::offline(HttpConfig::default())?
        .with_mock(
            HttpMethod::Post,
            "http://api.local:8080/user",
            MockResponse::json(201, json!({"data": {"id": 3}})),
        )
        .with_mock(
            HttpMethod::Get,
            "http://api.local:8080/user/3",
            MockResponse::json(200, json!({"data": {"id": 3, "name": "alice", "tags": ["dev"]}})),
        )
        .with_mock(
            HttpMethod::Post,
            "http://mail.local/send",
            MockResponse::json(202, json!({"queued": true})),
        );

    let mut registry = ElementRegistry::new();
    registry.register_protocol(ryze_http::KEYWORDS, Arc::new(adapter));
    registry.register_protocol(&["stub"], Arc::new(StubAdapter::new()));
    Ok(registry)
}

fn document(yaml: &str) -> Result<Value> {
    Ok(serde_yaml::from_str(yaml)?)
}

#[tokio::test]
async fn test_yaml_suite_runs_end_to_end() -> Result<()> {
    let node = registry()?.build(&document(USER_SUITE)?)?;

    let mut session = Session::builder().variable("notify", true).build();
    let result = session.run(node.as_ref()).await;

    assert_eq!(result.status, TestStatus::Passed, "{:#?}", result);
    let create = result.find("create alice").expect("create step");
    let notify = create.find("notify").expect("notification ran as a postprocessor");
    assert_eq!(notify.response.as_ref().and_then(|r| r.status), Some(202));
    assert!(result.find("read 3").is_some());
    Ok(())
}

#[tokio::test]
async fn test_condition_false_skips_processor() -> Result<()> {
    let node = registry()?.build(&document(USER_SUITE)?)?;

    let mut session = Session::builder().variable("notify", "no").build();
    let result = session.run(node.as_ref()).await;

    assert_eq!(result.status, TestStatus::Passed);
    let create = result.find("create alice").expect("create step");
    assert!(create.children.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_missing_condition_variable_breaks_parent() -> Result<()> {
    let node = registry()?.build(&document(USER_SUITE)?)?;

    let result = Session::new().run(node.as_ref()).await;
    let create = result.find("create alice").expect("create step");
    assert!(create.is_broken());
    assert_eq!(
        create.failure.as_ref().map(|f| f.kind),
        Some(FailureKind::Configuration)
    );
    Ok(())
}

#[test]
fn test_invalid_documents_are_rejected() -> Result<()> {
    let registry = registry()?;

    let unknown = registry.build(&document("testclass: grpc\n")?);
    assert!(matches!(unknown, Err(RegistryError::UnknownKeyword(k)) if k == "grpc"));

    let bad_rule = registry.build(&document(
        "testclass: stub\nvalidators:\n  - type: status\n    rule: roughly\n    expected: 200\n",
    )?);
    assert!(matches!(bad_rule, Err(RegistryError::Malformed { .. })));

    let bad_pattern = registry.build(&document(
        "testclass: stub\nextractors:\n  - type: regex\n    ref_name: id\n    pattern: \"(open\"\n",
    )?);
    assert!(matches!(bad_pattern, Err(RegistryError::Invalid(_))));
    Ok(())
}

#[test]
fn test_settings_from_yaml_drive_the_session() -> Result<()> {
    let config = ConfigLoader::new().from_yaml("execution:\n  strict_variables: false\n")?;
    let node = registry()?.build(&document(
        "testclass: stub\ntitle: lenient\nconfig:\n  target: /items/${unknown}\n",
    )?)?;

    let result = tokio_test::block_on(async {
        let mut session = Session::builder().settings(config.execution.clone()).build();
        session.run(node.as_ref()).await
    });
    assert_eq!(result.status, TestStatus::Passed);
    assert_eq!(
        result.request.map(|r| r.format),
        Some("STUB /items/${unknown}\n".to_string())
    );
    Ok(())
}
