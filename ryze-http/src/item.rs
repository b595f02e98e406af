//! HTTP configure item

use crate::types::HttpMethod;
use ryze_core::configure::{
    evaluate_json, evaluate_map, evaluate_string, merge_json, merge_map, merge_option, merge_string,
};
use ryze_core::{ConfigureItem, Context, TemplateError};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Reference used by HTTP configure elements that do not name one
pub const DEFAULT_REF: &str = "__http_configure_element_default_ref_name__";

/// HTTP request configuration, mergeable field by field
///
/// Every text field may hold `${...}` placeholders. Unset fields are taken
/// from the configure element this item is merged over.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpConfigureItem {
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// `http` or `https`; `http` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, deserialize_with = "text_or_number", skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// `GET` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cookies: BTreeMap<String, String>,
    /// Strings are sent as text, anything else as JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, alias = "timeout", skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

fn text_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    })
}

impl HttpConfigureItem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reference(&mut self, reference: impl Into<String>) -> &mut Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn protocol(&mut self, protocol: impl Into<String>) -> &mut Self {
        self.protocol = Some(protocol.into());
        self
    }

    pub fn host(&mut self, host: impl Into<String>) -> &mut Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(&mut self, port: impl ToString) -> &mut Self {
        self.port = Some(port.to_string());
        self
    }

    pub fn path(&mut self, path: impl Into<String>) -> &mut Self {
        self.path = Some(path.into());
        self
    }

    pub fn method(&mut self, method: HttpMethod) -> &mut Self {
        self.method = Some(method.as_str().to_string());
        self
    }

    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn query(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn cookie(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn body(&mut self, body: impl Into<Value>) -> &mut Self {
        self.body = Some(body.into());
        self
    }

    pub fn timeout_ms(&mut self, timeout_ms: u64) -> &mut Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

impl ConfigureItem for HttpConfigureItem {
    const DEFAULT_REF: &'static str = DEFAULT_REF;

    fn ref_name(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    fn merge(&self, other: &Self) -> Self {
        Self {
            reference: merge_string(&self.reference, &other.reference),
            protocol: merge_string(&self.protocol, &other.protocol),
            host: merge_string(&self.host, &other.host),
            port: merge_string(&self.port, &other.port),
            path: merge_string(&self.path, &other.path),
            method: merge_string(&self.method, &other.method),
            headers: merge_map(&self.headers, &other.headers),
            query: merge_map(&self.query, &other.query),
            cookies: merge_map(&self.cookies, &other.cookies),
            body: merge_json(&self.body, &other.body),
            timeout_ms: merge_option(&self.timeout_ms, &other.timeout_ms),
        }
    }

    fn evaluate(&self, ctx: &Context) -> Result<Self, TemplateError> {
        Ok(Self {
            reference: self.reference.clone(),
            protocol: evaluate_string(ctx, &self.protocol)?,
            host: evaluate_string(ctx, &self.host)?,
            port: evaluate_string(ctx, &self.port)?,
            path: evaluate_string(ctx, &self.path)?,
            method: evaluate_string(ctx, &self.method)?,
            headers: evaluate_map(ctx, &self.headers)?,
            query: evaluate_map(ctx, &self.query)?,
            cookies: evaluate_map(ctx, &self.cookies)?,
            body: evaluate_json(ctx, &self.body)?,
            timeout_ms: self.timeout_ms,
        })
    }
}
