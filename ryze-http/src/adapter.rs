//! HTTP protocol adapter with offline mock support

use crate::errors::HttpError;
use crate::item::HttpConfigureItem;
use crate::types::{HttpBody, HttpMethod, HttpRequest, HttpResponse, MockResponse};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use ryze_config::HttpConfig;
use ryze_core::{RealRequest, RealResponse};
use ryze_interfaces::{ProtocolAdapter, ProtocolError};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Keywords the HTTP sampler and configure element are registered under
pub const KEYWORDS: &[&str] = &["http", "http_sampler", "httpsampler"];

/// Sends HTTP requests through a shared `reqwest` client
///
/// In offline mode no request leaves the process: responses come from a
/// mock table keyed `METHOD:URL`, matched exactly first and then by
/// substring in either direction.
#[derive(Debug, Clone)]
pub struct HttpAdapter {
    client: Client,
    config: HttpConfig,
    offline: bool,
    mocks: HashMap<String, MockResponse>,
}

impl HttpAdapter {
    /// Create an adapter in online mode
    pub fn new(config: HttpConfig) -> Result<Self, HttpError> {
        debug!(
            "Creating HTTP adapter with timeout: {}s",
            config.timeout.as_secs()
        );
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool.max_idle_per_host)
            .pool_idle_timeout(config.pool.idle_timeout)
            .user_agent(&config.user_agent)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects as usize))
            .build()?;

        Ok(Self {
            client,
            config,
            offline: false,
            mocks: HashMap::new(),
        })
    }

    /// Create an adapter that only answers from mocks
    pub fn offline(config: HttpConfig) -> Result<Self, HttpError> {
        let mut adapter = Self::new(config)?;
        adapter.set_offline();
        Ok(adapter)
    }

    pub fn set_offline(&mut self) {
        self.offline = true;
        debug!("HTTP adapter set to offline mode");
    }

    pub fn set_online(&mut self) {
        self.offline = false;
        debug!("HTTP adapter set to online mode");
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    pub fn add_mock(&mut self, method: HttpMethod, url: &str, response: MockResponse) {
        let key = format!("{}:{}", method.as_str(), url);
        self.mocks.insert(key, response);
        debug!("Added HTTP mock for {} {}", method, url);
    }

    pub fn with_mock(mut self, method: HttpMethod, url: &str, response: MockResponse) -> Self {
        self.add_mock(method, url, response);
        self
    }

    pub fn clear_mocks(&mut self) {
        self.mocks.clear();
        debug!("Cleared all HTTP mocks");
    }

    /// Assemble a request from an evaluated configure item
    pub fn build_request(&self, item: &HttpConfigureItem) -> Result<HttpRequest, HttpError> {
        let method: HttpMethod = match item.method.as_deref() {
            Some(method) if !method.trim().is_empty() => method.parse()?,
            _ => HttpMethod::Get,
        };
        let host = item
            .host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(HttpError::MissingField("host"))?;

        let mut base = if host.contains("://") {
            host.trim_end_matches('/').to_string()
        } else {
            let protocol = item
                .protocol
                .as_deref()
                .filter(|p| !p.trim().is_empty())
                .unwrap_or("http");
            format!("{}://{}", protocol.trim(), host)
        };
        if let Some(port) = item.port.as_deref().filter(|p| !p.trim().is_empty()) {
            write!(base, ":{}", port.trim()).map_err(|e| HttpError::ConfigError(e.to_string()))?;
        }
        let path = item.path.as_deref().unwrap_or("");
        let separator = if path.is_empty() || path.starts_with('/') { "" } else { "/" };

        let mut url = Url::parse(&format!("{}{}{}", base, separator, path))
            .map_err(|e| HttpError::InvalidUrl(format!("{}: {}", base, e)))?;
        if !item.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &item.query {
                pairs.append_pair(name, value);
            }
        }

        let mut headers = item.headers.clone();
        for (name, value) in &self.config.default_headers {
            if !headers.keys().any(|k| k.eq_ignore_ascii_case(name)) {
                headers.insert(name.clone(), value.clone());
            }
        }
        if !item.cookies.is_empty() {
            let cookie = item
                .cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; ");
            headers.insert("Cookie".to_string(), cookie);
        }

        let body = match &item.body {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(HttpBody::Text(text.clone())),
            Some(json) => {
                if !headers.keys().any(|k| k.eq_ignore_ascii_case("content-type")) {
                    headers.insert("Content-Type".to_string(), "application/json".to_string());
                }
                Some(HttpBody::Json(json.clone()))
            }
        };

        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
            timeout: item.timeout_ms.map(Duration::from_millis),
        })
    }

    fn mock_for(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        let url = request.url.as_str();
        let method = request.method.as_str();

        if let Some(mock) = self.mocks.get(&format!("{}:{}", method, url)) {
            debug!("Found matching mock response for {} {}", method, url);
            return Ok(mock.to_response());
        }

        // Partial URL matches, most specific mock first
        let mut candidates: Vec<_> = self
            .mocks
            .iter()
            .filter_map(|(key, mock)| key.split_once(':').map(|(m, u)| (m, u, mock)))
            .filter(|(mock_method, mock_url, _)| {
                mock_method.eq_ignore_ascii_case(method) && (url.contains(mock_url) || mock_url.contains(url))
            })
            .collect();
        candidates.sort_by_key(|(_, mock_url, _)| std::cmp::Reverse(mock_url.len()));

        match candidates.first() {
            Some((_, mock_url, mock)) => {
                debug!("Found partial matching mock {} for {} {}", mock_url, method, url);
                Ok(mock.to_response())
            }
            None => Err(HttpError::NoMock {
                method: method.to_string(),
                url: url.to_string(),
            }),
        }
    }

    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut builder = self
            .client
            .request(request.method.into(), request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.to_bytes());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse { status, headers, body })
    }
}

/// Flatten response headers; repeated names are joined with `, `.
/// Values that are not visible ASCII are skipped.
fn collect_headers(map: &HeaderMap) -> BTreeMap<String, String> {
    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in map {
        let Ok(value) = value.to_str() else { continue };
        headers
            .entry(name.to_string())
            .and_modify(|joined| {
                joined.push_str(", ");
                joined.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    headers
}

#[async_trait]
impl ProtocolAdapter for HttpAdapter {
    type Config = HttpConfigureItem;
    type Request = HttpRequest;
    type Response = HttpResponse;

    fn protocol(&self) -> &'static str {
        "http"
    }

    fn build(&self, config: &HttpConfigureItem) -> Result<HttpRequest, ProtocolError> {
        Ok(self.build_request(config)?)
    }

    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ProtocolError> {
        info!("Making HTTP request: {} {}", request.method, request.url);

        let outcome = if self.offline {
            self.mock_for(request)
        } else {
            self.send(request).await
        };

        match outcome {
            Ok(response) => {
                info!("HTTP response received: {}", response.status);
                Ok(response)
            }
            Err(HttpError::NetworkError(e)) if e.is_timeout() => Err(ProtocolError::Timeout(
                request.timeout.unwrap_or(self.config.timeout),
            )),
            Err(e) => Err(e.into()),
        }
    }

    fn format_request(&self, request: &HttpRequest) -> RealRequest {
        let mut text = format!("{} {}\n", request.method, request.url);
        for (name, value) in &request.headers {
            let _ = writeln!(text, "{}: {}", name, value);
        }
        let body = request.body.as_ref().map(HttpBody::to_bytes).unwrap_or_default();
        if !body.is_empty() {
            text.push('\n');
            text.push_str(&String::from_utf8_lossy(&body));
        }
        RealRequest::new(text, body.len())
    }

    fn format_response(&self, response: HttpResponse) -> Result<RealResponse, ProtocolError> {
        let mut text = format!("HTTP {}\n", response.status);
        for (name, value) in &response.headers {
            let _ = writeln!(text, "{}: {}", name, value);
        }
        if !response.body.is_empty() {
            text.push('\n');
            text.push_str(&String::from_utf8_lossy(&response.body));
        }

        let mut real = RealResponse::new(response.body)
            .with_status(response.status)
            .with_format(text);
        for (name, value) in response.headers {
            real = real.with_header(name, value);
        }
        Ok(real)
    }
}
