//! Sessions and the shared runtime handed to every element
//!
//! A [`Session`] owns one root [`Context`]. Concurrent sessions share no
//! mutable state: each one carries its own context, settings and background
//! task list.

use crate::listener::TracingListener;
use crate::node::{Invocation, Node};
use ryze_config::ExecutionConfig;
use ryze_core::{Context, FunctionRegistry, SampleResult};
use ryze_interfaces::ReportListener;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// Unique identifier for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-session services shared by every element of a run
pub struct Runtime {
    session_id: SessionId,
    settings: ExecutionConfig,
    listener: Arc<dyn ReportListener>,
    background: Mutex<Vec<JoinHandle<SampleResult>>>,
}

impl Runtime {
    pub fn new(settings: ExecutionConfig, listener: Arc<dyn ReportListener>) -> Self {
        Self {
            session_id: SessionId::new(),
            settings,
            listener,
            background: Mutex::new(Vec::new()),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn settings(&self) -> &ExecutionConfig {
        &self.settings
    }

    pub fn listener(&self) -> &dyn ReportListener {
        self.listener.as_ref()
    }

    /// Keep a background run for [`Runtime::drain`]. Runs that already
    /// finished are dropped here; the listener has seen their outcome.
    pub(crate) async fn track(&self, handle: JoinHandle<SampleResult>) {
        let mut background = self.background.lock().await;
        background.retain(|h| !h.is_finished());
        background.push(handle);
    }

    /// Number of background runs tracked and not yet collected
    pub async fn pending(&self) -> usize {
        self.background.lock().await.len()
    }

    /// Wait for every background run, bounded by the drain timeout.
    /// Runs still going when the deadline passes are aborted.
    pub async fn drain(&self) -> Vec<SampleResult> {
        let handles: Vec<_> = std::mem::take(&mut *self.background.lock().await);
        let deadline = Instant::now() + self.settings.drain_timeout;
        let mut results = Vec::with_capacity(handles.len());

        for mut handle in handles {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, &mut handle).await {
                Ok(Ok(result)) => results.push(result),
                Ok(Err(e)) => warn!("Background processor task failed: {}", e),
                Err(_) => {
                    warn!(
                        "Background processor still running after {:?}, aborting",
                        self.settings.drain_timeout
                    );
                    handle.abort();
                }
            }
        }
        results
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("session_id", &self.session_id)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// One independent execution of a tree of elements
#[derive(Debug)]
pub struct Session {
    runtime: Arc<Runtime>,
    context: Context,
}

impl Session {
    /// Session with default settings and a tracing listener
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    pub fn id(&self) -> SessionId {
        self.runtime.session_id()
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// Run an element against the session's root context
    pub async fn run(&mut self, node: &dyn Node) -> SampleResult {
        info!("Session {} running '{}'", self.runtime.session_id(), node.meta().title);
        node.run(&self.runtime, &mut self.context, Invocation::new(node.kind()))
            .await
    }

    /// Collect results of async processors still tracked. Runs pruned by
    /// a later dispatch were only reported to the listener.
    pub async fn drain(&self) -> Vec<SampleResult> {
        self.runtime.drain().await
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`Session`]
#[derive(Default)]
pub struct SessionBuilder {
    settings: ExecutionConfig,
    listener: Option<Arc<dyn ReportListener>>,
    functions: Option<FunctionRegistry>,
    variables: Map<String, Value>,
}

impl SessionBuilder {
    pub fn settings(mut self, settings: ExecutionConfig) -> Self {
        self.settings = settings;
        self
    }

    pub fn listener(mut self, listener: Arc<dyn ReportListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Replace the template function registry; builtins are used otherwise
    pub fn functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = Some(functions);
        self
    }

    /// Seed a variable into the root scope
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn build(self) -> Session {
        let functions = self.functions.unwrap_or_else(FunctionRegistry::with_builtins);
        let mut context = Context::with_functions(Arc::new(functions))
            .with_strict_variables(self.settings.strict_variables);
        for (name, value) in self.variables {
            context.put(name, value);
        }

        let listener = self
            .listener
            .unwrap_or_else(|| Arc::new(TracingListener) as Arc<dyn ReportListener>);

        Session {
            runtime: Arc::new(Runtime::new(self.settings, listener)),
            context,
        }
    }
}
