//! Reporting listener interface
//!
//! The lifecycle calls [`ReportListener::on_step_start`] and
//! [`ReportListener::on_step_end`] exactly once per element run. Both methods
//! default to no-ops so implementations only override what they need.

use ryze_core::{Context, ElementId, ElementKind, SampleResult};
use serde::Serialize;
use std::sync::Arc;

/// Identity of the element a step event belongs to
#[derive(Debug, Clone, Serialize)]
pub struct StepInfo {
    pub id: ElementId,
    /// Title with placeholders resolved for display
    pub title: String,
    pub kind: ElementKind,
    /// Scope depth the element runs at
    pub depth: usize,
    /// Whether the element was dispatched as an async processor
    pub detached: bool,
}

/// Step-tracing listener
pub trait ReportListener: Send + Sync {
    /// Called when an element starts its lifecycle
    fn on_step_start(&self, _step: &StepInfo, _ctx: &Context) {}

    /// Called when an element reaches a terminal phase
    fn on_step_end(&self, _step: &StepInfo, _result: &SampleResult) {}
}

/// Listener that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl ReportListener for NoopListener {}

/// Fan events out to several listeners in registration order
#[derive(Clone, Default)]
pub struct CompositeListener {
    listeners: Vec<Arc<dyn ReportListener>>,
}

impl CompositeListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, listener: Arc<dyn ReportListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn push(&mut self, listener: Arc<dyn ReportListener>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl ReportListener for CompositeListener {
    fn on_step_start(&self, step: &StepInfo, ctx: &Context) {
        for listener in &self.listeners {
            listener.on_step_start(step, ctx);
        }
    }

    fn on_step_end(&self, step: &StepInfo, result: &SampleResult) {
        for listener in &self.listeners {
            listener.on_step_end(step, result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        starts: AtomicUsize,
        ends: AtomicUsize,
    }

    impl ReportListener for Counting {
        fn on_step_start(&self, _step: &StepInfo, _ctx: &Context) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_step_end(&self, _step: &StepInfo, _result: &SampleResult) {
            self.ends.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_composite_fans_out() {
        let counting = Arc::new(Counting::default());
        let composite = CompositeListener::new()
            .with(Arc::new(NoopListener))
            .with(counting.clone());
        assert_eq!(composite.len(), 2);

        let step = StepInfo {
            id: ElementId::new(),
            title: "step".to_string(),
            kind: ElementKind::Sampler,
            depth: 1,
            detached: false,
        };
        let ctx = Context::new();
        composite.on_step_start(&step, &ctx);
        composite.on_step_end(&step, &SampleResult::new(step.id, "step", step.kind));

        assert_eq!(counting.starts.load(Ordering::SeqCst), 1);
        assert_eq!(counting.ends.load(Ordering::SeqCst), 1);
    }
}
