//! The executable element contract

use crate::session::Runtime;
use async_trait::async_trait;
use ryze_core::{Context, ElementId, ElementKind, SampleResult};
use ryze_interfaces::StepInfo;
use std::fmt;
use std::sync::Arc;

/// Identity shared by every element
#[derive(Debug, Clone)]
pub struct ElementMeta {
    pub id: ElementId,
    /// Title template; resolved for display when the element runs
    pub title: String,
    pub disabled: bool,
}

impl ElementMeta {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: ElementId::new(),
            title: title.into(),
            disabled: false,
        }
    }
}

/// How an element is being run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invocation {
    /// Role the element plays in this run
    pub kind: ElementKind,
    /// Whether the element runs on a context snapshot, off the parent's path
    pub detached: bool,
}

impl Invocation {
    pub fn new(kind: ElementKind) -> Self {
        Self {
            kind,
            detached: false,
        }
    }

    pub fn detached(kind: ElementKind) -> Self {
        Self {
            kind,
            detached: true,
        }
    }

    pub(crate) fn step(&self, meta: &ElementMeta, title: &str, depth: usize) -> StepInfo {
        StepInfo {
            id: meta.id,
            title: title.to_string(),
            kind: self.kind,
            depth,
            detached: self.detached,
        }
    }
}

/// An element that can be run against a context
///
/// Implementations push their own scope on entry and drop it on exit, so a
/// run never leaves private variables behind in `ctx`.
#[async_trait]
pub trait Node: Send + Sync + fmt::Debug {
    fn meta(&self) -> &ElementMeta;

    /// Role the element plays when run directly
    fn kind(&self) -> ElementKind;

    async fn run(&self, runtime: &Arc<Runtime>, ctx: &mut Context, invocation: Invocation) -> SampleResult;
}
