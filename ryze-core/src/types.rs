//! Identifiers, statuses and lifecycle phases shared by every element

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a test element (newtype pattern for type safety)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementId(pub Uuid);

impl ElementId {
    /// Create a new random element ID
    pub fn new() -> Self {
        ElementId(Uuid::new_v4())
    }

    /// Get the inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ElementId {
    fn from(uuid: Uuid) -> Self {
        ElementId(uuid)
    }
}

/// Outcome of one element execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    #[default]
    Passed,
    /// Element was disabled and never ran
    Skipped,
    /// An assertion did not hold
    Failed,
    /// Configuration or execution error
    Broken,
}

impl TestStatus {
    fn severity(&self) -> u8 {
        match self {
            TestStatus::Skipped => 0,
            TestStatus::Passed => 1,
            TestStatus::Failed => 2,
            TestStatus::Broken => 3,
        }
    }

    /// Combine two statuses, the worst one wins
    pub fn worst(self, other: TestStatus) -> TestStatus {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    /// Check if the status counts as a failure in aggregates
    pub fn is_failure(&self) -> bool {
        matches!(self, TestStatus::Failed | TestStatus::Broken)
    }

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Skipped => "skipped",
            TestStatus::Failed => "failed",
            TestStatus::Broken => "broken",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of test element a result belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Suite,
    Sampler,
    Preprocessor,
    Postprocessor,
    ConfigureElement,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Suite => "suite",
            ElementKind::Sampler => "sampler",
            ElementKind::Preprocessor => "preprocessor",
            ElementKind::Postprocessor => "postprocessor",
            ElementKind::ConfigureElement => "configure_element",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sampler lifecycle phases, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Init,
    PreProcess,
    BuildRequest,
    Execute,
    BuildResponse,
    PostProcess,
    Extract,
    Validate,
    Done,
    Error,
}

impl Phase {
    /// Position in the forward chain; `Error` sits outside of it
    pub fn ordinal(&self) -> u8 {
        match self {
            Phase::Init => 0,
            Phase::PreProcess => 1,
            Phase::BuildRequest => 2,
            Phase::Execute => 3,
            Phase::BuildResponse => 4,
            Phase::PostProcess => 5,
            Phase::Extract => 6,
            Phase::Validate => 7,
            Phase::Done => 8,
            Phase::Error => u8::MAX,
        }
    }

    /// Check if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Done | Phase::Error)
    }

    /// Check if moving from `self` to `next` keeps the lifecycle strictly forward
    pub fn can_advance_to(&self, next: Phase) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == Phase::Error || next.ordinal() > self.ordinal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Init => "INIT",
            Phase::PreProcess => "PRE_PROCESS",
            Phase::BuildRequest => "BUILD_REQUEST",
            Phase::Execute => "EXECUTE",
            Phase::BuildResponse => "BUILD_RESPONSE",
            Phase::PostProcess => "POST_PROCESS",
            Phase::Extract => "EXTRACT",
            Phase::Validate => "VALIDATE",
            Phase::Done => "DONE",
            Phase::Error => "ERROR",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
