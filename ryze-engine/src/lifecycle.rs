//! Phase tracking shared by samplers and suites

use ryze_core::{FailureKind, Phase, SampleResult};
use tracing::{debug, warn};

/// Forward-only phase machine for one element run
///
/// Every accepted transition is appended to [`SampleResult::phases`], so the
/// result carries the exact path the element took.
#[derive(Debug)]
pub struct Lifecycle {
    phase: Phase,
    title: String,
}

impl Lifecycle {
    /// Enter `INIT` and record it on the result
    pub fn start(title: impl Into<String>, result: &mut SampleResult) -> Self {
        result.phases.push(Phase::Init);
        Self {
            phase: Phase::Init,
            title: title.into(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_errored(&self) -> bool {
        self.phase == Phase::Error
    }

    /// Move to `next`; returns false when the transition would go backwards
    /// or leave a terminal phase
    pub fn advance(&mut self, next: Phase, result: &mut SampleResult) -> bool {
        if !self.phase.can_advance_to(next) {
            warn!(
                "Rejected phase transition {} -> {} for '{}'",
                self.phase, next, self.title
            );
            return false;
        }
        debug!("'{}' entering {}", self.title, next);
        self.phase = next;
        result.phases.push(next);
        true
    }

    /// Mark the result broken and jump to `ERROR`
    pub fn fail(&mut self, result: &mut SampleResult, kind: FailureKind, message: impl Into<String>) {
        let message = message.into();
        warn!("'{}' broke during {}: {}", self.title, self.phase, message);
        result.break_with(kind, message);
        self.advance(Phase::Error, result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ryze_core::{ElementId, ElementKind, TestStatus};

    fn result() -> SampleResult {
        SampleResult::new(ElementId::new(), "lifecycle", ElementKind::Sampler)
    }

    #[test]
    fn test_forward_transitions_are_recorded() {
        let mut result = result();
        let mut lifecycle = Lifecycle::start("lifecycle", &mut result);
        assert!(lifecycle.advance(Phase::PreProcess, &mut result));
        assert!(lifecycle.advance(Phase::BuildRequest, &mut result));
        assert!(!lifecycle.advance(Phase::PreProcess, &mut result));
        assert_eq!(lifecycle.phase(), Phase::BuildRequest);
        assert_eq!(
            result.phases,
            vec![Phase::Init, Phase::PreProcess, Phase::BuildRequest]
        );
    }

    #[test]
    fn test_fail_is_terminal() {
        let mut result = result();
        let mut lifecycle = Lifecycle::start("lifecycle", &mut result);
        lifecycle.advance(Phase::PreProcess, &mut result);
        lifecycle.fail(&mut result, FailureKind::Execution, "connection refused");

        assert!(lifecycle.is_errored());
        assert_eq!(result.status, TestStatus::Broken);
        assert_eq!(result.phases.last(), Some(&Phase::Error));
        assert!(!lifecycle.advance(Phase::Done, &mut result));
        assert_eq!(result.failure.unwrap().message, "connection refused");
    }
}
