//! Default listener that writes step events to `tracing`

use ryze_core::{Context, SampleResult, TestStatus};
use ryze_interfaces::{ReportListener, StepInfo};
use tracing::{debug, info, warn};

/// Logs every step start and end
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingListener;

impl ReportListener for TracingListener {
    fn on_step_start(&self, step: &StepInfo, _ctx: &Context) {
        debug!(
            element_id = %step.id,
            kind = %step.kind,
            depth = step.depth,
            detached = step.detached,
            "Starting '{}'",
            step.title
        );
    }

    fn on_step_end(&self, step: &StepInfo, result: &SampleResult) {
        match result.status {
            TestStatus::Passed | TestStatus::Skipped => info!(
                element_id = %step.id,
                kind = %step.kind,
                status = %result.status,
                "'{}' finished in {}",
                step.title,
                result.duration_display()
            ),
            TestStatus::Failed => warn!(
                element_id = %step.id,
                kind = %step.kind,
                failed_assertions = result.failed_assertions().count(),
                "'{}' failed",
                step.title
            ),
            TestStatus::Broken => warn!(
                element_id = %step.id,
                kind = %step.kind,
                "'{}' broken: {}",
                step.title,
                result
                    .failure
                    .as_ref()
                    .map(|f| f.to_string())
                    .unwrap_or_default()
            ),
        }
    }
}
