use crate::model::PipelineReport;
use crate::pipeline::PipelineState;

/// Trait for reporting pipeline progress to an observer.
///
/// The CLI implements it with an indicatif bar. All methods default to no-ops.
pub trait ProgressReporter: Send + Sync {
    fn on_stage(&self, _state: PipelineState, _status: &str) {}
    fn on_progress(&self, _percent: u8) {}
    fn on_item(&self, _name: &str, _index: usize, _total: usize) {}
    fn on_complete(&self, _report: &PipelineReport) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
