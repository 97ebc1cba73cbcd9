//! Agent drivers. Each agent is a linear sequence of [`PipelineState`]s driven
//! through a [`PipelineRun`], which owns the report under construction and
//! the run log, and forwards progress to a [`ProgressReporter`].

pub mod duplicates;
pub mod heavy_files;
pub mod mobile_backup;

use crate::error::Error;
use crate::log_sink::RunLog;
use crate::model::{AgentKind, ItemOutcome, MediaKind, PipelineReport};
use crate::progress::ProgressReporter;
use std::fmt;

pub use duplicates::DuplicateCleanup;
pub use heavy_files::HeavyFilesOptions;
pub use mobile_backup::MobileBackupOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    ListCandidates,
    FetchAll,
    DedupeAndNormalize,
    ListSecondaryCandidates,
    FetchSecondary,
    ConfirmDeletion,
    DeleteRemote,
    /// Local cleanup: old database files, discarded folders.
    PruneLocal,
    ReconcileUpload,
    Done,
    Error,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Start => "start",
            PipelineState::ListCandidates => "list-candidates",
            PipelineState::FetchAll => "fetch-all",
            PipelineState::DedupeAndNormalize => "dedupe-and-normalize",
            PipelineState::ListSecondaryCandidates => "list-secondary-candidates",
            PipelineState::FetchSecondary => "fetch-secondary",
            PipelineState::ConfirmDeletion => "confirm-deletion",
            PipelineState::DeleteRemote => "delete-remote",
            PipelineState::PruneLocal => "prune-local",
            PipelineState::ReconcileUpload => "reconcile-upload",
            PipelineState::Done => "done",
            PipelineState::Error => "error",
        };
        f.pad(name)
    }
}

pub struct PipelineRun<'a> {
    report: PipelineReport,
    log: RunLog,
    reporter: &'a dyn ProgressReporter,
}

impl<'a> PipelineRun<'a> {
    pub fn new(agent: AgentKind, reporter: &'a dyn ProgressReporter) -> Self {
        Self {
            report: PipelineReport::new(agent),
            log: RunLog::new(),
            reporter,
        }
    }

    /// Enter `state`, logging `status` and emitting `percent`.
    pub fn advance(&mut self, state: PipelineState, percent: u8, status: &str) {
        self.report.state = state;
        self.log.info(format!("[{}] {}", state, status));
        self.reporter.on_stage(state, status);
        self.reporter.on_progress(percent.min(100));
    }

    pub fn progress(&self, percent: u8) {
        self.reporter.on_progress(percent.min(100));
    }

    /// Progress for item `index` (zero based) of `total` inside the band
    /// `base..base + span`.
    pub fn item_progress(&self, name: &str, index: usize, total: usize, base: u8, span: u8) {
        self.reporter.on_item(name, index, total);
        let done = (usize::from(span) * (index + 1)) / total.max(1);
        self.progress(base.saturating_add(done.min(usize::from(span)) as u8));
    }

    pub fn log(&mut self) -> &mut RunLog {
        &mut self.log
    }

    pub fn report(&self) -> &PipelineReport {
        &self.report
    }

    pub fn report_mut(&mut self) -> &mut PipelineReport {
        &mut self.report
    }

    pub fn item_skipped(&mut self, name: &str, reason: &str) {
        self.report.items_skipped += 1;
        self.report.record_error(name, reason);
        self.log.warn(format!("Skipped {}: {}", name, reason));
    }

    pub fn item_failed(&mut self, name: &str, reason: &str) {
        self.report.items_failed += 1;
        self.report.record_error(name, reason);
        self.log.error(format!("Failed {}: {}", name, reason));
    }

    /// Fold a normalizer outcome into the item and media counters.
    pub fn record_media(&mut self, kind: MediaKind, outcome: &ItemOutcome, name: &str) {
        let media = &mut self.report.media;
        match (outcome, kind) {
            (ItemOutcome::Processed, MediaKind::Image) => media.images_resized += 1,
            (ItemOutcome::Processed, MediaKind::Video) => media.videos_resized += 1,
            (ItemOutcome::Skipped(_), MediaKind::Image) => media.images_skipped += 1,
            (ItemOutcome::Skipped(_), MediaKind::Video) => media.videos_skipped += 1,
            (ItemOutcome::Failed(_), _) => {}
        }
        match outcome {
            ItemOutcome::Processed => self.report.items_processed += 1,
            ItemOutcome::Skipped(reason) => self.item_skipped(name, reason),
            ItemOutcome::Failed(reason) => self.item_failed(name, reason),
        }
    }

    /// Close the run: `Done` on success, `Error` with the message recorded
    /// otherwise. The log is moved into the report.
    pub fn finish(mut self, result: Result<(), Error>) -> PipelineReport {
        match result {
            Ok(()) => {
                self.advance(PipelineState::Done, 100, "Completed");
            }
            Err(e) => {
                let message = e.to_string();
                self.report.state = PipelineState::Error;
                self.log.error(format!("[{}] {}", PipelineState::Error, message));
                let agent = self.report.agent.to_string();
                self.report.record_error(agent, message.clone());
                self.reporter.on_stage(PipelineState::Error, &message);
            }
        }
        self.report.log = self.log.into_entries();
        self.reporter.on_complete(&self.report);
        self.report
    }
}
