use indicatif::{ProgressBar, ProgressStyle};
use space_fixer_core::{PipelineReport, PipelineState, ProgressReporter};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Single percentage bar for one agent run. The bar is created on the first
/// stage and cleared when the run completes.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    /// Remove the bar from the terminal, e.g. before prompting.
    pub fn clear(&self) {
        if let Some(pb) = self.guard().take() {
            pb.finish_and_clear();
        }
    }

    fn guard(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.bar.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        let mut guard = self.guard();
        let bar = guard.get_or_insert_with(new_bar);
        f(bar);
    }
}

fn new_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    let style = ProgressStyle::with_template(
        "  {spinner:.cyan} [{bar:30.cyan/dim}] {pos:>3}% {msg}",
    )
    .map(|s| s.progress_chars("━╸─").tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

impl ProgressReporter for CliReporter {
    fn on_stage(&self, state: PipelineState, status: &str) {
        if state == PipelineState::Error {
            self.with_bar(|pb| pb.abandon_with_message(status.to_string()));
            return;
        }
        self.with_bar(|pb| pb.set_message(status.to_string()));
    }

    fn on_progress(&self, percent: u8) {
        self.with_bar(|pb| pb.set_position(u64::from(percent)));
    }

    fn on_item(&self, name: &str, index: usize, total: usize) {
        self.with_bar(|pb| pb.set_message(format!("{} ({}/{})", name, index + 1, total)));
    }

    fn on_complete(&self, _report: &PipelineReport) {
        self.clear();
    }
}
