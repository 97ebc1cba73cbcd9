use super::{PipelineRun, PipelineState};
use crate::dedupe::{find_duplicates, Partition};
use crate::error::Error;
use crate::model::{AgentKind, PipelineReport};
use crate::plan::{execute_deletion_plan, DeletionPlan};
use crate::progress::ProgressReporter;
use crate::remote::{list_images, CloudStorage, Scope};

/// `remove-duplicates`, split at the confirmation point.
///
/// [`DuplicateCleanup::plan`] lists and partitions without touching
/// anything; the caller inspects [`DuplicateCleanup::deletion_plan`] and then
/// calls [`DuplicateCleanup::execute`] or [`DuplicateCleanup::abandon`].
pub struct DuplicateCleanup<'a> {
    run: PipelineRun<'a>,
    plan: DeletionPlan,
    failure: Option<Error>,
}

impl<'a> DuplicateCleanup<'a> {
    pub fn plan(
        storage: &dyn CloudStorage,
        scope: &Scope,
        reporter: &'a dyn ProgressReporter,
    ) -> Self {
        let mut run = PipelineRun::new(AgentKind::RemoveDuplicates, reporter);
        run.advance(PipelineState::Start, 0, "Starting duplicate scan");
        match build_plan(&mut run, storage, scope) {
            Ok(plan) => Self {
                run,
                plan,
                failure: None,
            },
            Err(e) => Self {
                run,
                plan: DeletionPlan::new(),
                failure: Some(e),
            },
        }
    }

    pub fn deletion_plan(&self) -> &DeletionPlan {
        &self.plan
    }

    /// True when listing failed; `execute` will then only report the error.
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn execute(mut self, storage: &dyn CloudStorage) -> PipelineReport {
        if let Some(e) = self.failure.take() {
            return self.run.finish(Err(e));
        }
        if self.plan.is_empty() {
            self.run.log().info("No duplicates found");
            return self.run.finish(Ok(()));
        }

        self.run.advance(
            PipelineState::DeleteRemote,
            60,
            &format!("Removing {} duplicates", self.plan.len()),
        );
        let outcome = execute_deletion_plan(storage, &self.plan, self.run.log());

        let report = self.run.report_mut();
        report.items_deleted += outcome.deleted;
        report.items_failed += outcome.failed;
        report.media.duplicates_removed += outcome.deleted;
        report.bytes_reclaimed += outcome.bytes_reclaimed;
        report.errors.extend(outcome.errors);

        self.run.log().info(format!(
            "Cleanup complete. {} files deleted, {} failed",
            outcome.deleted, outcome.failed
        ));
        self.run.finish(Ok(()))
    }

    /// Finish without deleting anything.
    pub fn abandon(mut self) -> PipelineReport {
        if let Some(e) = self.failure.take() {
            return self.run.finish(Err(e));
        }
        if !self.plan.is_empty() {
            self.run
                .log()
                .warn(format!("Deletion of {} duplicates declined", self.plan.len()));
        }
        self.run.finish(Ok(()))
    }
}

fn build_plan(
    run: &mut PipelineRun<'_>,
    storage: &dyn CloudStorage,
    scope: &Scope,
) -> Result<DeletionPlan, Error> {
    run.advance(PipelineState::ListCandidates, 10, "Scanning for images");
    let records = list_images(storage, scope)?;
    run.report_mut().items_found = records.len();
    run.log().info(format!("Total images found: {}", records.len()));

    run.advance(PipelineState::DedupeAndNormalize, 40, "Comparing content checksums");
    let Partition {
        canonical,
        duplicates,
        unsigned,
    } = find_duplicates(&records);
    for record in &unsigned {
        run.item_skipped(&record.name, "no content checksum");
    }
    run.report_mut().items_processed += canonical.len() + duplicates.len();
    run.log().info(format!("Duplicate images found: {}", duplicates.len()));

    let plan = DeletionPlan::from_duplicates(&duplicates);
    run.advance(
        PipelineState::ConfirmDeletion,
        50,
        &format!(
            "{} duplicates ({} bytes) awaiting confirmation",
            plan.len(),
            plan.total_bytes()
        ),
    );
    Ok(plan)
}

/// Run the whole agent, deleting only when `confirmed`.
pub fn run(
    storage: &dyn CloudStorage,
    scope: &Scope,
    confirmed: bool,
    reporter: &dyn ProgressReporter,
) -> PipelineReport {
    let cleanup = DuplicateCleanup::plan(storage, scope, reporter);
    if confirmed {
        cleanup.execute(storage)
    } else {
        cleanup.abandon()
    }
}
