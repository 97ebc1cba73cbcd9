use crate::log_sink::RunLog;
use crate::model::{ItemError, RemoteFileRecord};
use crate::remote::CloudStorage;
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionReason {
    /// Same content signature as an earlier canonical record.
    Duplicate,
    /// Large file already copied to removable storage.
    Archived,
}

impl fmt::Display for DeletionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeletionReason::Duplicate => f.write_str("duplicate"),
            DeletionReason::Archived => f.write_str("archived"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDeletion {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub reason: DeletionReason,
}

/// Remote objects marked for deletion. Nothing is removed until the plan is
/// handed to [`execute_deletion_plan`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionPlan {
    entries: Vec<PlannedDeletion>,
}

impl DeletionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_duplicates(records: &[RemoteFileRecord]) -> Self {
        Self::from_records(records, DeletionReason::Duplicate)
    }

    pub fn from_archived(records: &[RemoteFileRecord]) -> Self {
        Self::from_records(records, DeletionReason::Archived)
    }

    fn from_records(records: &[RemoteFileRecord], reason: DeletionReason) -> Self {
        let mut plan = Self::new();
        for record in records {
            plan.mark(record, reason);
        }
        plan
    }

    pub fn mark(&mut self, record: &RemoteFileRecord, reason: DeletionReason) {
        if self.entries.iter().any(|e| e.id == record.id) {
            return;
        }
        self.entries.push(PlannedDeletion {
            id: record.id.clone(),
            name: record.name.clone(),
            size: record.size,
            reason,
        });
    }

    pub fn entries(&self) -> &[PlannedDeletion] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionOutcome {
    pub deleted: usize,
    pub failed: usize,
    pub bytes_reclaimed: u64,
    pub errors: Vec<ItemError>,
}

/// Delete every planned object. A failed deletion is recorded and the rest
/// of the plan still runs.
pub fn execute_deletion_plan(
    storage: &dyn CloudStorage,
    plan: &DeletionPlan,
    log: &mut RunLog,
) -> DeletionOutcome {
    let mut outcome = DeletionOutcome::default();

    for entry in plan.entries() {
        match storage.delete(&entry.id) {
            Ok(()) => {
                outcome.deleted += 1;
                outcome.bytes_reclaimed += entry.size;
                log.info(format!("Deleted {} ({}, id {})", entry.name, entry.reason, entry.id));
            }
            Err(e) => {
                outcome.failed += 1;
                log.error(format!("Failed to delete {} (id {}): {}", entry.name, entry.id, e));
                outcome.errors.push(ItemError {
                    item_name: entry.name.clone(),
                    message: e.to_string(),
                });
            }
        }
    }

    info!(
        "Deletion plan executed: {} deleted, {} errors",
        outcome.deleted, outcome.failed
    );
    outcome
}
