use crate::error::Error;
use crate::log_sink::RunLog;
use crate::model::{file_name_lossy, ItemError};
use crate::remote::{list_folder, CloudStorage};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Remote objects created.
    pub uploaded: usize,
    /// Remote objects overwritten in place.
    pub updated: usize,
    pub failed: usize,
    pub errors: Vec<ItemError>,
}

/// Push every regular file of `local_dir` into the remote folder, matching by
/// name: an existing remote object of the same name is overwritten, anything
/// else is created.
///
/// The folder is listed once up front. When several remote objects share a
/// name the first listed one is updated. Per-file failures are collected and
/// the loop carries on; only the listing itself is fatal.
pub fn reconcile_folder(
    storage: &dyn CloudStorage,
    folder_id: &str,
    local_dir: &Path,
    log: &mut RunLog,
) -> Result<ReconcileSummary, Error> {
    let mut remote_ids: HashMap<String, String> = HashMap::new();
    for record in list_folder(storage, folder_id)? {
        if record.is_folder() {
            continue;
        }
        remote_ids.entry(record.name).or_insert(record.id);
    }
    debug!("Destination folder holds {} named files", remote_ids.len());

    let mut summary = ReconcileSummary::default();
    for path in local_files(local_dir)? {
        let name = file_name_lossy(&path);
        let result = match remote_ids.get(&name) {
            Some(id) => storage.update(id, &path).map(|_| false),
            None => storage.create(&name, folder_id, &path).map(|_| true),
        };
        match result {
            Ok(true) => {
                summary.uploaded += 1;
                log.info(format!("Uploaded {}", name));
            }
            Ok(false) => {
                summary.updated += 1;
                log.info(format!("Updated {}", name));
            }
            Err(e) => {
                summary.failed += 1;
                log.error(format!("Failed to sync {}: {}", name, e));
                summary.errors.push(ItemError {
                    item_name: name,
                    message: e.to_string(),
                });
            }
        }
    }
    Ok(summary)
}

/// Regular files directly inside `dir`, sorted by file name.
fn local_files(dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort_by_key(|p| file_name_lossy(p));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::LocalDirStore;
    use tempfile::tempdir;

    #[test]
    fn test_reconcile_into_local_store() {
        let remote = tempdir().unwrap();
        let local = tempdir().unwrap();
        fs::create_dir(remote.path().join("up")).unwrap();
        fs::write(remote.path().join("up/x.jpg"), "old").unwrap();
        fs::write(local.path().join("x.jpg"), "new-x").unwrap();
        fs::write(local.path().join("y.jpg"), "new-y").unwrap();
        fs::create_dir(local.path().join("subdir")).unwrap();

        let store = LocalDirStore::new(remote.path(), &[]).unwrap();
        let mut log = RunLog::new();
        let summary = reconcile_folder(&store, "up", local.path(), &mut log).unwrap();

        assert_eq!(summary.uploaded, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(fs::read_to_string(remote.path().join("up/x.jpg")).unwrap(), "new-x");
        assert_eq!(fs::read_to_string(remote.path().join("up/y.jpg")).unwrap(), "new-y");
        assert_eq!(log.entries().len(), 2);
    }

    #[test]
    fn test_missing_destination_is_fatal() {
        let remote = tempdir().unwrap();
        let local = tempdir().unwrap();
        let store = LocalDirStore::new(remote.path(), &[]).unwrap();
        let mut log = RunLog::new();
        assert!(reconcile_folder(&store, "nope", local.path(), &mut log).is_err());
    }
}
