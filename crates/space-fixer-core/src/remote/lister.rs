use super::{CloudStorage, FileFilter, FileQuery, Scope};
use crate::error::Error;
use crate::model::RemoteFileRecord;
use tracing::debug;

pub fn list_images(
    storage: &dyn CloudStorage,
    scope: &Scope,
) -> Result<Vec<RemoteFileRecord>, Error> {
    let query = FileQuery::new(scope.clone(), FileFilter::MimePrefix("image/".to_string()));
    let records = storage.list(&query)?;
    debug!("{} image records listed in {:?}", records.len(), scope);
    Ok(records)
}

/// Non-folder files strictly larger than `min_size` bytes.
///
/// The remote query language has no numeric filter on size, so everything is
/// listed and the threshold is applied here.
pub fn list_large_files(
    storage: &dyn CloudStorage,
    scope: &Scope,
    min_size: u64,
) -> Result<Vec<RemoteFileRecord>, Error> {
    let query = FileQuery::new(scope.clone(), FileFilter::NotFolder);
    let records = storage.list(&query)?;
    let listed = records.len();
    let large: Vec<RemoteFileRecord> = records
        .into_iter()
        .filter(|r| !r.is_folder() && r.size > min_size)
        .collect();
    debug!(
        "{} of {} listed files exceed {} bytes",
        large.len(),
        listed,
        min_size
    );
    Ok(large)
}

pub fn list_folder(
    storage: &dyn CloudStorage,
    folder_id: &str,
) -> Result<Vec<RemoteFileRecord>, Error> {
    let query = FileQuery::new(Scope::Folder(folder_id.to_string()), FileFilter::Any);
    storage.list(&query)
}
