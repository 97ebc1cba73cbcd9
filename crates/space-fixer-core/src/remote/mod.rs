//! Narrow cloud storage contract the agents depend on, plus the lister and
//! fetcher built on top of it.

pub mod drive;
pub mod fetch;
pub mod lister;
pub mod local;

use crate::error::Error;
use crate::model::RemoteFileRecord;
use std::io::Read;
use std::path::Path;

pub use drive::DriveClient;
pub use fetch::Fetcher;
pub use lister::{list_folder, list_images, list_large_files};
pub use local::LocalDirStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    EntireDrive,
    Folder(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileFilter {
    Any,
    MimePrefix(String),
    NotFolder,
}

/// A listing request. Trashed files are excluded unless asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileQuery {
    pub scope: Scope,
    pub filter: FileFilter,
    pub include_trashed: bool,
}

impl FileQuery {
    pub fn new(scope: Scope, filter: FileFilter) -> Self {
        Self {
            scope,
            filter,
            include_trashed: false,
        }
    }
}

pub trait CloudStorage {
    /// All records matching `query`, across every result page.
    fn list(&self, query: &FileQuery) -> Result<Vec<RemoteFileRecord>, Error>;

    fn get_media(&self, id: &str) -> Result<Box<dyn Read>, Error>;

    fn delete(&self, id: &str) -> Result<(), Error>;

    /// Create `name` inside `parent_id` with the bytes of `source`. Returns the new id.
    fn create(&self, name: &str, parent_id: &str, source: &Path) -> Result<String, Error>;

    /// Replace the content of an existing object with the bytes of `source`.
    fn update(&self, id: &str, source: &Path) -> Result<(), Error>;
}
