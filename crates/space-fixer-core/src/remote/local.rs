use super::{CloudStorage, FileFilter, FileQuery, Scope};
use crate::error::Error;
use crate::hasher;
use crate::model::{mime_for_path, RemoteFileRecord, FOLDER_MIME_TYPE};
use glob::Pattern;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error};
use walkdir::WalkDir;

/// Presents a local directory tree through the cloud storage contract.
///
/// Ids are paths relative to the root with `/` separators; the root folder's
/// id is the empty string. Checksums are XxHash64 of the file content.
pub struct LocalDirStore {
    root: PathBuf,
    ignore_patterns: Vec<Pattern>,
}

impl LocalDirStore {
    pub fn new(root: impl Into<PathBuf>, ignore_globs: &[String]) -> Result<Self, Error> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::Setup(format!(
                "local root '{}' is not a directory",
                root.display()
            )));
        }

        let ignore_patterns: Vec<Pattern> = ignore_globs
            .iter()
            .filter_map(|glob| match Pattern::new(glob) {
                Ok(p) => Some(p),
                Err(e) => {
                    error!("Invalid glob pattern '{}': {}", glob, e);
                    None
                }
            })
            .collect();

        Ok(Self {
            root,
            ignore_patterns,
        })
    }

    fn resolve(&self, id: &str) -> Result<PathBuf, Error> {
        let relative = Path::new(id);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(Error::Other(format!("invalid local id '{}'", id)));
        }
        Ok(self.root.join(relative))
    }

    fn id_for(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn is_ignored(&self, path: &Path) -> bool {
        self.ignore_patterns
            .iter()
            .any(|pattern| pattern.matches_path(path))
    }

    fn record_for(&self, path: &Path, is_dir: bool) -> Result<RemoteFileRecord, Error> {
        let name = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        if is_dir {
            return Ok(RemoteFileRecord {
                id: self.id_for(path),
                name,
                size: 0,
                mime_type: FOLDER_MIME_TYPE.to_string(),
                content_hash: None,
            });
        }
        let metadata = fs::metadata(path)?;
        Ok(RemoteFileRecord {
            id: self.id_for(path),
            name,
            size: metadata.len(),
            mime_type: mime_for_path(path).essence_str().to_string(),
            content_hash: Some(hasher::content_checksum(path)?),
        })
    }
}

impl CloudStorage for LocalDirStore {
    fn list(&self, query: &FileQuery) -> Result<Vec<RemoteFileRecord>, Error> {
        let (base, walker) = match &query.scope {
            Scope::EntireDrive => (self.root.clone(), WalkDir::new(&self.root)),
            Scope::Folder(id) => {
                let base = self.resolve(id)?;
                let walker = WalkDir::new(&base).max_depth(1);
                (base, walker)
            }
        };
        if !base.is_dir() {
            return Err(Error::Other(format!(
                "folder '{}' does not exist",
                base.display()
            )));
        }

        let mut records = Vec::new();
        let entries = walker
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.is_ignored(entry.path()));
        for entry in entries {
            let entry = entry.map_err(|e| Error::Other(format!("walk error: {}", e)))?;
            let is_dir = entry.file_type().is_dir();
            if entry.file_type().is_symlink() {
                continue;
            }
            let keep = match &query.filter {
                FileFilter::Any => true,
                FileFilter::NotFolder => !is_dir,
                FileFilter::MimePrefix(prefix) => {
                    !is_dir && mime_for_path(entry.path()).essence_str().starts_with(prefix.as_str())
                }
            };
            if keep {
                records.push(self.record_for(entry.path(), is_dir)?);
            }
        }

        debug!("Listed {} local records under {}", records.len(), base.display());
        Ok(records)
    }

    fn get_media(&self, id: &str) -> Result<Box<dyn Read>, Error> {
        Ok(Box::new(File::open(self.resolve(id)?)?))
    }

    fn delete(&self, id: &str) -> Result<(), Error> {
        fs::remove_file(self.resolve(id)?)?;
        Ok(())
    }

    fn create(&self, name: &str, parent_id: &str, source: &Path) -> Result<String, Error> {
        let dest = self.resolve(parent_id)?.join(name);
        fs::copy(source, &dest)?;
        Ok(self.id_for(&dest))
    }

    fn update(&self, id: &str, source: &Path) -> Result<(), Error> {
        fs::copy(source, self.resolve(id)?)?;
        Ok(())
    }
}
