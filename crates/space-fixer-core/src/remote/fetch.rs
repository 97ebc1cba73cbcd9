use super::CloudStorage;
use crate::error::Error;
use crate::model::RemoteFileRecord;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Downloads remote objects into one destination directory.
///
/// Remote names are not unique, so each fetched file gets a name that is free
/// both on disk and among the names already handed out by this fetcher.
pub struct Fetcher {
    dest_dir: PathBuf,
    used_names: HashSet<String>,
}

impl Fetcher {
    pub fn new(dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            dest_dir: dest_dir.into(),
            used_names: HashSet::new(),
        }
    }

    pub fn fetch(
        &mut self,
        storage: &dyn CloudStorage,
        record: &RemoteFileRecord,
    ) -> Result<PathBuf, Error> {
        let name = self.claim_name(&record.name);
        let dest = self.dest_dir.join(&name);
        if let Err(e) = fetch_to(storage, &record.id, &dest) {
            self.used_names.remove(&name);
            return Err(e);
        }
        debug!("Fetched {} ({} bytes) to {}", record.name, record.size, dest.display());
        Ok(dest)
    }

    fn claim_name(&mut self, remote_name: &str) -> String {
        let sanitized = sanitize_file_name(remote_name);
        let mut candidate = sanitized.clone();
        let mut n = 1;
        while self.used_names.contains(&candidate) || self.dest_dir.join(&candidate).exists() {
            candidate = numbered_name(&sanitized, n);
            n += 1;
        }
        self.used_names.insert(candidate.clone());
        candidate
    }
}

/// Stream the media of `id` into `dest`. A partial file is removed on failure.
pub fn fetch_to(storage: &dyn CloudStorage, id: &str, dest: &Path) -> Result<(), Error> {
    let mut reader = storage.get_media(id)?;
    let result = File::create(dest).and_then(|file| {
        let mut writer = BufWriter::new(file);
        io::copy(&mut reader, &mut writer)?;
        writer.flush()
    });
    if let Err(e) = result {
        trace!("Removing partial download {}", dest.display());
        let _ = fs::remove_file(dest);
        return Err(e.into());
    }
    Ok(())
}

/// A path in `dir` named `file_name`, or `stem (n).ext` when that is taken.
pub fn unique_path(dir: &Path, file_name: &str) -> PathBuf {
    let mut candidate = dir.join(file_name);
    let mut n = 1;
    while candidate.exists() {
        candidate = dir.join(numbered_name(file_name, n));
        n += 1;
    }
    candidate
}

pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    match cleaned.trim() {
        "" | "." | ".." => "unnamed".to_string(),
        trimmed => trimmed.to_string(),
    }
}

fn numbered_name(name: &str, n: usize) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{} ({}).{}", stem, n, ext),
        _ => format!("{} ({})", name, n),
    }
}
