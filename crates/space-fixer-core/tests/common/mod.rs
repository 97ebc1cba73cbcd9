#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use image::{DynamicImage, Rgb, RgbImage};
use space_fixer_core::{
    CloudStorage, DeviceBridge, Error, FileQuery, RemoteFileRecord, Scope, Transcoder,
};
use walkdir::WalkDir;

/// A two-tone image: dark on the left half, light on the right.
pub fn split_image(width: u32, height: u32) -> DynamicImage {
    let img = RgbImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgb([20, 20, 20])
        } else {
            Rgb([235, 235, 235])
        }
    });
    DynamicImage::ImageRgb8(img)
}

/// Dark on the top half, light on the bottom.
pub fn banded_image(width: u32, height: u32) -> DynamicImage {
    let img = RgbImage::from_fn(width, height, |_, y| {
        if y < height / 2 {
            Rgb([20, 20, 20])
        } else {
            Rgb([235, 235, 235])
        }
    });
    DynamicImage::ImageRgb8(img)
}

pub fn dimensions_of(path: &Path) -> (u32, u32) {
    image::image_dimensions(path).unwrap()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCall {
    Delete(String),
    Create { name: String, parent: String },
    Update { id: String, name: String },
}

/// In-memory storage that records every mutating call.
#[derive(Default)]
pub struct RecordingStorage {
    pub records: Vec<(String, RemoteFileRecord)>,
    pub failing_names: HashSet<String>,
    pub calls: RefCell<Vec<StorageCall>>,
}

impl RecordingStorage {
    pub fn with_file(mut self, parent: &str, id: &str, name: &str) -> Self {
        self.records.push((
            parent.to_string(),
            RemoteFileRecord {
                id: id.to_string(),
                name: name.to_string(),
                size: 1,
                mime_type: "image/jpeg".to_string(),
                content_hash: Some(format!("hash-{}", id)),
            },
        ));
        self
    }

    pub fn with_sized_file(mut self, parent: &str, id: &str, name: &str, size: u64) -> Self {
        self = self.with_file(parent, id, name);
        if let Some((_, record)) = self.records.last_mut() {
            record.size = size;
        }
        self
    }

    pub fn failing_on(mut self, name: &str) -> Self {
        self.failing_names.insert(name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<StorageCall> {
        self.calls.borrow().clone()
    }

    fn file_name(source: &Path) -> String {
        source
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn check(&self, name: &str) -> Result<(), Error> {
        if self.failing_names.contains(name) {
            return Err(Error::Remote {
                status: 503,
                message: format!("{} rejected", name),
            });
        }
        Ok(())
    }
}

impl CloudStorage for RecordingStorage {
    fn list(&self, query: &FileQuery) -> Result<Vec<RemoteFileRecord>, Error> {
        Ok(self
            .records
            .iter()
            .filter(|(parent, _)| match &query.scope {
                Scope::EntireDrive => true,
                Scope::Folder(id) => parent == id,
            })
            .map(|(_, record)| record.clone())
            .collect())
    }

    fn get_media(&self, id: &str) -> Result<Box<dyn Read>, Error> {
        Ok(Box::new(Cursor::new(id.as_bytes().to_vec())))
    }

    fn delete(&self, id: &str) -> Result<(), Error> {
        self.calls.borrow_mut().push(StorageCall::Delete(id.to_string()));
        Ok(())
    }

    fn create(&self, name: &str, parent_id: &str, source: &Path) -> Result<String, Error> {
        self.check(&Self::file_name(source))?;
        self.calls.borrow_mut().push(StorageCall::Create {
            name: name.to_string(),
            parent: parent_id.to_string(),
        });
        Ok(format!("new-{}", name))
    }

    fn update(&self, id: &str, source: &Path) -> Result<(), Error> {
        let name = Self::file_name(source);
        self.check(&name)?;
        self.calls.borrow_mut().push(StorageCall::Update {
            id: id.to_string(),
            name,
        });
        Ok(())
    }
}

/// Copies instead of transcoding. Inputs whose name contains `broken` fail.
#[derive(Default)]
pub struct FakeTranscoder {
    pub rescaled: RefCell<Vec<(PathBuf, u32)>>,
}

impl Transcoder for FakeTranscoder {
    fn rescale_video(&self, input: &Path, output: &Path, width: u32) -> Result<(), Error> {
        if input.to_string_lossy().contains("broken") {
            fs::write(output, b"partial")?;
            return Err(Error::Transcode("Invalid data found when processing input".into()));
        }
        fs::copy(input, output)?;
        self.rescaled.borrow_mut().push((input.to_path_buf(), width));
        Ok(())
    }

    fn convert_still(&self, input: &Path, output: &Path) -> Result<(), Error> {
        if input.to_string_lossy().contains("broken") {
            return Err(Error::Transcode("unsupported codec".into()));
        }
        split_image(64, 32).save(output)?;
        Ok(())
    }
}

/// Serves pulls from a directory standing in for the phone's storage.
pub struct FakeBridge {
    pub device_root: PathBuf,
    pub shell_calls: RefCell<Vec<Vec<String>>>,
}

impl FakeBridge {
    pub fn new(device_root: impl Into<PathBuf>) -> Self {
        Self {
            device_root: device_root.into(),
            shell_calls: RefCell::new(Vec::new()),
        }
    }

    fn device_path(&self, remote: &str) -> PathBuf {
        self.device_root.join(remote.trim_start_matches('/'))
    }
}

impl DeviceBridge for FakeBridge {
    fn pull(&self, remote: &str, local: &Path) -> Result<(), Error> {
        let source = self.device_path(remote);
        if !source.is_dir() {
            return Err(Error::DeviceBridge(format!(
                "remote object '{}' does not exist",
                remote
            )));
        }
        fs::create_dir_all(local)?;
        for entry in WalkDir::new(&source).min_depth(1) {
            let entry = entry.map_err(|e| Error::DeviceBridge(e.to_string()))?;
            let relative = entry.path().strip_prefix(&source).unwrap();
            let dest = local.join(relative);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&dest)?;
                continue;
            }
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &dest)?;
            let modified = entry.metadata().map_err(|e| Error::DeviceBridge(e.to_string()))?.modified()?;
            set_modified(&dest, modified);
        }
        Ok(())
    }

    fn shell(&self, args: &[&str]) -> Result<String, Error> {
        self.shell_calls
            .borrow_mut()
            .push(args.iter().map(|a| a.to_string()).collect());
        Ok(String::new())
    }
}

pub fn set_modified(path: &Path, time: SystemTime) {
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}
