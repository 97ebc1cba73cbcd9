use crate::log_sink::LogEntry;
use crate::pipeline::PipelineState;
use std::fmt;
use std::path::{Path, PathBuf};

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Metadata for one remote object at listing time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileRecord {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub content_hash: Option<String>,
}

impl RemoteFileRecord {
    /// The content signature, if the provider supplied a non-empty one.
    pub fn signature(&self) -> Option<&str> {
        self.content_hash.as_deref().filter(|h| !h.is_empty())
    }

    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

/// A fetched or pulled media file in the working set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMediaItem {
    pub path: PathBuf,
    pub original_name: String,
    pub kind: MediaKind,
}

impl LocalMediaItem {
    pub fn new(path: PathBuf, kind: MediaKind) -> Self {
        let original_name = file_name_lossy(&path);
        Self {
            path,
            original_name,
            kind,
        }
    }

    pub fn file_name(&self) -> String {
        file_name_lossy(&self.path)
    }
}

/// Per-item result, aggregated by the pipeline driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Processed,
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaTally {
    pub images_resized: usize,
    pub images_skipped: usize,
    pub videos_resized: usize,
    pub videos_skipped: usize,
    pub duplicates_removed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemError {
    pub item_name: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    RemoveDuplicates,
    ArchiveHeavy,
    ShrinkMobileBackup,
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgentKind::RemoveDuplicates => "remove-duplicates",
            AgentKind::ArchiveHeavy => "archive-heavy",
            AgentKind::ShrinkMobileBackup => "shrink-mobile-backup",
        };
        f.write_str(name)
    }
}

/// Final result of one agent run. Never persisted.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub agent: AgentKind,
    pub state: PipelineState,
    pub items_found: usize,
    pub items_processed: usize,
    pub items_skipped: usize,
    pub items_failed: usize,
    pub items_deleted: usize,
    pub items_uploaded: usize,
    pub items_updated: usize,
    pub bytes_reclaimed: u64,
    pub media: MediaTally,
    pub errors: Vec<ItemError>,
    pub log: Vec<LogEntry>,
}

impl PipelineReport {
    pub fn new(agent: AgentKind) -> Self {
        Self {
            agent,
            state: PipelineState::Start,
            items_found: 0,
            items_processed: 0,
            items_skipped: 0,
            items_failed: 0,
            items_deleted: 0,
            items_uploaded: 0,
            items_updated: 0,
            bytes_reclaimed: 0,
            media: MediaTally::default(),
            errors: Vec::new(),
            log: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.state == PipelineState::Done
    }

    pub fn record_error(&mut self, item_name: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ItemError {
            item_name: item_name.into(),
            message: message.into(),
        });
    }
}

pub fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

pub fn file_name_lossy(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Content type used when uploading a local file.
pub fn mime_for_path(path: &Path) -> mime::Mime {
    match lowercase_extension(path).as_deref() {
        Some("jpg") | Some("jpeg") => mime::IMAGE_JPEG,
        Some("png") => mime::IMAGE_PNG,
        Some("gif") => mime::IMAGE_GIF,
        Some("webp") => "image/webp".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        Some("heic") | Some("heif") => "image/heic".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        Some("mp4") => "video/mp4".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        Some("3gp") => "video/3gpp".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        Some("avi") => "video/x-msvideo".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        Some("txt") => mime::TEXT_PLAIN,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(hash: Option<&str>) -> RemoteFileRecord {
        RemoteFileRecord {
            id: "1".to_string(),
            name: "a.jpg".to_string(),
            size: 10,
            mime_type: "image/jpeg".to_string(),
            content_hash: hash.map(str::to_string),
        }
    }

    #[test]
    fn test_empty_checksum_is_not_a_signature() {
        assert_eq!(record(Some("")).signature(), None);
        assert_eq!(record(None).signature(), None);
        assert_eq!(record(Some("abc")).signature(), Some("abc"));
    }

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(Path::new("x.jpeg")), mime::IMAGE_JPEG);
        assert_eq!(mime_for_path(Path::new("x.mp4")).essence_str(), "video/mp4");
        assert_eq!(mime_for_path(Path::new("x.bin")), mime::APPLICATION_OCTET_STREAM);
    }
}
