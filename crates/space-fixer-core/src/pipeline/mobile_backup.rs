//! `shrink-mobile-backup`: pull a messaging app's databases and media off the
//! phone into a dated local folder, prune old database backups, downscale
//! images and videos, and drop unwanted media folders.

use super::{PipelineRun, PipelineState};
use crate::config::AppConfig;
use crate::device::DeviceBridge;
use crate::error::Error;
use crate::model::{file_name_lossy, lowercase_extension, AgentKind, LocalMediaItem, MediaKind, PipelineReport};
use crate::normalize::{MediaNormalizer, NormalizeSettings, Transcoder};
use crate::progress::ProgressReporter;
use chrono::{DateTime, Duration, Utc};
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct MobileBackupOptions {
    pub backup_parent: PathBuf,
    pub backup_dir_prefix: String,
    pub device_db_path: String,
    pub device_media_path: String,
    pub database_extension: String,
    pub database_retention_days: i64,
    pub delete_device_databases: bool,
    pub media_folders: Vec<String>,
    pub resize_folders: Vec<String>,
    pub discard_folders: Vec<String>,
    pub image_extensions: Vec<String>,
    pub video_extensions: Vec<String>,
    pub resize_width: u32,
    pub quality: u8,
}

impl MobileBackupOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        let mobile = &config.mobile;
        Self {
            backup_parent: PathBuf::from(&mobile.backup_parent),
            backup_dir_prefix: mobile.backup_dir_prefix.clone(),
            device_db_path: mobile.device_db_path.clone(),
            device_media_path: mobile.device_media_path.clone(),
            database_extension: mobile.database_extension.clone(),
            database_retention_days: mobile.database_retention_days,
            delete_device_databases: mobile.delete_device_databases,
            media_folders: mobile.media_folders.clone(),
            resize_folders: mobile.resize_folders.clone(),
            discard_folders: mobile.discard_folders.clone(),
            image_extensions: mobile.image_extensions.clone(),
            video_extensions: mobile.video_extensions.clone(),
            resize_width: mobile.resize_width,
            quality: config.images.quality,
        }
    }

    /// `<backup_parent>/<prefix><YYYY-MM-DD>`
    pub fn backup_root(&self) -> PathBuf {
        let today = chrono::Local::now().format("%Y-%m-%d");
        self.backup_parent
            .join(format!("{}{}", self.backup_dir_prefix, today))
    }

    fn media_kind(&self, path: &Path) -> Option<MediaKind> {
        let ext = lowercase_extension(path)?;
        let listed = |list: &[String]| {
            list.iter()
                .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(&ext))
        };
        if listed(&self.image_extensions) {
            Some(MediaKind::Image)
        } else if listed(&self.video_extensions) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }
}

pub fn run(
    bridge: &dyn DeviceBridge,
    transcoder: &dyn Transcoder,
    options: &MobileBackupOptions,
    reporter: &dyn ProgressReporter,
) -> PipelineReport {
    let mut run = PipelineRun::new(AgentKind::ShrinkMobileBackup, reporter);
    let result = execute(&mut run, bridge, transcoder, options);
    run.finish(result)
}

fn execute(
    run: &mut PipelineRun<'_>,
    bridge: &dyn DeviceBridge,
    transcoder: &dyn Transcoder,
    options: &MobileBackupOptions,
) -> Result<(), Error> {
    run.advance(PipelineState::Start, 5, "Creating backup folder");
    if !options.backup_parent.is_dir() {
        return Err(Error::Setup(format!(
            "backup parent '{}' does not exist",
            options.backup_parent.display()
        )));
    }
    let root = options.backup_root();
    let db_dir = root.join("Backups").join("Databases");
    let media_dir = root.join("Media");
    fs::create_dir_all(&db_dir)?;
    fs::create_dir_all(&media_dir)?;
    run.log().info(format!("Backup folder: {}", root.display()));

    run.advance(PipelineState::FetchAll, 10, "Pulling databases");
    if let Err(e) = bridge.pull(&options.device_db_path, &db_dir) {
        run.item_failed("Databases", &e.to_string());
    }

    run.advance(PipelineState::PruneLocal, 20, "Pruning old database backups");
    prune_databases(run, bridge, options, &db_dir)?;

    run.advance(PipelineState::FetchSecondary, 30, "Pulling media folders");
    let total = options.media_folders.len();
    let mut pulled = 0;
    for (index, folder) in options.media_folders.iter().enumerate() {
        let remote = format!("{}/{}", options.device_media_path.trim_end_matches('/'), folder);
        run.log().info(format!("Pulling {}", folder));
        match bridge.pull(&remote, &media_dir.join(folder)) {
            Ok(()) => pulled += 1,
            Err(e) => run.item_failed(folder, &e.to_string()),
        }
        run.item_progress(folder, index, total, 30, 20);
    }

    if total > 0 && pulled == 0 {
        return Err(Error::Setup(format!(
            "no media folder could be pulled from '{}'",
            options.device_media_path
        )));
    }

    run.advance(PipelineState::ListCandidates, 50, "Counting media files");
    for (folder, count) in count_media_folders(&media_dir)? {
        run.report_mut().items_found += count;
        run.log().info(format!("Found {} files in {}", count, folder));
    }

    run.advance(PipelineState::DedupeAndNormalize, 55, "Resizing media");
    let settings = NormalizeSettings {
        max_width: options.resize_width,
        quality: options.quality,
        reencode_within_limit: false,
    };
    let normalizer = MediaNormalizer::new(settings, transcoder);
    let items = collect_resize_candidates(options, &media_dir)?;
    for (index, mut item) in items.iter().cloned().enumerate() {
        let name = item.original_name.clone();
        let outcome = normalizer.normalize(&mut item);
        run.record_media(item.kind, &outcome, &name);
        run.item_progress(&name, index, items.len(), 55, 35);
    }
    let media = &run.report().media;
    let summary = format!(
        "Resized {} images, {} videos. Skipped {} images, {} videos",
        media.images_resized, media.videos_resized, media.images_skipped, media.videos_skipped
    );
    run.log().info(summary);

    run.advance(PipelineState::PruneLocal, 90, "Deleting unwanted folders");
    for folder in &options.discard_folders {
        if !is_plain_name(folder) {
            run.item_skipped(folder, "not a plain folder name");
            continue;
        }
        let path = media_dir.join(folder);
        if !path.is_dir() {
            continue;
        }
        match fs::remove_dir_all(&path) {
            Ok(()) => run.log().info(format!("Deleted folder {}", folder)),
            Err(e) => run.item_failed(folder, &e.to_string()),
        }
    }

    run.log().info(format!("Backup completed: {}", root.display()));
    Ok(())
}

/// Remove local database files older than the retention window, and their
/// device copies when configured.
fn prune_databases(
    run: &mut PipelineRun<'_>,
    bridge: &dyn DeviceBridge,
    options: &MobileBackupOptions,
    db_dir: &Path,
) -> Result<(), Error> {
    let cutoff = Duration::try_days(options.database_retention_days)
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .ok_or_else(|| {
            Error::Setup(format!(
                "database retention of {} days is out of range",
                options.database_retention_days
            ))
        })?;
    let mut candidates = Vec::new();
    for entry in fs::read_dir(db_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_file() && name.ends_with(&options.database_extension) {
            candidates.push((name, entry.path()));
        }
    }
    candidates.sort();

    for (name, path) in candidates {
        let metadata = fs::metadata(&path)?;
        let modified: DateTime<Utc> = metadata.modified()?.into();
        if modified >= cutoff {
            continue;
        }
        fs::remove_file(&path)?;
        let report = run.report_mut();
        report.items_deleted += 1;
        report.bytes_reclaimed += metadata.len();
        run.log().info(format!("Removed old database {}", name));

        if options.delete_device_databases {
            let device_path = format!("{}/{}", options.device_db_path.trim_end_matches('/'), name);
            if let Err(e) = bridge.shell(&["rm", &device_path]) {
                run.item_failed(&name, &format!("device delete failed: {}", e));
            }
        }
    }
    Ok(())
}

/// Visible subfolders of the media folder with their recursive file counts.
fn count_media_folders(media_dir: &Path) -> Result<Vec<(String, usize)>, Error> {
    let mut folders = Vec::new();
    for entry in fs::read_dir(media_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || !entry.file_type()?.is_dir() {
            continue;
        }
        let count = WalkDir::new(entry.path())
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .count();
        folders.push((name, count));
    }
    folders.sort();
    Ok(folders)
}

/// Media files under the resize folders. Missing folders are created empty.
fn collect_resize_candidates(
    options: &MobileBackupOptions,
    media_dir: &Path,
) -> Result<Vec<LocalMediaItem>, Error> {
    let mut items = Vec::new();
    for folder in &options.resize_folders {
        let path = media_dir.join(folder);
        if !path.exists() {
            fs::create_dir_all(&path)?;
            continue;
        }
        for entry in WalkDir::new(&path).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::Other(format!("walk error: {}", e)))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(kind) = options.media_kind(entry.path()) {
                items.push(LocalMediaItem::new(entry.into_path(), kind));
            }
        }
    }
    Ok(items)
}

fn is_plain_name(folder: &str) -> bool {
    let mut components = Path::new(folder).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && file_name_lossy(Path::new(folder)) == folder
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn test_media_kind_uses_configured_extensions() {
        let options = MobileBackupOptions::from_config(&AppConfig::default());
        assert_eq!(options.media_kind(Path::new("a/IMG.JPG")), Some(MediaKind::Image));
        assert_eq!(options.media_kind(Path::new("clip.3gp")), Some(MediaKind::Video));
        assert_eq!(options.media_kind(Path::new("sticker.webp")), None);
        assert_eq!(options.media_kind(Path::new("voice.opus")), None);
    }

    #[test]
    fn test_plain_names() {
        assert!(is_plain_name("WhatsApp Stickers"));
        assert!(!is_plain_name("../etc"));
        assert!(!is_plain_name("a/b"));
        assert!(!is_plain_name(""));
    }

    #[test]
    fn test_backup_root_is_dated() {
        let mut options = MobileBackupOptions::from_config(&AppConfig::default());
        options.backup_parent = PathBuf::from("/backups");
        let root = options.backup_root();
        let name = file_name_lossy(&root);
        assert!(name.starts_with("updated_whatsapp_"));
        assert_eq!(name.len(), "updated_whatsapp_".len() + 10);
    }
}
