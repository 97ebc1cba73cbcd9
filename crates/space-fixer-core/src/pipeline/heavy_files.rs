//! `archive-heavy`: pull every image down, archive the originals to removable
//! storage, drop perceptual duplicates, compress the rest, move large files
//! off the drive, and push the compressed set back to an upload folder.

use super::{PipelineRun, PipelineState};
use crate::config::AppConfig;
use crate::dedupe::DedupeSet;
use crate::error::Error;
use crate::hasher::{perceptual_hash, PerceptualHash};
use crate::model::{AgentKind, ItemOutcome, LocalMediaItem, MediaKind, PipelineReport, RemoteFileRecord};
use crate::normalize::{is_compact_camera_image, MediaNormalizer, NormalizeSettings, Transcoder};
use crate::plan::{execute_deletion_plan, DeletionPlan};
use crate::progress::ProgressReporter;
use crate::reconcile::reconcile_folder;
use crate::remote::fetch::unique_path;
use crate::remote::{list_images, list_large_files, CloudStorage, Fetcher, Scope};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct HeavyFilesOptions {
    pub scope: Scope,
    pub working_dir: PathBuf,
    /// Removable storage root; must already exist.
    pub usb_root: PathBuf,
    pub backup_dir_prefix: String,
    pub min_size_bytes: u64,
    pub delete_large_files: bool,
    pub upload_folder_id: Option<String>,
    pub normalize: NormalizeSettings,
}

impl HeavyFilesOptions {
    pub fn from_config(config: &AppConfig, usb_root: impl Into<PathBuf>) -> Self {
        Self {
            scope: Scope::EntireDrive,
            working_dir: PathBuf::from(&config.heavy.working_dir),
            usb_root: usb_root.into(),
            backup_dir_prefix: config.heavy.backup_dir_prefix.clone(),
            min_size_bytes: config.heavy.min_size_bytes,
            delete_large_files: config.heavy.delete_large_files,
            upload_folder_id: config.drive.upload_folder_id.clone(),
            normalize: NormalizeSettings {
                max_width: config.images.max_width,
                quality: config.images.quality,
                reencode_within_limit: true,
            },
        }
    }

    /// `<usb_root>/<prefix><YYYY-MM-DD>`
    pub fn backup_dir(&self) -> PathBuf {
        let today = chrono::Local::now().format("%Y-%m-%d");
        self.usb_root
            .join(format!("{}{}", self.backup_dir_prefix, today))
    }
}

pub fn run(
    storage: &dyn CloudStorage,
    transcoder: &dyn Transcoder,
    options: &HeavyFilesOptions,
    reporter: &dyn ProgressReporter,
) -> PipelineReport {
    let mut run = PipelineRun::new(AgentKind::ArchiveHeavy, reporter);
    let result = execute(&mut run, storage, transcoder, options);
    run.finish(result)
}

fn execute(
    run: &mut PipelineRun<'_>,
    storage: &dyn CloudStorage,
    transcoder: &dyn Transcoder,
    options: &HeavyFilesOptions,
) -> Result<(), Error> {
    run.advance(PipelineState::Start, 5, "Preparing working directories");
    let (backup_dir, upload_folder_id) = prepare(options)?;
    run.log().info(format!("Archiving to {}", backup_dir.display()));

    run.advance(PipelineState::ListCandidates, 15, "Scanning for images");
    let images = list_images(storage, &options.scope)?;
    run.report_mut().items_found += images.len();
    run.log().info(format!("Found {} images", images.len()));

    run.advance(PipelineState::FetchAll, 15, "Downloading images");
    let mut fetcher = Fetcher::new(&options.working_dir);
    let mut items = Vec::with_capacity(images.len());
    for (index, record) in images.iter().enumerate() {
        match fetcher.fetch(storage, record) {
            Ok(path) => {
                let mut item = LocalMediaItem::new(path, MediaKind::Image);
                item.original_name = record.name.clone();
                items.push(item);
            }
            Err(e) => run.item_failed(&record.name, &e.to_string()),
        }
        run.item_progress(&record.name, index, images.len(), 15, 10);
    }

    run.advance(
        PipelineState::DedupeAndNormalize,
        25,
        "Compressing and de-duplicating images",
    );
    let normalizer = MediaNormalizer::new(options.normalize, transcoder);
    let mut seen: DedupeSet<PerceptualHash> = DedupeSet::new();
    for item in items {
        archive_and_compress(run, &normalizer, &mut seen, item, &backup_dir);
    }
    let media = &run.report().media;
    let summary = format!(
        "Resized {} images, skipped {}, removed {} duplicates",
        media.images_resized, media.images_skipped, media.duplicates_removed
    );
    run.log().info(summary);
    run.progress(40);

    run.advance(PipelineState::ListSecondaryCandidates, 55, "Scanning for large files");
    let large_files = list_large_files(storage, &options.scope, options.min_size_bytes)?;
    run.report_mut().items_found += large_files.len();
    run.log().info(format!("Found {} large files", large_files.len()));

    run.advance(PipelineState::FetchSecondary, 55, "Archiving large files");
    let archived = archive_large_files(run, storage, &large_files, &backup_dir);

    if options.delete_large_files {
        let plan = DeletionPlan::from_archived(&archived);
        run.advance(
            PipelineState::ConfirmDeletion,
            65,
            &format!("{} archived large files marked for deletion", plan.len()),
        );
        run.advance(PipelineState::DeleteRemote, 65, "Deleting large files from the drive");
        let outcome = execute_deletion_plan(storage, &plan, run.log());
        let report = run.report_mut();
        report.items_deleted += outcome.deleted;
        report.items_failed += outcome.failed;
        report.bytes_reclaimed += outcome.bytes_reclaimed;
        report.errors.extend(outcome.errors);
        run.log()
            .info(format!("Deleted {}, failed {}", outcome.deleted, outcome.failed));
    } else {
        run.advance(
            PipelineState::ConfirmDeletion,
            65,
            "Large file deletion disabled; keeping drive copies",
        );
    }
    run.progress(75);

    run.advance(
        PipelineState::ReconcileUpload,
        75,
        "Uploading compressed images back to the drive",
    );
    let summary = reconcile_folder(storage, &upload_folder_id, &options.working_dir, run.log())?;
    let report = run.report_mut();
    report.items_uploaded += summary.uploaded;
    report.items_updated += summary.updated;
    report.items_failed += summary.failed;
    report.errors.extend(summary.errors);
    run.log().info(format!(
        "Uploaded {}, updated {}",
        summary.uploaded, summary.updated
    ));
    run.progress(95);
    run.log().info(format!(
        "Backup done. Files saved to {}, images in {}",
        backup_dir.display(),
        options.working_dir.display()
    ));
    Ok(())
}

/// Checks that run before any remote call. Returns the dated backup
/// directory and the upload folder id.
fn prepare(options: &HeavyFilesOptions) -> Result<(PathBuf, String), Error> {
    if !options.usb_root.is_dir() {
        return Err(Error::Setup(format!(
            "the path '{}' does not exist",
            options.usb_root.display()
        )));
    }
    let upload_folder_id = options
        .upload_folder_id
        .clone()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::Setup("no upload folder configured".to_string()))?;

    if !matches!(options.working_dir.components().next_back(), Some(Component::Normal(_))) {
        return Err(Error::Setup(format!(
            "refusing to use '{}' as the working directory",
            options.working_dir.display()
        )));
    }

    let backup_dir = options.backup_dir();
    fs::create_dir_all(&backup_dir)?;
    clear_working_dir(&options.working_dir)?;
    Ok((backup_dir, upload_folder_id))
}

/// Remove files left by an earlier run. Subdirectories are left alone; only
/// top-level regular files are fetched into or uploaded from here.
fn clear_working_dir(dir: &Path) -> Result<(), Error> {
    fs::create_dir_all(dir)?;
    let mut cleared = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            fs::remove_file(entry.path())?;
            cleared += 1;
        }
    }
    debug!("Cleared {} files from {}", cleared, dir.display());
    Ok(())
}

/// Per image: convert compact formats, copy the original to the archive,
/// drop it if its perceptual hash was already seen, otherwise compress.
fn archive_and_compress(
    run: &mut PipelineRun<'_>,
    normalizer: &MediaNormalizer<'_>,
    seen: &mut DedupeSet<PerceptualHash>,
    mut item: LocalMediaItem,
    backup_dir: &Path,
) {
    let name = item.original_name.clone();
    if is_compact_camera_image(&item.path) {
        if let Err(e) = normalizer.convert_compact_image(&mut item) {
            run.record_media(MediaKind::Image, &ItemOutcome::Skipped(e.to_string()), &name);
            return;
        }
    }

    let image = match image::open(&item.path) {
        Ok(image) => image,
        Err(e) => {
            let outcome = ItemOutcome::Skipped(format!("decode failed: {}", e));
            run.record_media(MediaKind::Image, &outcome, &name);
            return;
        }
    };

    let archive_path = unique_path(backup_dir, &item.file_name());
    if let Err(e) = fs::copy(&item.path, &archive_path) {
        let outcome = ItemOutcome::Failed(format!("archive copy failed: {}", e));
        run.record_media(MediaKind::Image, &outcome, &name);
        return;
    }

    if !seen.observe(perceptual_hash(&image)) {
        match fs::remove_file(&item.path) {
            Ok(()) => {
                run.report_mut().media.duplicates_removed += 1;
                run.report_mut().items_processed += 1;
                run.log().info(format!("Removed visual duplicate {}", name));
            }
            Err(e) => run.item_failed(&name, &format!("could not remove duplicate: {}", e)),
        }
        return;
    }

    let outcome = normalizer.write_image(image, &mut item);
    run.record_media(MediaKind::Image, &outcome, &name);
}

/// Download large files into the archive. Only the records returned were
/// archived and may be deleted remotely.
fn archive_large_files(
    run: &mut PipelineRun<'_>,
    storage: &dyn CloudStorage,
    large_files: &[RemoteFileRecord],
    backup_dir: &Path,
) -> Vec<RemoteFileRecord> {
    let mut fetcher = Fetcher::new(backup_dir);
    let mut archived = Vec::with_capacity(large_files.len());
    for (index, record) in large_files.iter().enumerate() {
        match fetcher.fetch(storage, record) {
            Ok(_) => archived.push(record.clone()),
            Err(e) => run.item_failed(&record.name, &format!("archive failed: {}", e)),
        }
        run.item_progress(&record.name, index, large_files.len(), 55, 10);
    }
    archived
}
