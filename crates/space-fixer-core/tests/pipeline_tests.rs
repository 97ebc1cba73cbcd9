mod common;

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::tempdir;

use common::{banded_image, dimensions_of, set_modified, split_image, FakeBridge, FakeTranscoder};
use space_fixer_core::pipeline::{heavy_files, mobile_backup};
use space_fixer_core::{
    AppConfig, HeavyFilesOptions, LocalDirStore, MobileBackupOptions, PipelineState,
    SilentReporter,
};

fn write_bytes(path: &Path, len: usize) {
    fs::write(path, vec![7u8; len]).unwrap();
}

/// Layout of the fake drive:
///   photos/copy.png    wide two-tone image
///   photos/small.jpg   narrow image with a different pattern
///   photos/wide.png    same pixels as copy.png
///   big.bin            1.5 MB, over the large-file threshold
///   upload/            destination for compressed images
fn heavy_fixture(drive: &Path) {
    fs::create_dir_all(drive.join("photos")).unwrap();
    fs::create_dir_all(drive.join("upload")).unwrap();
    split_image(2000, 500).save(drive.join("photos/copy.png")).unwrap();
    split_image(2000, 500).save(drive.join("photos/wide.png")).unwrap();
    banded_image(200, 100).save(drive.join("photos/small.jpg")).unwrap();
    write_bytes(&drive.join("big.bin"), 1_500_000);
}

fn heavy_options(work: &Path, usb: &Path) -> HeavyFilesOptions {
    let mut options = HeavyFilesOptions::from_config(&AppConfig::default(), usb);
    options.working_dir = work.to_path_buf();
    options.min_size_bytes = 1_000_000;
    options.upload_folder_id = Some("upload".to_string());
    options
}

#[test]
fn test_archive_heavy_end_to_end() {
    let drive = tempdir().unwrap();
    let scratch = tempdir().unwrap();
    let usb = tempdir().unwrap();
    heavy_fixture(drive.path());

    let work = scratch.path().join("work");
    fs::create_dir_all(&work).unwrap();
    fs::write(work.join("stale.jpg"), "left over from an earlier run").unwrap();

    let store = LocalDirStore::new(drive.path(), &[]).unwrap();
    let transcoder = FakeTranscoder::default();
    let options = heavy_options(&work, usb.path());
    let report = heavy_files::run(&store, &transcoder, &options, &SilentReporter);

    assert_eq!(report.state, PipelineState::Done, "errors: {:?}", report.errors);
    assert_eq!(report.items_found, 4);
    assert_eq!(report.media.images_resized, 2);
    assert_eq!(report.media.duplicates_removed, 1);
    assert_eq!(report.items_deleted, 1);
    assert_eq!(report.bytes_reclaimed, 1_500_000);
    assert_eq!(report.items_uploaded, 2);
    assert_eq!(report.items_updated, 0);
    assert!(report.errors.is_empty());

    // Originals and the large file are archived.
    let backup = options.backup_dir();
    for name in ["copy.png", "wide.png", "small.jpg", "big.bin"] {
        assert!(backup.join(name).exists(), "{} not archived", name);
    }

    // The large file is gone from the drive, images are untouched there.
    assert!(!drive.path().join("big.bin").exists());
    assert!(drive.path().join("photos/wide.png").exists());

    // Compressed set was uploaded; the stale file was cleared beforehand.
    assert_eq!(dimensions_of(&drive.path().join("upload/copy.jpg")), (1920, 480));
    assert_eq!(dimensions_of(&drive.path().join("upload/small.jpg")), (200, 100));
    assert!(!drive.path().join("upload/wide.jpg").exists());
    assert!(!drive.path().join("upload/stale.jpg").exists());
}

#[test]
fn test_archive_heavy_keeps_large_files_when_disabled() {
    let drive = tempdir().unwrap();
    let scratch = tempdir().unwrap();
    let usb = tempdir().unwrap();
    heavy_fixture(drive.path());

    let store = LocalDirStore::new(drive.path(), &[]).unwrap();
    let transcoder = FakeTranscoder::default();
    let mut options = heavy_options(&scratch.path().join("work"), usb.path());
    options.delete_large_files = false;
    let report = heavy_files::run(&store, &transcoder, &options, &SilentReporter);

    assert!(report.succeeded());
    assert_eq!(report.items_deleted, 0);
    assert!(drive.path().join("big.bin").exists());
    assert!(options.backup_dir().join("big.bin").exists());
}

#[test]
fn test_archive_heavy_missing_usb_root_fails_before_listing() {
    let drive = tempdir().unwrap();
    let scratch = tempdir().unwrap();
    heavy_fixture(drive.path());

    let store = LocalDirStore::new(drive.path(), &[]).unwrap();
    let transcoder = FakeTranscoder::default();
    let options = heavy_options(&scratch.path().join("work"), &scratch.path().join("no-usb"));
    let report = heavy_files::run(&store, &transcoder, &options, &SilentReporter);

    assert_eq!(report.state, PipelineState::Error);
    assert_eq!(report.items_found, 0);
    assert!(report.errors[0].message.contains("does not exist"));
    assert!(drive.path().join("big.bin").exists());
    assert!(!scratch.path().join("work").exists());
}

#[test]
fn test_archive_heavy_clears_only_top_level_files() {
    let drive = tempdir().unwrap();
    let scratch = tempdir().unwrap();
    let usb = tempdir().unwrap();
    heavy_fixture(drive.path());

    let work = scratch.path().join("work");
    fs::create_dir_all(work.join("notes")).unwrap();
    fs::write(work.join("notes/keep.txt"), "not ours").unwrap();
    fs::write(work.join("stale.jpg"), "left over").unwrap();

    let store = LocalDirStore::new(drive.path(), &[]).unwrap();
    let transcoder = FakeTranscoder::default();
    let report = heavy_files::run(&store, &transcoder, &heavy_options(&work, usb.path()), &SilentReporter);

    assert!(report.succeeded(), "errors: {:?}", report.errors);
    assert!(!work.join("stale.jpg").exists());
    assert_eq!(fs::read_to_string(work.join("notes/keep.txt")).unwrap(), "not ours");
}

#[test]
fn test_archive_heavy_rejects_current_dir_as_working_dir() {
    let drive = tempdir().unwrap();
    let usb = tempdir().unwrap();
    heavy_fixture(drive.path());

    let store = LocalDirStore::new(drive.path(), &[]).unwrap();
    let transcoder = FakeTranscoder::default();
    for dir in [".", "", "/", "work/.."] {
        let options = heavy_options(Path::new(dir), usb.path());
        let report = heavy_files::run(&store, &transcoder, &options, &SilentReporter);

        assert_eq!(report.state, PipelineState::Error, "{:?} accepted", dir);
        assert!(report.errors[0].message.contains("working directory"));
        assert_eq!(report.items_found, 0);
    }
}

#[test]
fn test_archive_heavy_requires_upload_folder() {
    let drive = tempdir().unwrap();
    let scratch = tempdir().unwrap();
    let usb = tempdir().unwrap();

    let store = LocalDirStore::new(drive.path(), &[]).unwrap();
    let transcoder = FakeTranscoder::default();
    let mut options = heavy_options(&scratch.path().join("work"), usb.path());
    options.upload_folder_id = None;
    let report = heavy_files::run(&store, &transcoder, &options, &SilentReporter);

    assert_eq!(report.state, PipelineState::Error);
    assert!(report.errors[0].message.contains("upload folder"));
}

/// Phone layout under `device`:
///   sdcard/db/old.crypt14     older than the retention window
///   sdcard/db/new.crypt14     recent
///   sdcard/db/notes.txt
///   sdcard/media/WhatsApp Images/{wide.jpg, small.jpg}
///   sdcard/media/WhatsApp Video/{a.mp4, b.3gp, broken.mp4}
///   sdcard/media/WhatsApp Stickers/s.webp
fn mobile_fixture(device: &Path) {
    let db = device.join("sdcard/db");
    let images = device.join("sdcard/media/WhatsApp Images");
    let videos = device.join("sdcard/media/WhatsApp Video");
    let stickers = device.join("sdcard/media/WhatsApp Stickers");
    for dir in [&db, &images, &videos, &stickers] {
        fs::create_dir_all(dir).unwrap();
    }

    write_bytes(&db.join("old.crypt14"), 50);
    write_bytes(&db.join("new.crypt14"), 60);
    fs::write(db.join("notes.txt"), "keep").unwrap();
    let ninety_days = Duration::from_secs(90 * 24 * 60 * 60);
    set_modified(&db.join("old.crypt14"), SystemTime::now() - ninety_days);

    split_image(1600, 400).save(images.join("wide.jpg")).unwrap();
    split_image(300, 100).save(images.join("small.jpg")).unwrap();
    fs::write(videos.join("a.mp4"), "video a").unwrap();
    fs::write(videos.join("b.3gp"), "video b").unwrap();
    fs::write(videos.join("broken.mp4"), "video c").unwrap();
    fs::write(stickers.join("s.webp"), "sticker").unwrap();
}

fn mobile_options(parent: &Path) -> MobileBackupOptions {
    let mut options = MobileBackupOptions::from_config(&AppConfig::default());
    options.backup_parent = parent.to_path_buf();
    options.device_db_path = "/sdcard/db".to_string();
    options.device_media_path = "/sdcard/media".to_string();
    options.media_folders = vec![
        "WhatsApp Images".to_string(),
        "WhatsApp Video".to_string(),
        "WhatsApp Stickers".to_string(),
        "WhatsApp Audio".to_string(),
    ];
    options.discard_folders = vec!["WhatsApp Stickers".to_string()];
    options
}

#[test]
fn test_shrink_mobile_backup_end_to_end() {
    let device = tempdir().unwrap();
    let parent = tempdir().unwrap();
    mobile_fixture(device.path());

    let bridge = FakeBridge::new(device.path());
    let transcoder = FakeTranscoder::default();
    let mut options = mobile_options(parent.path());
    options.delete_device_databases = true;
    let report = mobile_backup::run(&bridge, &transcoder, &options, &SilentReporter);

    assert_eq!(report.state, PipelineState::Done, "errors: {:?}", report.errors);

    // One transcode failure among three videos is counted, not fatal.
    assert_eq!(report.media.videos_resized, 2);
    assert_eq!(report.media.videos_skipped, 1);
    assert_eq!(report.media.images_resized, 1);
    assert_eq!(report.media.images_skipped, 1);
    assert_eq!(report.items_found, 6);

    let root = options.backup_root();
    let db = root.join("Backups/Databases");
    assert!(!db.join("old.crypt14").exists());
    assert!(db.join("new.crypt14").exists());
    assert!(db.join("notes.txt").exists());
    assert_eq!(report.items_deleted, 1);
    assert_eq!(
        *bridge.shell_calls.borrow(),
        vec![vec!["rm".to_string(), "/sdcard/db/old.crypt14".to_string()]]
    );

    let media = root.join("Media");
    assert_eq!(dimensions_of(&media.join("WhatsApp Images/wide.jpg")), (720, 180));
    assert_eq!(dimensions_of(&media.join("WhatsApp Images/small.jpg")), (300, 100));
    assert_eq!(fs::read(media.join("WhatsApp Video/broken.mp4")).unwrap(), b"video c");
    assert!(!media.join("WhatsApp Video/broken.mp4.tmp.mp4").exists());
    assert!(!media.join("WhatsApp Stickers").exists());

    // The missing audio folder is a per-folder failure.
    assert_eq!(report.items_failed, 1);
    assert!(report
        .errors
        .iter()
        .any(|e| e.item_name == "WhatsApp Audio"));
}

#[test]
fn test_device_databases_kept_by_default() {
    let device = tempdir().unwrap();
    let parent = tempdir().unwrap();
    mobile_fixture(device.path());

    let bridge = FakeBridge::new(device.path());
    let transcoder = FakeTranscoder::default();
    let options = mobile_options(parent.path());
    let report = mobile_backup::run(&bridge, &transcoder, &options, &SilentReporter);

    assert!(report.succeeded());
    assert!(bridge.shell_calls.borrow().is_empty());
    assert!(device.path().join("sdcard/db/old.crypt14").exists());
}

#[test]
fn test_missing_backup_parent_is_setup_error() {
    let device = tempdir().unwrap();
    let parent = tempdir().unwrap();
    let bridge = FakeBridge::new(device.path());
    let transcoder = FakeTranscoder::default();
    let options = mobile_options(&parent.path().join("absent"));

    let report = mobile_backup::run(&bridge, &transcoder, &options, &SilentReporter);

    assert_eq!(report.state, PipelineState::Error);
    assert!(report.errors[0].message.contains("Setup error"));
}

#[test]
fn test_no_media_pulled_is_setup_error() {
    let device = tempdir().unwrap();
    let parent = tempdir().unwrap();
    fs::create_dir_all(device.path().join("sdcard/db")).unwrap();

    let bridge = FakeBridge::new(device.path());
    let transcoder = FakeTranscoder::default();
    let options = mobile_options(parent.path());
    let report = mobile_backup::run(&bridge, &transcoder, &options, &SilentReporter);

    assert_eq!(report.state, PipelineState::Error);
    assert_eq!(report.items_failed, 4);
    assert!(report
        .errors
        .last()
        .unwrap()
        .message
        .contains("no media folder could be pulled"));
}

#[test]
fn test_out_of_range_retention_is_setup_error() {
    let device = tempdir().unwrap();
    let parent = tempdir().unwrap();
    mobile_fixture(device.path());

    let bridge = FakeBridge::new(device.path());
    let transcoder = FakeTranscoder::default();
    let mut options = mobile_options(parent.path());
    options.database_retention_days = i64::MAX;
    let report = mobile_backup::run(&bridge, &transcoder, &options, &SilentReporter);

    assert_eq!(report.state, PipelineState::Error);
    assert!(report.errors.last().unwrap().message.contains("out of range"));
    assert!(bridge.shell_calls.borrow().is_empty());
}
