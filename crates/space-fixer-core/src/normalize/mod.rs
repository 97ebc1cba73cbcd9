//! Media normalization: downscale images above a width ceiling and re-encode
//! them as JPEG, convert compact camera images, rescale videos.
//!
//! Every decode/encode/transcode failure comes back as
//! [`ItemOutcome::Skipped`] so one bad file never stops a batch.

pub mod transcode;

use crate::error::Error;
use crate::model::{lowercase_extension, ItemOutcome, LocalMediaItem, MediaKind};
use crate::remote::fetch::unique_path;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

pub use transcode::{FfmpegTranscoder, Transcoder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeSettings {
    /// Width ceiling for images; target width for videos.
    pub max_width: u32,
    pub quality: u8,
    /// Re-encode images already within the ceiling (compression only).
    /// When false they are reported as skipped and left untouched.
    pub reencode_within_limit: bool,
}

pub struct MediaNormalizer<'a> {
    settings: NormalizeSettings,
    transcoder: &'a dyn Transcoder,
}

impl<'a> MediaNormalizer<'a> {
    pub fn new(settings: NormalizeSettings, transcoder: &'a dyn Transcoder) -> Self {
        Self {
            settings,
            transcoder,
        }
    }

    pub fn normalize(&self, item: &mut LocalMediaItem) -> ItemOutcome {
        match item.kind {
            MediaKind::Image => self.normalize_image(item),
            MediaKind::Video => self.normalize_video(item),
        }
    }

    pub fn normalize_image(&self, item: &mut LocalMediaItem) -> ItemOutcome {
        if is_compact_camera_image(&item.path) {
            if let Err(e) = self.convert_compact_image(item) {
                return ItemOutcome::Skipped(e.to_string());
            }
        }
        match image::open(&item.path) {
            Ok(image) => self.write_image(image, item),
            Err(e) => ItemOutcome::Skipped(format!("decode failed: {}", e)),
        }
    }

    /// Transcode a HEIC/HEIF file to JPEG next to it and remove the original.
    pub fn convert_compact_image(&self, item: &mut LocalMediaItem) -> Result<(), Error> {
        let dir = parent_dir(&item.path);
        let target = unique_path(&dir, &jpeg_file_name(&item.path));
        if let Err(e) = self.transcoder.convert_still(&item.path, &target) {
            let _ = fs::remove_file(&target);
            return Err(e);
        }
        fs::remove_file(&item.path)?;
        debug!("Converted {} to {}", item.path.display(), target.display());
        item.path = target;
        Ok(())
    }

    /// Downscale an already decoded image if needed and write it as JPEG over
    /// the item. Non-JPEG sources are renamed to `.jpg`.
    pub fn write_image(&self, image: DynamicImage, item: &mut LocalMediaItem) -> ItemOutcome {
        let (width, height) = image.dimensions();
        let ceiling = self.settings.max_width;
        if width <= ceiling && !self.settings.reencode_within_limit {
            return ItemOutcome::Skipped(format!("already within {}px", ceiling));
        }

        let image = resize_to_ceiling(image, ceiling);
        let target = if is_jpeg(&item.path) {
            item.path.clone()
        } else {
            unique_path(&parent_dir(&item.path), &jpeg_file_name(&item.path))
        };
        let temp = temp_path(&target, "tmp.jpg");

        let written = encode_jpeg(&image, &temp, self.settings.quality)
            .and_then(|_| fs::rename(&temp, &target).map_err(Error::from));
        if let Err(e) = written {
            let _ = fs::remove_file(&temp);
            return ItemOutcome::Skipped(format!("encode failed: {}", e));
        }

        if target != item.path {
            if let Err(e) = fs::remove_file(&item.path) {
                return ItemOutcome::Skipped(format!("could not remove original: {}", e));
            }
            item.path = target;
        }
        trace!(
            "Normalized {} from {}x{} to {}x{}",
            item.path.display(),
            width,
            height,
            image.width(),
            image.height()
        );
        ItemOutcome::Processed
    }

    /// Rescale into `<path>.tmp.mp4` and replace the original only on success.
    pub fn normalize_video(&self, item: &mut LocalMediaItem) -> ItemOutcome {
        let temp = temp_path(&item.path, "tmp.mp4");
        let result = self
            .transcoder
            .rescale_video(&item.path, &temp, self.settings.max_width)
            .and_then(|_| fs::rename(&temp, &item.path).map_err(Error::from));
        match result {
            Ok(()) => ItemOutcome::Processed,
            Err(e) => {
                let _ = fs::remove_file(&temp);
                ItemOutcome::Skipped(e.to_string())
            }
        }
    }
}

/// Dimensions after applying the width ceiling. Aspect ratio is preserved
/// with `new_h = round(h * ceiling / w)`, never below one pixel.
pub fn target_dimensions(width: u32, height: u32, ceiling: u32) -> (u32, u32) {
    if width <= ceiling {
        return (width, height);
    }
    let scaled = (f64::from(height) * f64::from(ceiling) / f64::from(width)).round();
    (ceiling, (scaled as u32).max(1))
}

pub fn resize_to_ceiling(image: DynamicImage, ceiling: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    let (new_width, new_height) = target_dimensions(width, height, ceiling);
    if (new_width, new_height) == (width, height) {
        return image;
    }
    image.resize_exact(new_width, new_height, FilterType::Lanczos3)
}

pub fn encode_jpeg(image: &DynamicImage, path: &Path, quality: u8) -> Result<(), Error> {
    let mut writer = BufWriter::new(File::create(path)?);
    let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality);
    encoder.encode_image(&image.to_rgb8())?;
    writer.flush()?;
    Ok(())
}

pub fn is_compact_camera_image(path: &Path) -> bool {
    matches!(lowercase_extension(path).as_deref(), Some("heic") | Some("heif"))
}

fn is_jpeg(path: &Path) -> bool {
    matches!(lowercase_extension(path).as_deref(), Some("jpg") | Some("jpeg"))
}

fn jpeg_file_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    format!("{}.jpg", stem)
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

fn temp_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_dimensions_narrow_is_unchanged() {
        assert_eq!(target_dimensions(800, 600, 1920), (800, 600));
        assert_eq!(target_dimensions(1920, 1080, 1920), (1920, 1080));
    }

    #[test]
    fn test_target_dimensions_rounds_height() {
        assert_eq!(target_dimensions(4000, 3000, 1920), (1920, 1440));
        // 1001 * 720 / 1333 = 540.68...
        assert_eq!(target_dimensions(1333, 1001, 720), (720, 541));
        assert_eq!(target_dimensions(10_000, 1, 100), (100, 1));
    }

    #[test]
    fn test_temp_path_appends_suffix() {
        assert_eq!(temp_path(Path::new("/a/clip.3gp"), "tmp.mp4"), PathBuf::from("/a/clip.3gp.tmp.mp4"));
    }

    #[test]
    fn test_compact_camera_detection() {
        assert!(is_compact_camera_image(Path::new("IMG_1.HEIC")));
        assert!(is_compact_camera_image(Path::new("x.heif")));
        assert!(!is_compact_camera_image(Path::new("x.jpg")));
    }

    #[test]
    fn test_jpeg_file_name() {
        assert_eq!(jpeg_file_name(Path::new("dir/shot.png")), "shot.jpg");
    }
}
