use config::{Config, ConfigError, Environment, File as ConfigFile, FileFormat};
use serde::Deserialize;

const MIB: u64 = 1024 * 1024;
const MAX_RETENTION_DAYS: i64 = 36_500;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub drive: DriveConfig,
    pub images: ImageConfig,
    pub heavy: HeavyConfig,
    pub mobile: MobileConfig,
    pub transcode: TranscodeConfig,
    pub local: LocalConfig,
}

/// Google Drive v3 access. The access token comes from an external OAuth flow.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub access_token: Option<String>,
    pub api_base: String,
    pub upload_base: String,
    pub timeout_secs: u64,
    pub page_size: u32,
    /// Folder scanned by `remove-duplicates`. `None` scans the whole drive.
    pub duplicates_folder_id: Option<String>,
    /// Folder compressed images are reconciled into.
    pub upload_folder_id: Option<String>,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            api_base: "https://www.googleapis.com/drive/v3".to_string(),
            upload_base: "https://www.googleapis.com/upload/drive/v3".to_string(),
            timeout_secs: 120,
            page_size: 1000,
            duplicates_folder_id: None,
            upload_folder_id: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub max_width: u32,
    pub quality: u8,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_width: 1920,
            quality: 85,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeavyConfig {
    pub working_dir: String,
    pub min_size_bytes: u64,
    pub backup_dir_prefix: String,
    pub delete_large_files: bool,
}

impl Default for HeavyConfig {
    fn default() -> Self {
        Self {
            working_dir: "downloaded_images".to_string(),
            min_size_bytes: 15 * MIB,
            backup_dir_prefix: "backup_".to_string(),
            delete_large_files: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MobileConfig {
    pub adb_path: String,
    pub device_db_path: String,
    pub device_media_path: String,
    pub backup_parent: String,
    pub backup_dir_prefix: String,
    pub resize_width: u32,
    pub database_extension: String,
    pub database_retention_days: i64,
    pub delete_device_databases: bool,
    pub media_folders: Vec<String>,
    pub resize_folders: Vec<String>,
    pub discard_folders: Vec<String>,
    pub image_extensions: Vec<String>,
    pub video_extensions: Vec<String>,
}

impl Default for MobileConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            adb_path: "adb".to_string(),
            device_db_path: "/sdcard/Android/media/com.whatsapp/WhatsApp/Backups/Databases"
                .to_string(),
            device_media_path: "/sdcard/Android/media/com.whatsapp/WhatsApp/Media".to_string(),
            backup_parent: ".".to_string(),
            backup_dir_prefix: "updated_whatsapp_".to_string(),
            resize_width: 720,
            database_extension: ".crypt14".to_string(),
            database_retention_days: 60,
            delete_device_databases: false,
            media_folders: strings(&[
                "WhatsApp Images",
                "WhatsApp Video",
                "WhatsApp Documents",
                "WhatsApp Stickers",
                "WhatsApp Audio",
                "WallPaper",
                "WhatsApp Profile Photos",
            ]),
            resize_folders: strings(&["WhatsApp Images", "WhatsApp Video"]),
            discard_folders: Vec::new(),
            image_extensions: strings(&["jpg", "jpeg", "png"]),
            video_extensions: strings(&["mp4", "3gp", "avi"]),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    pub ffmpeg_path: String,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }
}

/// Settings for the local directory backend.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    pub ignore_patterns: Vec<String>,
}

/// Load `Config.toml` (optional) and `SPACE_FIXER__SECTION__KEY` overrides.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(
            Environment::with_prefix("SPACE_FIXER")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;
    let config = builder.try_deserialize::<AppConfig>()?;
    config.validate()?;
    Ok(config)
}

pub fn load_from_toml_str(source: &str) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(ConfigFile::from_str(source, FileFormat::Toml))
        .build()?
        .try_deserialize::<AppConfig>()?;
    config.validate()?;
    Ok(config)
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.images.quality) {
            return Err(ConfigError::Message(format!(
                "images.quality must be within 1..=100, got {}",
                self.images.quality
            )));
        }
        if self.images.max_width == 0 || self.mobile.resize_width == 0 {
            return Err(ConfigError::Message(
                "width ceilings must be greater than zero".to_string(),
            ));
        }
        if !(0..=MAX_RETENTION_DAYS).contains(&self.mobile.database_retention_days) {
            return Err(ConfigError::Message(format!(
                "mobile.database_retention_days must be within 0..={}, got {}",
                MAX_RETENTION_DAYS, self.mobile.database_retention_days
            )));
        }
        if self.drive.page_size == 0 {
            return Err(ConfigError::Message(
                "drive.page_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
