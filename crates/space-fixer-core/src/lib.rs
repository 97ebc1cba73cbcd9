pub mod config;
pub mod dedupe;
pub mod device;
pub mod error;
pub mod hasher;
pub mod log_sink;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod plan;
pub mod progress;
pub mod reconcile;
pub mod remote;

pub use config::AppConfig;
pub use dedupe::{find_duplicates, DedupeSet, Partition};
pub use device::{AdbBridge, DeviceBridge};
pub use error::Error;
pub use log_sink::{LogEntry, LogLevel, RunLog};
pub use model::{AgentKind, ItemOutcome, LocalMediaItem, MediaKind, PipelineReport, RemoteFileRecord};
pub use normalize::{FfmpegTranscoder, MediaNormalizer, NormalizeSettings, Transcoder};
pub use pipeline::{DuplicateCleanup, HeavyFilesOptions, MobileBackupOptions, PipelineState};
pub use plan::{DeletionPlan, DeletionReason};
pub use progress::{ProgressReporter, SilentReporter};
pub use remote::{CloudStorage, DriveClient, FileFilter, FileQuery, LocalDirStore, Scope};
