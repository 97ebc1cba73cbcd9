use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "space-fixer")]
#[command(about = "Free storage space by deduplicating and compressing media", long_about = None)]
pub struct Cli {
    /// Use a local directory tree as the storage backend instead of Google Drive
    #[arg(long, global = true, value_name = "DIR")]
    pub local_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Delete images whose content checksum matches an earlier image
    RemoveDuplicates {
        /// Folder id to scan (defaults to drive.duplicates_folder_id)
        #[arg(long, conflicts_with = "entire_drive")]
        folder: Option<String>,
        /// Scan every image on the drive
        #[arg(long)]
        entire_drive: bool,
        /// Delete without asking
        #[arg(short = 'y', long)]
        yes: bool,
        /// Only report what would be deleted
        #[arg(long, conflicts_with = "yes")]
        dry_run: bool,
    },
    /// Archive images and large files to removable storage, then compress and re-upload images
    ArchiveHeavy {
        /// Root of the removable storage to archive into
        usb_root: PathBuf,
        /// Destination folder id for compressed images (defaults to drive.upload_folder_id)
        #[arg(long)]
        upload_folder: Option<String>,
        /// Keep large files on the drive after archiving them
        #[arg(long)]
        keep_large_files: bool,
        /// Size threshold for large files, in MiB
        #[arg(long, value_name = "MB")]
        min_size_mb: Option<u64>,
        /// Do not ask before deleting archived large files
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Pull a phone's messaging backup, prune old databases and downscale media
    ShrinkMobileBackup {
        /// Also delete pruned database files from the device
        #[arg(long)]
        delete_device_databases: bool,
        /// Media folder to delete after resizing (repeatable)
        #[arg(long = "discard", value_name = "FOLDER")]
        discard: Vec<String>,
        /// Directory in which the dated backup folder is created
        #[arg(long)]
        backup_parent: Option<PathBuf>,
    },
    /// Print configuration values
    PrintConfig,
}
