mod commands;
mod logging;
mod progress;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use progress::CliReporter;
use space_fixer_core::model::MediaTally;
use space_fixer_core::pipeline::{heavy_files, mobile_backup};
use space_fixer_core::{
    AdbBridge, AppConfig, CloudStorage, DriveClient, DuplicateCleanup, FfmpegTranscoder,
    HeavyFilesOptions, LocalDirStore, MobileBackupOptions, PipelineReport, Scope,
};
use tracing::{error, info, warn};

const MIB: u64 = 1024 * 1024;

fn main() {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match space_fixer_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();
    let local_root = args.local_root.as_deref();

    let result = match args.command {
        Some(Commands::RemoveDuplicates {
            folder,
            entire_drive,
            yes,
            dry_run,
        }) => run_remove_duplicates(&config, local_root, folder, entire_drive, yes, dry_run),
        Some(Commands::ArchiveHeavy {
            usb_root,
            upload_folder,
            keep_large_files,
            min_size_mb,
            yes,
        }) => {
            let mut options = HeavyFilesOptions::from_config(&config, usb_root);
            if upload_folder.is_some() {
                options.upload_folder_id = upload_folder;
            }
            if keep_large_files {
                options.delete_large_files = false;
            }
            if let Some(mb) = min_size_mb {
                options.min_size_bytes = mb.saturating_mul(MIB);
            }
            run_archive_heavy(&config, local_root, &options, yes)
        }
        Some(Commands::ShrinkMobileBackup {
            delete_device_databases,
            discard,
            backup_parent,
        }) => {
            let mut options = MobileBackupOptions::from_config(&config);
            options.delete_device_databases |= delete_device_databases;
            options.discard_folders.extend(discard);
            if let Some(parent) = backup_parent {
                options.backup_parent = parent;
            }
            run_shrink_mobile_backup(&config, &options)
        }
        Some(Commands::PrintConfig) => {
            let mut shown = config.clone();
            if shown.drive.access_token.is_some() {
                shown.drive.access_token = Some("<redacted>".to_string());
            }
            println!("Configuration: {:#?}", shown);
            Ok(())
        }
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = result {
        error!("Error: {:#}", err);
        process::exit(1);
    }
}

fn open_storage(config: &AppConfig, local_root: Option<&Path>) -> anyhow::Result<Box<dyn CloudStorage>> {
    match local_root {
        Some(root) => {
            let store = LocalDirStore::new(root, &config.local.ignore_patterns)
                .with_context(|| format!("Opening local root {}", root.display()))?;
            info!("Using local directory {} as storage", root.display());
            Ok(Box::new(store))
        }
        None => {
            let client = DriveClient::new(&config.drive).context("Connecting to Google Drive")?;
            Ok(Box::new(client))
        }
    }
}

fn run_remove_duplicates(
    config: &AppConfig,
    local_root: Option<&Path>,
    folder: Option<String>,
    entire_drive: bool,
    yes: bool,
    dry_run: bool,
) -> anyhow::Result<()> {
    let scope = if entire_drive {
        Scope::EntireDrive
    } else {
        match folder.or_else(|| config.drive.duplicates_folder_id.clone()) {
            Some(id) => Scope::Folder(id),
            None => bail!("No folder to scan: pass --folder <ID> or --entire-drive"),
        }
    };

    let storage = open_storage(config, local_root)?;
    let reporter = CliReporter::new();
    let cleanup = DuplicateCleanup::plan(storage.as_ref(), &scope, &reporter);
    reporter.clear();

    let plan = cleanup.deletion_plan();
    let confirmed = if cleanup.is_failed() || plan.is_empty() {
        false
    } else {
        println!();
        for entry in plan.entries() {
            println!("  {} {} ({})", "-".red(), entry.name, format_bytes(entry.size));
        }
        println!();
        if dry_run {
            info!("Dry run: {} duplicates would be deleted", plan.len());
            false
        } else if yes {
            true
        } else {
            prompt_confirm(
                &format!(
                    "Delete {} duplicates ({})?",
                    plan.len(),
                    format_bytes(plan.total_bytes())
                ),
                Some(false),
            )?
        }
    };

    let report = if confirmed {
        cleanup.execute(storage.as_ref())
    } else {
        cleanup.abandon()
    };
    print_report(&report)
}

fn run_archive_heavy(
    config: &AppConfig,
    local_root: Option<&Path>,
    options: &HeavyFilesOptions,
    yes: bool,
) -> anyhow::Result<()> {
    if options.delete_large_files && !yes {
        let prompt = format!(
            "Files over {} will be deleted from the drive once archived. Continue?",
            format_bytes(options.min_size_bytes)
        );
        if !prompt_confirm(&prompt, Some(false))? {
            info!("Aborted");
            return Ok(());
        }
    }

    let storage = open_storage(config, local_root)?;
    let transcoder = FfmpegTranscoder::new(&config.transcode.ffmpeg_path);
    let reporter = CliReporter::new();
    let report = heavy_files::run(storage.as_ref(), &transcoder, options, &reporter);
    info!(
        "Archive: {}, images: {}",
        options.backup_dir().display().to_string().cyan(),
        options.working_dir.display().to_string().cyan()
    );
    print_report(&report)
}

fn run_shrink_mobile_backup(config: &AppConfig, options: &MobileBackupOptions) -> anyhow::Result<()> {
    let bridge = AdbBridge::new(PathBuf::from(&config.mobile.adb_path));
    let transcoder = FfmpegTranscoder::new(&config.transcode.ffmpeg_path);
    let reporter = CliReporter::new();
    let report = mobile_backup::run(&bridge, &transcoder, options, &reporter);
    info!(
        "Backup folder: {}",
        options.backup_root().display().to_string().cyan()
    );
    print_report(&report)
}

fn print_report(report: &PipelineReport) -> anyhow::Result<()> {
    println!();
    let state = if report.succeeded() {
        report.state.to_string().green()
    } else {
        report.state.to_string().red()
    };
    info!("{} finished: {}", report.agent.to_string().cyan(), state);
    info!(
        "{} found, {} processed, {} skipped, {} failed",
        format!("{}", report.items_found).cyan(),
        format!("{}", report.items_processed).green(),
        format!("{}", report.items_skipped).yellow(),
        format!("{}", report.items_failed).red(),
    );
    info!(
        "{} deleted ({} reclaimed), {} uploaded, {} updated",
        format!("{}", report.items_deleted).red(),
        format_bytes(report.bytes_reclaimed).green(),
        format!("{}", report.items_uploaded).cyan(),
        format!("{}", report.items_updated).cyan(),
    );
    let media = &report.media;
    if *media != MediaTally::default() {
        info!(
            "Images: {} resized, {} skipped. Videos: {} resized, {} skipped. {} duplicates removed",
            media.images_resized,
            media.images_skipped,
            media.videos_resized,
            media.videos_skipped,
            media.duplicates_removed,
        );
    }
    for item in &report.errors {
        warn!("{}: {}", item.item_name.yellow(), item.message);
    }

    if !report.succeeded() {
        bail!("{} did not complete", report.agent);
    }
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(default.unwrap_or(false));
        }

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
