//! # Mirrorguard CLI - Backup integrity checking
//!
//! Compares a live directory tree against its backup and reports missing
//! files and corruption signals.
//!
//! ## Usage
//! ```bash
//! # Check /data against a plain mirror
//! mirrorguard /data --backup-root /mnt/backup/data
//!
//! # Check a home directory against the latest snapshot on a backup volume
//! mirrorguard /Users/jon --volume "Time Machine" --machine "Jon's iMac" --drive "Macintosh HD"
//!
//! # Hash both copies, skip caches, emit JSON lines
//! mirrorguard /data -b /mnt/backup/data --mode hash -e '**/.cache' --json
//! ```
//!
//! Exit status is 1 when the run cannot start, 130 when interrupted and 0
//! otherwise, whatever the number of alerts.

use clap::{Parser, ValueEnum};
use colored::*;
use mirrorguard::{
    BackupLocator, CheckMode, FixedBackupRoot, JsonReporter, MirrorError, PipelineBuilder,
    Reporter, Result, RunSummary, Severity, SnapshotVolumeLayout, TerminalReporter,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Mirrorguard - check that a backup faithfully mirrors a live tree
#[derive(Parser)]
#[command(name = "mirrorguard")]
#[command(version)]
#[command(about = "Check the integrity of a backup against the live directory tree")]
#[command(long_about = None)]
struct Cli {
    /// Live directory to check
    live_root: PathBuf,

    /// Backup directory mirroring LIVE_ROOT
    #[arg(short, long, conflicts_with = "volume")]
    backup_root: Option<PathBuf>,

    /// Backup volume holding dated snapshots
    #[arg(long)]
    volume: Option<String>,

    /// Machine name inside the backup volume
    #[arg(long)]
    machine: Option<String>,

    /// Source drive name inside the snapshot
    #[arg(long)]
    drive: Option<String>,

    /// Directory where backup volumes are mounted
    #[arg(long)]
    volumes_dir: Option<PathBuf>,

    /// File with one directory exclusion glob per line
    #[arg(short = 'x', long)]
    exclude_file: Option<PathBuf>,

    /// Directory exclusion glob (repeatable)
    #[arg(short, long)]
    exclude: Vec<String>,

    /// Comparison policy
    #[arg(short, long, value_enum, default_value = "metadata")]
    mode: ModeArg,

    /// Allowed lag of a backup behind the live file, in seconds
    #[arg(long, default_value_t = mirrorguard::DEFAULT_MTIME_TOLERANCE_SECS)]
    mtime_tolerance: u64,

    /// Severity of a live file missing from the backup
    #[arg(long, value_enum, default_value = "critical")]
    missing_severity: SeverityArg,

    /// Verification workers (0 = one per CPU)
    #[arg(short, long, default_value_t = 1)]
    workers: usize,

    /// Emit alerts and the summary as JSON lines
    #[arg(long)]
    json: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Hash,
    Metadata,
}

impl From<ModeArg> for CheckMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Hash => CheckMode::Hash,
            ModeArg::Metadata => CheckMode::Metadata,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SeverityArg {
    Warning,
    Critical,
}

impl From<SeverityArg> for Severity {
    fn from(severity: SeverityArg) -> Self {
        match severity {
            SeverityArg::Warning => Severity::Warning,
            SeverityArg::Critical => Severity::Critical,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Disable colors if needed
    if cli.no_color || std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    match run(cli).await {
        Ok(summary) if summary.cancelled => std::process::exit(130),
        Ok(_) => {}
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e.user_message());
            std::process::exit(1);
        }
    }
}

/// Resolve the backup root from either the explicit path or the volume layout
fn locate_backup(cli: &Cli, live_root: &std::path::Path) -> Result<PathBuf> {
    if let Some(path) = &cli.backup_root {
        return Ok(FixedBackupRoot(path.clone()).locate(live_root));
    }

    match (&cli.volume, &cli.machine, &cli.drive) {
        (Some(volume), Some(machine), Some(drive)) => {
            let mut layout = SnapshotVolumeLayout::new(volume, machine, drive);
            if let Some(dir) = &cli.volumes_dir {
                layout = layout.with_volumes_dir(dir);
            }
            Ok(layout.locate(live_root))
        }
        (Some(_), _, _) => Err(MirrorError::invalid_config(
            "--volume needs both --machine and --drive",
        )),
        _ => Err(MirrorError::invalid_config(
            "pass either --backup-root or --volume/--machine/--drive",
        )),
    }
}

async fn run(cli: Cli) -> Result<RunSummary> {
    let live_root = cli
        .live_root
        .canonicalize()
        .map_err(|_| MirrorError::LiveRootMissing(cli.live_root.clone()))?;
    let backup_root = locate_backup(&cli, &live_root)?;

    let workers = match cli.workers {
        0 => num_cpus::get(),
        n => n,
    };

    let mut builder = PipelineBuilder::new()
        .mode(cli.mode.into())
        .mtime_tolerance(Duration::from_secs(cli.mtime_tolerance))
        .missing_severity(cli.missing_severity.into())
        .exclude_patterns(cli.exclude.iter().cloned())
        .workers(workers);
    if let Some(path) = &cli.exclude_file {
        builder = builder.exclude_file(path);
    }
    let pipeline = builder.build(&cli.live_root, &backup_root)?;

    let reporter: Box<dyn Reporter> = if cli.json {
        Box::new(JsonReporter::stdout())
    } else {
        let config = pipeline.config();
        println!(
            "{} {} against {} ({} mode)",
            "Checking".bold(),
            config.live_root.display().to_string().cyan(),
            config.backup_root.display().to_string().cyan(),
            config.mode
        );
        Box::new(TerminalReporter::new())
    };

    let cancel = pipeline.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping (press Ctrl-C again to abort at once)");
            cancel.cancel();
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("{}", "Aborted".red().bold());
                std::process::exit(130);
            }
        }
    });

    pipeline.run(reporter.as_ref()).await
}
