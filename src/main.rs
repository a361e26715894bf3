#![forbid(unsafe_code)]

//! Save and restore xfce4-panel configuration.
//!
//! `save` captures the live property tree over D-Bus, prunes it into a
//! self-consistent snapshot and writes it (with the launcher descriptors
//! and plugin settings files it depends on) into a portable tar archive.
//! `load` is the inverse: read an archive, prune, and replay it onto the
//! running panel with the side-effect ordering the panel needs.

mod archive;
mod desktop;
mod live;
mod normalize;
mod source;
mod store;
mod value;

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use live::process::ProcTable;
use live::xfconf::{XfconfChannel, PANEL_CHANNEL};
use live::PanelPaths;
use source::{ArchiveSource, DirSource};
use store::PanelConfig;

#[derive(Parser)]
#[command(name = "panel-profiles")]
#[command(author, version, about = "Save and restore xfce4-panel configuration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture the running panel configuration into an archive
    Save {
        /// Destination archive; `.gz` and `.bz2` suffixes select compression
        file: PathBuf,
    },

    /// Restore an archived configuration onto the running panel
    Load {
        /// Archive produced by `save`
        file: PathBuf,
    },
}

fn main() {
    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("failed to install tracing subscriber");
    }

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Save { file } => cmd_save(&file),
        Commands::Load { file } => cmd_load(&file),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn cmd_save(file: &Path) -> Result<()> {
    let service = XfconfChannel::session(PANEL_CHANNEL)?;
    let paths = PanelPaths::default_user()?;
    let panel_source = DirSource::new(&paths.panel_dir);

    let mut config = live::capture(&service)?;
    normalize::normalize(&mut config, &panel_source);
    report_soft_errors(&config);

    let mtime = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    archive::write(&config, &panel_source, file, mtime)?;

    info!(
        properties = config.len(),
        desktop_files = config.desktop_files.len(),
        settings_files = config.settings_files.len(),
        archive = %file.display(),
        "configuration saved"
    );
    Ok(())
}

fn cmd_load(file: &Path) -> Result<()> {
    let mut config = archive::read(file)?;
    let archive_source = ArchiveSource::new(file);
    normalize::normalize(&mut config, &archive_source);
    report_soft_errors(&config);

    let service = XfconfChannel::session(PANEL_CHANNEL)?;
    let paths = PanelPaths::default_user()?;
    live::apply(&config, &archive_source, &service, &ProcTable, &paths)?;

    info!(
        properties = config.len(),
        archive = %file.display(),
        "configuration restored, panel restarting"
    );
    Ok(())
}

fn report_soft_errors(config: &PanelConfig) {
    for diagnostic in &config.errors {
        warn!("{diagnostic}");
    }
}
