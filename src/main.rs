//! Segment Cropper CLI
//!
//! Command-line interface for cropping song segments and exporting them.

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use segment_cropper::cli::{commands, Cli, Commands};
use segment_cropper::export::ExportStatus;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    info!("Segment Cropper v{}", env!("CARGO_PKG_VERSION"));

    let Some(command) = cli.command else {
        println!("Segment Cropper v{}", env!("CARGO_PKG_VERSION"));
        println!("Use --help for available commands");
        return Ok(());
    };

    let mut config = commands::load_config(cli.config.as_deref()).context("invalid configuration")?;
    handle_command(&mut config, command)
}

fn handle_command(
    config: &mut segment_cropper::CropperConfig,
    cmd: Commands,
) -> anyhow::Result<()> {
    match cmd {
        Commands::Info { path } => commands::show_info(config, &path)
            .with_context(|| format!("cannot inspect {}", path.display())),
        Commands::Crop {
            input,
            start,
            end,
            output,
        } => commands::crop(config, &input, start, end, &output)
            .with_context(|| format!("cannot crop {}", input.display())),
        Commands::Export {
            manifest,
            output,
            workers,
        } => {
            if let Some(workers) = workers {
                config.export.max_workers = workers;
                config.validate().context("invalid --workers")?;
            }
            let summary = commands::export(config, &manifest, output.as_deref())
                .with_context(|| format!("export from {} failed", manifest.display()))?;
            if summary.status() == ExportStatus::Failed {
                bail!("no segments were exported");
            }
            Ok(())
        }
        Commands::Scan { dir } => {
            commands::scan(config, &dir).with_context(|| format!("cannot scan {}", dir.display()))
        }
    }
}
