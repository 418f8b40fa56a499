//! CLI Module
//!
//! Command-line interface for cropping and exporting song segments.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Segment Cropper - cut named segments from songs and export them as WAV
#[derive(Parser, Debug)]
#[command(name = "segment-cropper")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show duration, size and format of an audio file
    #[command(name = "info")]
    Info {
        /// Audio file to inspect
        path: PathBuf,
    },

    /// Crop one range out of a song into a WAV file
    #[command(name = "crop")]
    Crop {
        /// Input audio file
        input: PathBuf,

        /// Start time in seconds
        #[arg(short, long)]
        start: f64,

        /// End time in seconds
        #[arg(short, long)]
        end: f64,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Export the segments listed in a JSON manifest into one ZIP
    #[command(name = "export")]
    Export {
        /// Manifest file: {"segments": [{"song", "name", "start", "end"}]}
        manifest: PathBuf,

        /// Output archive (defaults to cropped_segments_<date>.zip)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of export workers (overrides the config)
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Import every audio file in a directory and report the results
    #[command(name = "scan")]
    Scan {
        /// Directory to walk
        dir: PathBuf,
    },
}
