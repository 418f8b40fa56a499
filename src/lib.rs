//! Segment Cropper - Cut named segments out of songs and export them as WAV
//!
//! The workflow has three stages:
//! 1. Upload songs into a [`session::SongLibrary`]
//! 2. Mark a [`session::Region`] over a song and save it as a named
//!    [`session::Segment`]
//! 3. Export a selection of segments into one ZIP of 16-bit PCM WAV files
//!
//! # Architecture
//!
//! - `engine`: PCM buffers, cropping, WAV encoding and the decoder seam
//! - `session`: songs, the live region and saved segments
//! - `export`: the concurrent export pipeline and archive packaging

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod session;

pub use config::CropperConfig;
pub use error::{CropperError, Result};
