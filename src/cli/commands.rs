//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use serde::Deserialize;

use crate::config::CropperConfig;
use crate::engine::{self, encode, format_duration, format_file_size, Decoder, WavDecoder};
use crate::error::{CropperError, Result};
use crate::export::{
    archive_file_name, ExportJob, ExportOrchestrator, ExportOutcome, ExportSummary, SegmentFailure,
};
use crate::session::{default_segment_name, Region, Segment, Song, SongLibrary};

/// One segment in an export manifest
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestEntry {
    /// Song file, relative to the manifest's directory
    pub song: PathBuf,
    /// Segment name; a timestamped default is used when absent
    #[serde(default)]
    pub name: Option<String>,
    pub start: f64,
    pub end: f64,
}

/// Segments to export, in archive order
#[derive(Debug, Clone, Deserialize)]
pub struct ExportManifest {
    pub segments: Vec<ManifestEntry>,
}

impl ExportManifest {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// Load the configuration file if one was given, otherwise the defaults.
pub fn load_config(path: Option<&Path>) -> Result<CropperConfig> {
    let config = match path {
        Some(path) => {
            info!("Loading config: {}", path.display());
            CropperConfig::from_file(path)?
        }
        None => CropperConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Print duration, size and format of an audio file.
pub fn show_info(config: &CropperConfig, path: &Path) -> Result<()> {
    info!("Inspecting: {}", path.display());

    let mut library = SongLibrary::new(config.upload.clone());
    let song = library.import_file(path, &WavDecoder)?;
    let source = WavDecoder.decode(&song.load_bytes()?)?;

    println!("Name: {}", song.name());
    println!("Duration: {}", format_duration(song.duration()));
    println!("Size: {}", format_file_size(song.size_bytes()));
    println!("Sample rate: {} Hz", source.sample_rate());
    println!("Channels: {}", source.channels());

    Ok(())
}

/// Crop one range out of a song into a WAV file.
pub fn crop(
    config: &CropperConfig,
    input: &Path,
    start: f64,
    end: f64,
    output: &Path,
) -> Result<()> {
    info!("Cropping {} from {}s to {}s", input.display(), start, end);

    let mut library = SongLibrary::new(config.upload.clone());
    let song = library.import_file(input, &WavDecoder)?;

    // Same clamping as dragging the region handles
    let mut region = Region::new(&song, config.region)?;
    region.update_from_drag(start, end);
    if region.start() != start || region.end() != end {
        warn!(
            "Range adjusted to {:.3}s - {:.3}s to fit the song",
            region.start(),
            region.end()
        );
    }

    let source = WavDecoder.decode(&song.load_bytes()?)?;
    let cropped = engine::crop(&source, region.start(), region.end())?;
    let bytes = encode(&cropped)?;
    fs::write(output, &bytes)?;

    println!(
        "Wrote {} ({}, {})",
        output.display(),
        format_duration(cropped.duration_secs()),
        format_file_size(bytes.len() as u64)
    );

    Ok(())
}

/// Export the segments of a manifest into one archive.
///
/// Returns the summary; an export where every segment failed is reported
/// through [`ExportSummary::status`], not as an error. An entry whose song
/// cannot be imported, or whose range does not fit the song, is recorded as
/// a failed segment and the rest of the manifest is still exported.
pub fn export(
    config: &CropperConfig,
    manifest_path: &Path,
    output: Option<&Path>,
) -> Result<ExportSummary> {
    info!("Exporting from manifest: {}", manifest_path.display());

    let manifest = ExportManifest::from_file(manifest_path)?;
    if manifest.segments.is_empty() {
        return Err(CropperError::EmptySelection);
    }
    let base_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));

    let mut library = SongLibrary::new(config.upload.clone());
    let mut songs: HashMap<PathBuf, std::result::Result<Arc<Song>, String>> = HashMap::new();
    let mut segments = Vec::with_capacity(manifest.segments.len());
    // Manifest position of every failure, so the report follows manifest order
    let mut failures: Vec<(usize, SegmentFailure)> = Vec::new();
    let mut positions = HashMap::new();

    for (index, entry) in manifest.segments.iter().enumerate() {
        let name = entry
            .name
            .clone()
            .unwrap_or_else(|| default_segment_name(Utc::now()));

        let song_path = base_dir.join(&entry.song);
        let song = songs
            .entry(song_path)
            .or_insert_with_key(|path| {
                library.import_file(path, &WavDecoder).map_err(|e| {
                    warn!("Cannot import {}: {}", path.display(), e);
                    e.to_string()
                })
            })
            .clone();

        let segment = song.and_then(|song| {
            Segment::new(&name, entry.start, entry.end, song).map_err(|e| e.to_string())
        });
        match segment {
            Ok(segment) => {
                positions.insert(segment.id(), index);
                segments.push(segment);
            }
            Err(reason) => failures.push((
                index,
                SegmentFailure {
                    segment_id: None,
                    segment_name: name,
                    reason,
                },
            )),
        }
    }

    let (archive, mut summary) = if segments.is_empty() {
        (None, ExportSummary::default())
    } else {
        let mut job = ExportJob::new(segments)?;
        let orchestrator = ExportOrchestrator::new(WavDecoder, config.export);
        let outcome = orchestrator.run(&mut job, |progress| {
            info!("Progress: {:.0}%", progress.percent());
        })?;
        match outcome {
            ExportOutcome::Completed { archive, summary } => (Some(archive), summary),
            ExportOutcome::Failed { summary } => (None, summary),
            ExportOutcome::Cancelled => {
                warn!("Export cancelled");
                return Ok(ExportSummary::default());
            }
        }
    };

    if !failures.is_empty() {
        summary.failed_count += failures.len();
        failures.extend(summary.failures.drain(..).map(|failure| {
            let index = failure
                .segment_id
                .and_then(|id| positions.get(&id).copied())
                .unwrap_or(usize::MAX);
            (index, failure)
        }));
        failures.sort_by_key(|(index, _)| *index);
        summary.failures = failures.into_iter().map(|(_, failure)| failure).collect();
    }

    match archive {
        Some(archive) => {
            let output = output
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(default_archive_name()));
            fs::write(&output, &archive)?;

            println!(
                "Exported {} segment(s) to {} ({})",
                summary.succeeded_count,
                output.display(),
                format_file_size(archive.len() as u64)
            );
        }
        None => println!("No segments could be exported."),
    }
    print_failures(&summary);
    Ok(summary)
}

/// Archive name for an export made now, dated in UTC
pub fn default_archive_name() -> String {
    archive_file_name(Utc::now().date_naive())
}

fn print_failures(summary: &ExportSummary) {
    if summary.failures.is_empty() {
        return;
    }
    println!("{} segment(s) failed:", summary.failed_count);
    for failure in &summary.failures {
        println!("  {}: {}", failure.segment_name, failure.reason);
    }
}

/// Import every audio file in a directory and print what was found.
pub fn scan(config: &CropperConfig, dir: &Path) -> Result<()> {
    info!("Scanning: {}", dir.display());

    let mut library = SongLibrary::new(config.upload.clone());
    let report = library.import_dir(dir, &WavDecoder)?;

    if report.songs.is_empty() && report.errors.is_empty() {
        println!("No audio files found.");
        return Ok(());
    }

    println!("{:-<60}", "");
    for song in &report.songs {
        println!(
            "{:<40} {:>8} {:>10}",
            song.name(),
            format_duration(song.duration()),
            format_file_size(song.size_bytes())
        );
    }
    println!("{:-<60}", "");
    println!("Imported: {} | Failed: {}", report.songs.len(), report.errors.len());

    for (path, error) in &report.errors {
        warn!("{}: {}", path.display(), error);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::ExportStatus;
    use tempfile::tempdir;

    fn write_tone(path: &Path, seconds: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..8000 * seconds {
            writer.write_sample(((i % 100) as i16 - 50) * 100).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_manifest_defaults_name() {
        let manifest: ExportManifest =
            serde_json::from_str(r#"{"segments": [{"song": "a.wav", "start": 0, "end": 1.5}]}"#)
                .unwrap();
        assert_eq!(manifest.segments.len(), 1);
        assert!(manifest.segments[0].name.is_none());
    }

    #[test]
    fn test_crop_writes_wav() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("song.wav");
        let output = dir.path().join("out.wav");
        write_tone(&input, 2);

        crop(&CropperConfig::default(), &input, 0.5, 1.0, &output).unwrap();

        let reader = hound::WavReader::open(&output).unwrap();
        assert_eq!(reader.spec().sample_rate, 8000);
        assert_eq!(reader.len(), 4000);
    }

    #[test]
    fn test_export_from_manifest() {
        let dir = tempdir().unwrap();
        write_tone(&dir.path().join("song.wav"), 2);
        let manifest = dir.path().join("manifest.json");
        fs::write(
            &manifest,
            r#"{"segments": [
                {"song": "song.wav", "name": "Intro", "start": 0.0, "end": 0.5},
                {"song": "song.wav", "name": "Intro", "start": 1.0, "end": 2.0}
            ]}"#,
        )
        .unwrap();
        let output = dir.path().join("out.zip");

        let summary = export(&CropperConfig::default(), &manifest, Some(&output)).unwrap();
        assert_eq!(summary.status(), ExportStatus::FullySucceeded);
        assert_eq!(summary.entry_names, vec!["intro.wav", "intro_2.wav"]);
        assert!(output.exists());
    }

    #[test]
    fn test_export_missing_song_is_a_segment_failure() {
        let dir = tempdir().unwrap();
        let manifest = dir.path().join("manifest.json");
        fs::write(
            &manifest,
            r#"{"segments": [{"song": "nope.wav", "name": "Gone", "start": 0.0, "end": 0.5}]}"#,
        )
        .unwrap();
        let output = dir.path().join("out.zip");

        let summary = export(&CropperConfig::default(), &manifest, Some(&output)).unwrap();
        assert_eq!(summary.status(), ExportStatus::Failed);
        assert_eq!(summary.failures[0].segment_name, "Gone");
        assert!(summary.failures[0].reason.contains("File not found"));
        assert!(!output.exists());
    }

    #[test]
    fn test_export_continues_past_undecodable_song() {
        let dir = tempdir().unwrap();
        write_tone(&dir.path().join("a.wav"), 2);
        fs::write(dir.path().join("b.wav"), b"definitely not a wav file").unwrap();
        let manifest = dir.path().join("manifest.json");
        fs::write(
            &manifest,
            r#"{"segments": [
                {"song": "a.wav", "name": "one", "start": 0.0, "end": 0.5},
                {"song": "b.wav", "name": "two", "start": 0.0, "end": 0.5},
                {"song": "a.wav", "name": "three", "start": 1.0, "end": 1.5},
                {"song": "b.wav", "name": "four", "start": 0.5, "end": 1.0}
            ]}"#,
        )
        .unwrap();
        let output = dir.path().join("out.zip");

        let summary = export(&CropperConfig::default(), &manifest, Some(&output)).unwrap();
        assert_eq!(summary.succeeded_count, 2);
        assert_eq!(summary.failed_count, 2);
        assert_eq!(summary.status(), ExportStatus::PartiallySucceeded { failed: 2 });
        assert_eq!(summary.entry_names, vec!["one.wav", "three.wav"]);
        let failed: Vec<&str> = summary.failures.iter().map(|f| f.segment_name.as_str()).collect();
        assert_eq!(failed, vec!["two", "four"]);
        assert!(summary.failures.iter().all(|f| f.segment_id.is_none()));
        assert!(output.exists());
    }

    #[test]
    fn test_export_out_of_range_entry_is_reported_in_order() {
        let dir = tempdir().unwrap();
        write_tone(&dir.path().join("a.wav"), 1);
        let manifest = dir.path().join("manifest.json");
        fs::write(
            &manifest,
            r#"{"segments": [
                {"song": "a.wav", "name": "late", "start": 0.5, "end": 3.0},
                {"song": "a.wav", "name": "fine", "start": 0.0, "end": 0.5}
            ]}"#,
        )
        .unwrap();

        let summary =
            export(&CropperConfig::default(), &manifest, Some(&dir.path().join("o.zip"))).unwrap();
        assert_eq!(summary.succeeded_count, 1);
        assert_eq!(summary.failures[0].segment_name, "late");
    }

    #[test]
    fn test_default_archive_name_uses_utc_date() {
        let before = Utc::now().date_naive();
        let name = default_archive_name();
        let after = Utc::now().date_naive();

        assert!(name == archive_file_name(before) || name == archive_file_name(after));
        assert_eq!(
            name.len(),
            "cropped_segments_YYYY-MM-DD.zip".len(),
            "unexpected name {}",
            name
        );
    }

    #[test]
    fn test_export_empty_manifest() {
        let dir = tempdir().unwrap();
        let manifest = dir.path().join("manifest.json");
        fs::write(&manifest, r#"{"segments": []}"#).unwrap();

        let err = export(&CropperConfig::default(), &manifest, None).unwrap_err();
        assert_eq!(err.error_code(), "EMPTY_SELECTION");
    }
}
