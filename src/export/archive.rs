//! Archive Packager
//!
//! Collects named WAV buffers into one deflate-compressed ZIP. Entry names
//! are sanitized and then made unique in insertion order, so two segments
//! that sanitize to the same name both survive (`my_clip_.wav`,
//! `my_clip__2.wav`).

use std::collections::HashSet;
use std::io::{Cursor, Write};

use chrono::NaiveDate;
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{CropperError, Result};

/// Extension appended to every entry
pub const ENTRY_EXTENSION: &str = "wav";

/// Replace every character outside `[a-zA-Z0-9]` with `_` and lowercase
///
/// ```
/// use segment_cropper::export::sanitize_name;
///
/// assert_eq!(sanitize_name("My Clip!"), "my_clip_");
/// ```
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Suggested download name for an export made on `date`
pub fn archive_file_name(date: NaiveDate) -> String {
    format!("cropped_segments_{}.zip", date.format("%Y-%m-%d"))
}

fn packaging_error(
    reason: impl Into<String>,
    e: impl std::error::Error + Send + Sync + 'static,
) -> CropperError {
    CropperError::Packaging {
        reason: reason.into(),
        source: Some(Box::new(e)),
    }
}

/// Builds an archive one entry at a time
///
/// Nothing is observable until [`ArchivePackager::finish`]; dropping the
/// packager discards every entry added so far.
pub struct ArchivePackager {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    options: FileOptions,
    taken: HashSet<String>,
    entry_names: Vec<String>,
}

impl Default for ArchivePackager {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchivePackager {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            options: FileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .unix_permissions(0o644),
            taken: HashSet::new(),
            entry_names: Vec::new(),
        }
    }

    /// Pick the entry name for `name`: the sanitized base, or the base with
    /// the first free `_2`, `_3`, ... suffix
    fn claim_name(&mut self, name: &str) -> String {
        let base = sanitize_name(name);
        let mut candidate = format!("{}.{}", base, ENTRY_EXTENSION);
        let mut suffix = 2;
        while self.taken.contains(&candidate) {
            candidate = format!("{}_{}.{}", base, suffix, ENTRY_EXTENSION);
            suffix += 1;
        }
        if suffix > 2 {
            debug!(name, entry = %candidate, "disambiguated duplicate entry name");
        }
        self.taken.insert(candidate.clone());
        candidate
    }

    /// Add an entry, returning the file name it was stored under
    pub fn add(&mut self, name: &str, bytes: &[u8]) -> Result<String> {
        let entry = self.claim_name(name);
        self.writer
            .start_file(entry.as_str(), self.options)
            .map_err(|e| packaging_error(format!("cannot start entry {}", entry), e))?;
        self.writer
            .write_all(bytes)
            .map_err(|e| packaging_error(format!("cannot write entry {}", entry), e))?;
        self.entry_names.push(entry.clone());
        Ok(entry)
    }

    /// Entry names in insertion order
    pub fn entry_names(&self) -> &[String] {
        &self.entry_names
    }

    /// Write the central directory and return the archive bytes
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let cursor = self
            .writer
            .finish()
            .map_err(|e| packaging_error("cannot finalize archive", e))?;
        Ok(cursor.into_inner())
    }
}

/// A finished archive and the names its entries were stored under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedArchive {
    pub bytes: Vec<u8>,
    pub entry_names: Vec<String>,
}

/// Pack `(name, bytes)` pairs into a ZIP, preserving their order
pub fn pack<N, B>(entries: impl IntoIterator<Item = (N, B)>) -> Result<PackedArchive>
where
    N: AsRef<str>,
    B: AsRef<[u8]>,
{
    let mut packager = ArchivePackager::new();
    for (name, bytes) in entries {
        packager.add(name.as_ref(), bytes.as_ref())?;
    }
    let entry_names = packager.entry_names().to_vec();
    let bytes = packager.finish()?;
    Ok(PackedArchive { bytes, entry_names })
}
