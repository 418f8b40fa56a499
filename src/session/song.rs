//! Songs and the song library
//!
//! A [`Song`] is created on upload and never changes afterwards, except that
//! its sample rate becomes known the first time it is decoded.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::UploadLimits;
use crate::engine::decode::Decoder;
use crate::engine::format::format_file_size;
use crate::error::{CropperError, Result};

/// Identifier of an uploaded song
pub type SongId = Uuid;

/// Where a song's encoded bytes live
#[derive(Clone)]
pub enum SongSource {
    /// Bytes held in memory
    Memory(Arc<[u8]>),
    /// Bytes read from disk on demand
    File(PathBuf),
}

impl SongSource {
    /// Load the encoded bytes
    pub fn load(&self) -> Result<Arc<[u8]>> {
        match self {
            SongSource::Memory(bytes) => Ok(Arc::clone(bytes)),
            SongSource::File(path) => {
                if !path.exists() {
                    return Err(CropperError::FileNotFound { path: path.clone() });
                }
                Ok(Arc::from(fs::read(path)?))
            }
        }
    }
}

impl fmt::Debug for SongSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SongSource::Memory(bytes) => write!(f, "Memory({} bytes)", bytes.len()),
            SongSource::File(path) => write!(f, "File({})", path.display()),
        }
    }
}

/// An uploaded audio track
#[derive(Debug)]
pub struct Song {
    id: SongId,
    name: String,
    source: SongSource,
    duration: f64,
    sample_rate: OnceLock<u32>,
    size_bytes: u64,
}

impl Song {
    /// Create a song from already-known metadata
    ///
    /// # Errors
    /// * `RegionInvalid` - If `duration` is negative or not finite
    pub fn new(
        name: impl Into<String>,
        source: SongSource,
        duration: f64,
        size_bytes: u64,
    ) -> Result<Self> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(CropperError::RegionInvalid {
                reason: format!("song duration must be finite and non-negative, got {}", duration),
            });
        }

        Ok(Self {
            id: Uuid::new_v4(),
            name: name.into(),
            source,
            duration,
            sample_rate: OnceLock::new(),
            size_bytes,
        })
    }

    /// Create an in-memory song
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>, duration: f64) -> Result<Self> {
        let size_bytes = bytes.len() as u64;
        Self::new(name, SongSource::Memory(Arc::from(bytes)), duration, size_bytes)
    }

    pub fn id(&self) -> SongId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &SongSource {
        &self.source
    }

    /// Total duration in seconds
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Sample rate, known once the song has been decoded
    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate.get().copied()
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Load the encoded source bytes
    pub fn load_bytes(&self) -> Result<Arc<[u8]>> {
        self.source.load()
    }

    /// Remember the decoded sample rate. The first recorded value wins.
    pub fn record_sample_rate(&self, sample_rate: u32) {
        if let Err(rejected) = self.sample_rate.set(sample_rate) {
            if Some(rejected) != self.sample_rate() {
                warn!(
                    song = %self.name,
                    recorded = ?self.sample_rate(),
                    rejected,
                    "decoder reported a different sample rate"
                );
            }
        }
    }
}

/// Display name for an uploaded file: the file name without its extension
pub fn display_name(file_name: &str) -> String {
    let path = Path::new(file_name);
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name)
        .to_string()
}

/// Result of importing a directory of songs
#[derive(Debug, Default)]
pub struct DirectoryImport {
    /// Songs added to the library, in walk order
    pub songs: Vec<Arc<Song>>,
    /// Files that looked like audio but could not be imported
    pub errors: Vec<(PathBuf, CropperError)>,
}

/// The songs uploaded during a session, in upload order
#[derive(Debug, Default)]
pub struct SongLibrary {
    songs: Vec<Arc<Song>>,
    limits: UploadLimits,
}

impl SongLibrary {
    pub fn new(limits: UploadLimits) -> Self {
        Self {
            songs: Vec::new(),
            limits,
        }
    }

    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    /// Check a file's type and size before accepting it
    ///
    /// # Errors
    /// * `UnsupportedFile` - If the extension is not an accepted audio type
    /// * `FileTooLarge` - If the file exceeds the configured limit
    pub fn validate_upload(&self, file_name: &str, size_bytes: u64) -> Result<()> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");
        if !self.limits.accepts_extension(extension) {
            return Err(CropperError::UnsupportedFile {
                file: file_name.to_string(),
                extension: extension.to_string(),
            });
        }

        if size_bytes > self.limits.max_file_size {
            return Err(CropperError::FileTooLarge {
                file: file_name.to_string(),
                size: format_file_size(size_bytes),
                limit: format_file_size(self.limits.max_file_size),
            });
        }

        Ok(())
    }

    /// Add a song whose metadata is already known
    pub fn add(&mut self, song: Song) -> Arc<Song> {
        let song = Arc::new(song);
        info!(id = %song.id(), name = song.name(), duration = song.duration(), "song added");
        self.songs.push(Arc::clone(&song));
        song
    }

    /// Validate and add an in-memory upload, probing its duration by decoding
    pub fn import_bytes(
        &mut self,
        file_name: &str,
        bytes: Vec<u8>,
        decoder: &dyn Decoder,
    ) -> Result<Arc<Song>> {
        self.validate_upload(file_name, bytes.len() as u64)?;
        let probe = decoder.decode(&bytes)?;

        let song = Song::from_bytes(display_name(file_name), bytes, probe.duration_secs())?;
        song.record_sample_rate(probe.sample_rate());
        Ok(self.add(song))
    }

    /// Validate and add a file on disk. The bytes are re-read at export time.
    pub fn import_file(&mut self, path: &Path, decoder: &dyn Decoder) -> Result<Arc<Song>> {
        if !path.exists() {
            return Err(CropperError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        let size_bytes = fs::metadata(path)?.len();
        self.validate_upload(&file_name, size_bytes)?;

        let bytes = fs::read(path)?;
        let probe = decoder.decode(&bytes)?;

        let song = Song::new(
            display_name(&file_name),
            SongSource::File(path.to_path_buf()),
            probe.duration_secs(),
            size_bytes,
        )?;
        song.record_sample_rate(probe.sample_rate());
        Ok(self.add(song))
    }

    /// Import every accepted audio file under `dir`, sorted by file name
    ///
    /// Files with other extensions are skipped. Files that fail validation or
    /// decoding are reported without stopping the walk.
    pub fn import_dir(&mut self, dir: &Path, decoder: &dyn Decoder) -> Result<DirectoryImport> {
        if !dir.is_dir() {
            return Err(CropperError::FileNotFound {
                path: dir.to_path_buf(),
            });
        }

        let mut report = DirectoryImport::default();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
                    report.errors.push((path, CropperError::Io(e.into())));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let accepted = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map_or(false, |ext| self.limits.accepts_extension(ext));
            if !accepted {
                debug!(path = %path.display(), "skipping non-audio file");
                continue;
            }

            match self.import_file(path, decoder) {
                Ok(song) => report.songs.push(song),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to import file");
                    report.errors.push((path.to_path_buf(), e));
                }
            }
        }

        Ok(report)
    }

    pub fn get(&self, id: SongId) -> Option<&Arc<Song>> {
        self.songs.iter().find(|song| song.id() == id)
    }

    pub fn contains(&self, id: SongId) -> bool {
        self.get(id).is_some()
    }

    /// Remove a song from the session
    ///
    /// Regions over the song can no longer be saved; callers should also drop
    /// the song's segments (see `SegmentList::remove_for_song`).
    pub fn remove(&mut self, id: SongId) -> Result<Arc<Song>> {
        let index = self
            .songs
            .iter()
            .position(|song| song.id() == id)
            .ok_or_else(|| CropperError::SongNotFound { id: id.to_string() })?;
        let song = self.songs.remove(index);
        info!(id = %song.id(), name = song.name(), "song removed");
        Ok(song)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Song>> {
        self.songs.iter()
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{encode, PcmBuffer, WavDecoder};
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    fn wav_fixture(seconds: usize) -> Vec<u8> {
        let buffer = PcmBuffer::silence(2, seconds * 8_000, 8_000).unwrap();
        encode(&buffer).unwrap()
    }

    #[test]
    fn test_display_name_strips_extension() {
        assert_eq!(display_name("My Song.mp3"), "My Song");
        assert_eq!(display_name("live.set.wav"), "live.set");
        assert_eq!(display_name("noext"), "noext");
    }

    #[test]
    fn test_song_rejects_bad_duration() {
        assert!(Song::from_bytes("x", vec![], f64::NAN).is_err());
        assert!(Song::from_bytes("x", vec![], -1.0).is_err());
    }

    #[test]
    fn test_sample_rate_recorded_once() {
        let song = Song::from_bytes("x", vec![], 1.0).unwrap();
        assert_eq!(song.sample_rate(), None);
        song.record_sample_rate(44_100);
        song.record_sample_rate(48_000);
        assert_eq!(song.sample_rate(), Some(44_100));
    }

    #[test]
    fn test_validate_upload() {
        let library = SongLibrary::new(UploadLimits {
            max_file_size: 1024,
            ..UploadLimits::default()
        });

        library.validate_upload("a.wav", 1024).unwrap();
        library.validate_upload("b.MP3", 10).unwrap();

        let err = library.validate_upload("notes.txt", 10).unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_FILE");

        let err = library.validate_upload("big.wav", 2048).unwrap_err();
        assert_eq!(err.error_code(), "FILE_TOO_LARGE");
        assert!(err.to_string().contains("2 KB"));
        assert!(err.to_string().contains("1 KB"));
    }

    #[test]
    fn test_import_bytes_probes_duration() {
        let mut library = SongLibrary::default();
        let song = library
            .import_bytes("Intro.wav", wav_fixture(3), &WavDecoder)
            .unwrap();
        assert_eq!(song.name(), "Intro");
        assert_relative_eq!(song.duration(), 3.0);
        assert_eq!(song.sample_rate(), Some(8_000));
        assert_eq!(library.len(), 1);
    }

    #[test]
    fn test_import_bytes_rejects_undecodable() {
        let mut library = SongLibrary::new(UploadLimits::default());
        let err = library
            .import_bytes("broken.wav", b"junk".to_vec(), &WavDecoder)
            .unwrap_err();
        assert_eq!(err.error_code(), "DECODE_ERROR");
        assert!(library.is_empty());
    }

    #[test]
    fn test_import_file_reads_lazily() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("take.wav");
        fs::write(&path, wav_fixture(1)).unwrap();

        let mut library = SongLibrary::new(UploadLimits::default());
        let song = library.import_file(&path, &WavDecoder).unwrap();
        assert!(matches!(song.source(), SongSource::File(_)));
        assert_eq!(song.load_bytes().unwrap().len(), 44 + 8_000 * 2 * 2);
    }

    #[test]
    fn test_import_dir_skips_and_reports() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.wav"), wav_fixture(1)).unwrap();
        fs::write(dir.path().join("a.wav"), wav_fixture(2)).unwrap();
        fs::write(dir.path().join("cover.jpg"), b"jpeg").unwrap();
        fs::write(dir.path().join("c.wav"), b"broken").unwrap();

        let mut library = SongLibrary::new(UploadLimits::default());
        let report = library.import_dir(dir.path(), &WavDecoder).unwrap();

        let names: Vec<&str> = report.songs.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].0.ends_with("c.wav"));
    }

    #[test]
    fn test_remove_song() {
        let mut library = SongLibrary::new(UploadLimits::default());
        let song = library.add(Song::from_bytes("x", vec![1, 2, 3], 1.0).unwrap());
        assert!(library.contains(song.id()));

        library.remove(song.id()).unwrap();
        assert!(!library.contains(song.id()));
        assert_eq!(
            library.remove(song.id()).unwrap_err().error_code(),
            "SONG_NOT_FOUND"
        );
    }
}
