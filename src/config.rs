//! Runtime configuration
//!
//! Loaded from a JSON file; every field has a default so partial files work.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CropperError, Result};

/// Largest accepted upload (1 GiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024 * 1024;

/// Upper bound on export worker threads
pub const MAX_EXPORT_WORKERS: usize = 16;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropperConfig {
    pub region: RegionDefaults,
    pub upload: UploadLimits,
    pub export: ExportSettings,
}

/// Initial span of a freshly created region, as fractions of the song
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionDefaults {
    pub start_fraction: f64,
    pub end_fraction: f64,
}

impl Default for RegionDefaults {
    fn default() -> Self {
        Self {
            start_fraction: 0.1,
            end_fraction: 0.3,
        }
    }
}

/// Upload validation rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadLimits {
    /// Maximum file size in bytes
    pub max_file_size: u64,
    /// Lowercase file extensions accepted as audio
    pub accepted_extensions: Vec<String>,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            accepted_extensions: ["mp3", "mpeg", "wav", "ogg", "aac", "m4a"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl UploadLimits {
    pub fn accepts_extension(&self, extension: &str) -> bool {
        let extension = extension.to_ascii_lowercase();
        self.accepted_extensions.iter().any(|ext| *ext == extension)
    }
}

/// Batch export tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Segments processed concurrently; 1 runs them in order on the caller's thread
    pub max_workers: usize,
    /// Share of the progress scale held back for archive assembly
    pub archive_reserve: f64,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            max_workers: 1,
            archive_reserve: 0.1,
        }
    }
}

impl CropperConfig {
    /// Load and validate a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CropperError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let json = fs::read_to_string(path)?;
        let config: CropperConfig = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        let RegionDefaults {
            start_fraction,
            end_fraction,
        } = self.region;
        if !(0.0..1.0).contains(&start_fraction)
            || !(0.0..=1.0).contains(&end_fraction)
            || end_fraction <= start_fraction
        {
            return Err(CropperError::Config {
                reason: format!(
                    "region fractions must satisfy 0 <= start < end <= 1, got {}..{}",
                    start_fraction, end_fraction
                ),
            });
        }

        if self.upload.max_file_size == 0 {
            return Err(CropperError::Config {
                reason: "upload.max_file_size must be positive".to_string(),
            });
        }

        if !(1..=MAX_EXPORT_WORKERS).contains(&self.export.max_workers) {
            return Err(CropperError::Config {
                reason: format!(
                    "export.max_workers must be between 1 and {}, got {}",
                    MAX_EXPORT_WORKERS, self.export.max_workers
                ),
            });
        }

        if !(0.0..1.0).contains(&self.export.archive_reserve) {
            return Err(CropperError::Config {
                reason: format!(
                    "export.archive_reserve must be in [0, 1), got {}",
                    self.export.archive_reserve
                ),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = CropperConfig::default();
        config.validate().unwrap();
        assert_eq!(config.region.start_fraction, 0.1);
        assert_eq!(config.region.end_fraction, 0.3);
        assert_eq!(config.export.max_workers, 1);
        assert!(config.upload.accepts_extension("WAV"));
        assert!(!config.upload.accepts_extension("txt"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cropper.json");
        fs::write(&path, r#"{"export": {"max_workers": 4}}"#).unwrap();

        let config = CropperConfig::from_file(&path).unwrap();
        assert_eq!(config.export.max_workers, 4);
        assert_eq!(config.export.archive_reserve, 0.1);
        assert_eq!(config.region, RegionDefaults::default());
    }

    #[test]
    fn test_rejects_reversed_fractions() {
        let mut config = CropperConfig::default();
        config.region.start_fraction = 0.5;
        config.region.end_fraction = 0.2;
        assert_eq!(config.validate().unwrap_err().error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_rejects_zero_workers() {
        let mut config = CropperConfig::default();
        config.export.max_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = CropperConfig::from_file(Path::new("/nonexistent/cropper.json")).unwrap_err();
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");
    }
}
