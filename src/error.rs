//! Error handling for the segment cropper
//!
//! Every failure carries enough context to be attributed either to a single
//! segment or to the export job as a whole.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for cropper operations
pub type Result<T> = std::result::Result<T, CropperError>;

/// Main error type for cropper operations
#[derive(Error, Debug)]
pub enum CropperError {
    // Source Errors
    #[error("Failed to decode audio: {reason}")]
    Decode {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("File type \"{extension}\" is not supported for {file}. Please upload MP3, WAV, OGG, AAC, or M4A files.")]
    UnsupportedFile { file: String, extension: String },

    #[error("File size of {file} ({size}) exceeds the maximum limit of {limit}.")]
    FileTooLarge {
        file: String,
        size: String,
        limit: String,
    },

    // Selection Errors
    #[error("Invalid time range for cropping: samples {start_sample}..{end_sample}")]
    EmptyRange { start_sample: i64, end_sample: i64 },

    #[error("Cropped audio needs {data_bytes} data bytes, more than a WAV container can address")]
    WavTooLarge { data_bytes: u64 },

    #[error("Audio format cannot be described by a 16-bit WAV header: {reason}")]
    WavFormat { reason: String },

    #[error("Invalid region: {reason}")]
    RegionInvalid { reason: String },

    #[error("Invalid segment name: {reason}")]
    InvalidName { reason: String },

    // Lookup Errors
    #[error("Song not found: {id}")]
    SongNotFound { id: String },

    #[error("Segment not found: {id}")]
    SegmentNotFound { id: String },

    // Export Errors
    #[error("Please select at least one segment to export.")]
    EmptySelection,

    #[error("Export job {job_id} cannot start from state {state}")]
    JobNotIdle { job_id: String, state: String },

    #[error("Failed to start export workers: {reason}")]
    WorkerPool { reason: String },

    #[error("Archive assembly failed: {reason}")]
    Packaging {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Configuration Errors
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CropperError {
    /// Shorthand for a decode failure without an underlying cause
    pub fn decode(reason: impl Into<String>) -> Self {
        CropperError::Decode {
            reason: reason.into(),
            source: None,
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            CropperError::Decode { .. } => "DECODE_ERROR",
            CropperError::UnsupportedFile { .. } => "UNSUPPORTED_FILE",
            CropperError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            CropperError::EmptyRange { .. } => "EMPTY_RANGE",
            CropperError::WavTooLarge { .. } => "WAV_TOO_LARGE",
            CropperError::WavFormat { .. } => "WAV_FORMAT",
            CropperError::RegionInvalid { .. } => "REGION_INVALID",
            CropperError::InvalidName { .. } => "INVALID_NAME",
            CropperError::SongNotFound { .. } => "SONG_NOT_FOUND",
            CropperError::SegmentNotFound { .. } => "SEGMENT_NOT_FOUND",
            CropperError::EmptySelection => "EMPTY_SELECTION",
            CropperError::JobNotIdle { .. } => "JOB_NOT_IDLE",
            CropperError::WorkerPool { .. } => "WORKER_POOL",
            CropperError::Packaging { .. } => "PACKAGING_ERROR",
            CropperError::Config { .. } => "CONFIG_ERROR",
            CropperError::FileNotFound { .. } => "FILE_NOT_FOUND",
            CropperError::Io(_) => "IO_ERROR",
            CropperError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Segment-level errors are recorded against one segment and the batch
    /// carries on. Everything else aborts the current operation.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CropperError::Decode { .. }
                | CropperError::EmptyRange { .. }
                | CropperError::WavTooLarge { .. }
                | CropperError::WavFormat { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            CropperError::Decode { .. } => vec![
                "Check if the file plays in another application",
                "Try converting the file to WAV format first",
            ],
            CropperError::UnsupportedFile { .. } => vec![
                "Convert to WAV, MP3, OGG, AAC, or M4A format",
            ],
            CropperError::FileTooLarge { .. } => vec![
                "Trim the file in another editor before uploading",
                "Raise upload.max_file_size in the configuration",
            ],
            CropperError::EmptyRange { .. } | CropperError::RegionInvalid { .. } => vec![
                "Widen the selection so the end is after the start",
                "Reset the region to the default span",
            ],
            CropperError::WavTooLarge { .. } => vec!["Split the selection into shorter segments"],
            CropperError::WavFormat { .. } => vec![
                "Resample the source to a standard rate",
                "Downmix the source to fewer channels",
            ],
            CropperError::InvalidName { .. } => vec!["Please provide a name for the segment"],
            CropperError::EmptySelection => vec!["Select at least one saved segment"],
            CropperError::WorkerPool { .. } => vec!["Lower export.max_workers and retry"],
            CropperError::Packaging { .. } => vec![
                "Free up memory and try again",
                "Export fewer segments at once",
            ],
            _ => vec![],
        }
    }
}
