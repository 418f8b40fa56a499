//! Export
//!
//! Turns a selection of segments into one archive of WAV files:
//! - [`ExportOrchestrator`] runs decode, crop and encode per segment
//! - [`ArchivePackager`] bundles the encoded files

pub mod archive;
pub mod orchestrator;

pub use archive::{archive_file_name, pack, sanitize_name, ArchivePackager, PackedArchive};
pub use orchestrator::{
    CancelToken, ExportJob, ExportOrchestrator, ExportOutcome, ExportProgress, ExportStage,
    ExportStatus, ExportSummary, JobState, SegmentFailure, SegmentResult,
};
