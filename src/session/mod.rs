//! Session State
//!
//! What the user builds up before exporting:
//! - Uploaded songs
//! - The live region over the song being cropped
//! - Saved segments

pub mod region;
pub mod segment;
pub mod song;

pub use region::{is_valid_numeric_fragment, Region, RegionField, TextCommit, MIN_REGION_WIDTH};
pub use segment::{default_segment_name, Segment, SegmentId, SegmentList};
pub use song::{display_name, DirectoryImport, Song, SongId, SongLibrary, SongSource};
