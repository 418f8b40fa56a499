//! Segments and the segment list
//!
//! A [`Segment`] is a committed snapshot of a [`Region`]: a named time range
//! over one song. Only its name can change after creation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::error::{CropperError, Result};
use crate::session::region::Region;
use crate::session::song::{Song, SongId, SongLibrary};

/// Identifier of a saved segment
pub type SegmentId = Uuid;

/// Default name offered for the next segment
pub fn default_segment_name(now: DateTime<Utc>) -> String {
    format!("Segment {}", now.timestamp_millis())
}

/// Trim a user-supplied name, rejecting names that are blank
fn clean_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CropperError::InvalidName {
            reason: "Please provide a name for the segment.".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

/// A named, committed crop request
#[derive(Debug, Clone)]
pub struct Segment {
    id: SegmentId,
    name: String,
    start_time: f64,
    end_time: f64,
    song: Arc<Song>,
    created_at: DateTime<Utc>,
}

impl Segment {
    /// Create a segment over `song`
    ///
    /// # Errors
    /// * `InvalidName` - If the name is blank after trimming
    /// * `RegionInvalid` - Unless `0 <= start_time < end_time <= song.duration()`
    pub fn new(name: &str, start_time: f64, end_time: f64, song: Arc<Song>) -> Result<Self> {
        let name = clean_name(name)?;

        let in_bounds = start_time.is_finite()
            && end_time.is_finite()
            && start_time >= 0.0
            && start_time < end_time
            && end_time <= song.duration();
        if !in_bounds {
            return Err(CropperError::RegionInvalid {
                reason: format!(
                    "segment '{}' spans {}..{}s, outside song '{}' of {}s",
                    name,
                    start_time,
                    end_time,
                    song.name(),
                    song.duration()
                ),
            });
        }

        Ok(Self {
            id: Uuid::new_v4(),
            name,
            start_time,
            end_time,
            song,
            created_at: Utc::now(),
        })
    }

    /// Snapshot a region, provided its song is still in the library
    ///
    /// # Errors
    /// * `SongNotFound` - If the region's song was removed
    /// * `InvalidName` / `RegionInvalid` - As for [`Segment::new`]
    pub fn from_region(region: &Region, library: &SongLibrary, name: &str) -> Result<Self> {
        let song = library
            .get(region.song_id())
            .ok_or_else(|| CropperError::SongNotFound {
                id: region.song_id().to_string(),
            })?;
        Self::new(name, region.start(), region.end(), Arc::clone(song))
    }

    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    pub fn song(&self) -> &Arc<Song> {
        &self.song
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Rename the segment; the new name is trimmed and must not be blank
    pub fn rename(&mut self, name: &str) -> Result<()> {
        self.name = clean_name(name)?;
        Ok(())
    }
}

/// Saved segments in the order they were created
#[derive(Debug, Default)]
pub struct SegmentList {
    segments: Vec<Segment>,
}

impl SegmentList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment
    pub fn add(&mut self, segment: Segment) -> SegmentId {
        let id = segment.id();
        info!(
            %id,
            name = segment.name(),
            start = segment.start_time(),
            end = segment.end_time(),
            "segment saved"
        );
        self.segments.push(segment);
        id
    }

    /// Commit a region as a new segment
    pub fn save_region(
        &mut self,
        region: &Region,
        library: &SongLibrary,
        name: &str,
    ) -> Result<SegmentId> {
        let segment = Segment::from_region(region, library, name)?;
        Ok(self.add(segment))
    }

    pub fn get(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.iter().find(|segment| segment.id() == id)
    }

    pub fn rename(&mut self, id: SegmentId, name: &str) -> Result<()> {
        self.segments
            .iter_mut()
            .find(|segment| segment.id() == id)
            .ok_or_else(|| CropperError::SegmentNotFound { id: id.to_string() })?
            .rename(name)
    }

    pub fn remove(&mut self, id: SegmentId) -> Result<Segment> {
        let index = self
            .segments
            .iter()
            .position(|segment| segment.id() == id)
            .ok_or_else(|| CropperError::SegmentNotFound { id: id.to_string() })?;
        Ok(self.segments.remove(index))
    }

    /// Drop every segment cut from `song_id`, returning how many were removed
    pub fn remove_for_song(&mut self, song_id: SongId) -> usize {
        let before = self.segments.len();
        self.segments.retain(|segment| segment.song().id() != song_id);
        before - self.segments.len()
    }

    /// The segments whose ids are in `ids`, in list order
    ///
    /// Unknown ids are ignored; the order of `ids` does not matter.
    pub fn select(&self, ids: &[SegmentId]) -> Vec<Segment> {
        self.segments
            .iter()
            .filter(|segment| ids.contains(&segment.id()))
            .cloned()
            .collect()
    }

    /// Combined duration of the selected segments
    pub fn total_duration(&self, ids: &[SegmentId]) -> f64 {
        self.segments
            .iter()
            .filter(|segment| ids.contains(&segment.id()))
            .map(Segment::duration)
            .sum()
    }

    pub fn ids(&self) -> Vec<SegmentId> {
        self.segments.iter().map(Segment::id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
