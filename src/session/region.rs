//! Region Model
//!
//! The live time-range selection over one song. Two input channels edit it:
//! continuous drag updates that arrive as numbers, and text fields that
//! arrive as strings and are committed on blur or confirm. Both funnel into
//! one commit function, so a reader never sees a region that breaks
//! `0 <= start`, `end <= duration` or `end - start >= MIN_REGION_WIDTH`.

use std::fmt;

use tracing::trace;

use crate::config::RegionDefaults;
use crate::error::{CropperError, Result};
use crate::session::song::{Song, SongId};

/// Minimum region width in seconds
pub const MIN_REGION_WIDTH: f64 = 0.01;

/// Slack allowed when checking the width invariant, for float rounding
/// around `start + MIN_REGION_WIDTH`
const WIDTH_TOLERANCE: f64 = 1e-9;

/// Which text field a text update targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionField {
    Start,
    End,
}

impl fmt::Display for RegionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionField::Start => write!(f, "start"),
            RegionField::End => write!(f, "end"),
        }
    }
}

/// Outcome of a text commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextCommit {
    /// The value parsed and was committed (possibly clamped)
    Applied,
    /// The value did not parse; the last valid bound was kept
    Retained,
    /// The string contains characters the input layer should have blocked
    Rejected,
}

/// True if `s` contains only ASCII digits and at most one decimal point
///
/// The input layer calls this on every keystroke. The empty string is
/// accepted so a field can be cleared while typing.
pub fn is_valid_numeric_fragment(s: &str) -> bool {
    let mut seen_point = false;
    s.chars().all(|c| match c {
        '0'..='9' => true,
        '.' if !seen_point => {
            seen_point = true;
            true
        }
        _ => false,
    })
}

/// An editable selection `[start, end]` in seconds over one song
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    song_id: SongId,
    duration: f64,
    start: f64,
    end: f64,
    defaults: RegionDefaults,
}

impl Region {
    /// Create a region over `song` spanning the default fractions
    ///
    /// # Errors
    /// * `RegionInvalid` - If the song is shorter than `MIN_REGION_WIDTH`
    pub fn new(song: &Song, defaults: RegionDefaults) -> Result<Self> {
        let duration = song.duration();
        if duration < MIN_REGION_WIDTH {
            return Err(CropperError::RegionInvalid {
                reason: format!(
                    "song '{}' is {:.3}s long, shorter than the minimum region of {}s",
                    song.name(),
                    duration,
                    MIN_REGION_WIDTH
                ),
            });
        }

        let mut region = Self {
            song_id: song.id(),
            duration,
            start: 0.0,
            end: duration,
            defaults,
        };
        region.reset();
        Ok(region)
    }

    /// Create a region spanning `[0.1 × duration, 0.3 × duration]`
    pub fn create(song: &Song) -> Result<Self> {
        Self::new(song, RegionDefaults::default())
    }

    pub fn song_id(&self) -> SongId {
        self.song_id
    }

    /// Duration of the underlying song
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn width(&self) -> f64 {
        self.end - self.start
    }

    /// Apply a drag update
    ///
    /// Non-finite inputs leave that bound at its last committed value.
    pub fn update_from_drag(&mut self, new_start: f64, new_end: f64) {
        let start = if new_start.is_finite() { new_start } else { self.start };
        let end = if new_end.is_finite() { new_end } else { self.end };
        self.commit(start, end);
    }

    /// Commit a text field
    ///
    /// The parsed value is paired with the other field's committed value and
    /// goes through the same clamp-and-order rule as a drag. Moving the end
    /// to or before the start forces `end = start + MIN_REGION_WIDTH`.
    pub fn update_from_text(&mut self, field: RegionField, raw: &str) -> TextCommit {
        if !is_valid_numeric_fragment(raw) {
            return TextCommit::Rejected;
        }
        let value = match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => value,
            _ => {
                trace!(%field, raw, "unparsable text commit, keeping last value");
                return TextCommit::Retained;
            }
        };

        match field {
            RegionField::Start => self.commit(value, self.end),
            RegionField::End => self.commit(self.start, value),
        }
        TextCommit::Applied
    }

    /// Restore the default span
    pub fn reset(&mut self) {
        self.commit(
            self.duration * self.defaults.start_fraction,
            self.duration * self.defaults.end_fraction,
        );
    }

    /// True if the region satisfies its bounds and minimum width
    pub fn satisfies_invariant(&self) -> bool {
        self.start >= 0.0
            && self.end <= self.duration
            && self.end - self.start >= MIN_REGION_WIDTH - WIDTH_TOLERANCE
    }

    /// The single write path: clamp start into `[0, duration - ε]`, then end
    /// into `[start + ε, duration]`, and store both together.
    fn commit(&mut self, start: f64, end: f64) {
        let max_start = (self.duration - MIN_REGION_WIDTH).max(0.0);
        let start = start.clamp(0.0, max_start);
        let min_end = (start + MIN_REGION_WIDTH).min(self.duration);
        let end = end.clamp(min_end, self.duration);

        self.start = start;
        self.end = end;
        trace!(start, end, "region committed");
    }
}
