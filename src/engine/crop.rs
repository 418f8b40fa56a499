//! Sample Cropper
//!
//! Cuts a time range out of a decoded buffer in the sample domain. The output
//! keeps the source's sample rate and channel count; only the length changes.

use tracing::debug;

use crate::engine::buffer::PcmBuffer;
use crate::engine::wav::WavHeader;
use crate::error::{CropperError, Result};

/// Convert a time in seconds to a sample index, rounding toward negative
/// infinity
#[inline]
pub fn seconds_to_sample(seconds: f64, sample_rate: u32) -> i64 {
    (seconds * sample_rate as f64).floor() as i64
}

/// Crop `buffer` to the range `[start_secs, end_secs)`
///
/// `start_sample = floor(start × rate)`, `end_sample = floor(end × rate)`
/// and the output holds `end_sample − start_sample` samples per channel.
/// Positions outside the source (a decoder that over-reported duration) are
/// filled with silence.
///
/// # Errors
/// * `RegionInvalid` - If either bound is not finite
/// * `EmptyRange` - If the range covers zero or fewer samples
/// * `WavTooLarge` / `WavFormat` - If the result could not be encoded; checked
///   before any sample memory is allocated
///
/// # Example
/// ```
/// use segment_cropper::engine::{crop, PcmBuffer};
///
/// let source = PcmBuffer::silence(2, 48_000, 48_000).unwrap();
/// let cropped = crop(&source, 0.25, 0.5).unwrap();
/// assert_eq!(cropped.len(), 12_000);
/// assert_eq!(cropped.channels(), 2);
/// ```
pub fn crop(buffer: &PcmBuffer, start_secs: f64, end_secs: f64) -> Result<PcmBuffer> {
    if !start_secs.is_finite() || !end_secs.is_finite() {
        return Err(CropperError::RegionInvalid {
            reason: format!("non-finite crop bounds {}..{}", start_secs, end_secs),
        });
    }

    let sample_rate = buffer.sample_rate();
    let start_sample = seconds_to_sample(start_secs, sample_rate);
    let end_sample = seconds_to_sample(end_secs, sample_rate);
    let length = end_sample
        .checked_sub(start_sample)
        .ok_or_else(|| CropperError::RegionInvalid {
            reason: format!("crop range {}..{} is too long", start_secs, end_secs),
        })?;

    if length <= 0 {
        return Err(CropperError::EmptyRange {
            start_sample,
            end_sample,
        });
    }

    // Padding is bounded by what a WAV file can hold
    WavHeader::new(buffer.channels(), length as u64, sample_rate)?;
    let length = length as usize;
    let source_len = buffer.len() as i64;
    // Overlap of the requested range with the samples that actually exist
    let copy_from = start_sample.clamp(0, source_len);
    let copy_to = end_sample.clamp(0, source_len);
    let lead = (copy_from - start_sample) as usize;

    if start_sample < 0 || end_sample > source_len {
        debug!(
            start_sample,
            end_sample,
            source_len,
            "crop range exceeds decoded samples, padding with silence"
        );
    }

    let channels = buffer
        .iter_channels()
        .map(|source| {
            let mut cropped = vec![0.0_f32; length];
            if copy_to > copy_from {
                let copied = &source[copy_from as usize..copy_to as usize];
                cropped[lead..lead + copied.len()].copy_from_slice(copied);
            }
            cropped
        })
        .collect();

    PcmBuffer::new(channels, sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn ramp(len: usize, sample_rate: u32) -> PcmBuffer {
        let left: Vec<f32> = (0..len).map(|i| i as f32 / len as f32).collect();
        let right: Vec<f32> = left.iter().map(|s| -s).collect();
        PcmBuffer::new(vec![left, right], sample_rate).unwrap()
    }

    #[test]
    fn test_identity_crop() {
        let source = ramp(1000, 1000);
        let cropped = crop(&source, 0.0, source.duration_secs()).unwrap();
        assert_eq!(cropped, source);
    }

    #[test_case(0.0, 0.5 ; "leading half")]
    #[test_case(0.1234, 0.9876 ; "fractional bounds")]
    #[test_case(0.333, 0.334 ; "narrow window")]
    #[test_case(0.0005, 0.0015 ; "sub-sample bounds")]
    fn test_crop_length_matches_floor_rule(start: f64, end: f64) {
        let sample_rate = 1000;
        let source = ramp(1000, sample_rate);
        let cropped = crop(&source, start, end).unwrap();
        let expected = seconds_to_sample(end, sample_rate) - seconds_to_sample(start, sample_rate);
        assert_eq!(cropped.len() as i64, expected);
        assert_eq!(cropped.channels(), 2);
        assert_eq!(cropped.sample_rate(), sample_rate);
    }

    #[test]
    fn test_crop_copies_the_selected_samples() {
        let source = ramp(100, 100);
        let cropped = crop(&source, 0.25, 0.5).unwrap();
        assert_eq!(cropped.channel(0), &source.channel(0)[25..50]);
        assert_eq!(cropped.channel(1), &source.channel(1)[25..50]);
    }

    #[test_case(0.5, 0.5 ; "equal bounds")]
    #[test_case(0.6, 0.4 ; "reversed bounds")]
    #[test_case(0.5001, 0.5009 ; "same sample")]
    fn test_crop_empty_range(start: f64, end: f64) {
        let source = ramp(1000, 1000);
        match crop(&source, start, end) {
            Err(CropperError::EmptyRange { .. }) => {}
            other => panic!("Expected EmptyRange, got: {:?}", other),
        }
    }

    #[test]
    fn test_crop_pads_missing_tail_with_silence() {
        let source = ramp(100, 100);
        let cropped = crop(&source, 0.9, 1.2).unwrap();
        assert_eq!(cropped.len(), 30);
        assert_eq!(&cropped.channel(0)[..10], &source.channel(0)[90..]);
        assert!(cropped.channel(0)[10..].iter().all(|&s| s == 0.0));
        assert!(cropped.channel(1)[10..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_crop_entirely_past_the_end_is_silence() {
        let source = ramp(100, 100);
        let cropped = crop(&source, 2.0, 2.5).unwrap();
        assert_eq!(cropped.len(), 50);
        assert!(cropped.channel(0).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_crop_rejects_nan() {
        let source = ramp(100, 100);
        assert!(matches!(
            crop(&source, f64::NAN, 0.5),
            Err(CropperError::RegionInvalid { .. })
        ));
    }

    #[test]
    fn test_crop_beyond_wav_capacity_fails_without_allocating() {
        let source = ramp(100, 100);
        let err = crop(&source, 0.0, 1e300).unwrap_err();
        assert_eq!(err.error_code(), "WAV_TOO_LARGE");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_crop_with_overflowing_sample_span() {
        let source = ramp(100, 100);
        let err = crop(&source, -1e300, 1e300).unwrap_err();
        assert_eq!(err.error_code(), "REGION_INVALID");
    }
}
