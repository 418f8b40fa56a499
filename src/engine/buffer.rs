//! PCM Buffer
//!
//! Decoded audio held as non-interleaved 32-bit float channels. A buffer is
//! produced by decoding or cropping and owned by exactly one pipeline stage
//! at a time.

use crate::error::{CropperError, Result};

// ============================================================================
// PCM Buffer
// ============================================================================

/// Linear PCM audio with one `Vec<f32>` per channel
///
/// # Invariants
/// - At least one channel
/// - Sample rate is non-zero
/// - Every channel has the same length
///
/// # Example
/// ```
/// use segment_cropper::engine::PcmBuffer;
///
/// let buffer = PcmBuffer::silence(2, 44_100, 44_100).unwrap();
/// assert_eq!(buffer.channels(), 2);
/// assert_eq!(buffer.len(), 44_100);
/// assert_eq!(buffer.duration_secs(), 1.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    /// Sample data: outer Vec is channels, inner Vec is samples
    samples: Vec<Vec<f32>>,
    /// Sample rate in Hz
    sample_rate: u32,
}

impl PcmBuffer {
    /// Create a buffer from per-channel sample data
    ///
    /// # Errors
    /// * `Decode` - If there are no channels, the rate is zero, or the
    ///   channels differ in length
    pub fn new(samples: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if samples.is_empty() {
            return Err(CropperError::decode("buffer has no channels"));
        }
        if sample_rate == 0 {
            return Err(CropperError::decode("sample rate must be positive"));
        }
        let expected = samples[0].len();
        if let Some((index, channel)) = samples
            .iter()
            .enumerate()
            .find(|(_, channel)| channel.len() != expected)
        {
            return Err(CropperError::decode(format!(
                "channel {} has {} samples, expected {}",
                index,
                channel.len(),
                expected
            )));
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Create a zeroed buffer with `len` samples per channel
    pub fn silence(channels: usize, len: usize, sample_rate: u32) -> Result<Self> {
        Self::new(vec![vec![0.0; len]; channels], sample_rate)
    }

    /// Create a mono sine wave, mainly for tests and fixtures
    pub fn sine_wave(frequency: f32, len: usize, sample_rate: u32) -> Result<Self> {
        let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate.max(1) as f32;
        let channel = (0..len).map(|i| (angular_freq * i as f32).sin()).collect();
        Self::new(vec![channel], sample_rate)
    }

    /// Create a buffer from interleaved sample data (L, R, L, R, ...)
    ///
    /// A trailing partial frame is an error rather than silently dropped.
    pub fn from_interleaved(
        interleaved: &[f32],
        channels: usize,
        sample_rate: u32,
    ) -> Result<Self> {
        if channels == 0 {
            return Err(CropperError::decode("buffer has no channels"));
        }
        if interleaved.len() % channels != 0 {
            return Err(CropperError::decode(format!(
                "interleaved data length {} is not divisible by channel count {}",
                interleaved.len(),
                channels
            )));
        }

        let frames = interleaved.len() / channels;
        let mut samples = vec![Vec::with_capacity(frames); channels];
        for frame in interleaved.chunks_exact(channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }

        Self::new(samples, sample_rate)
    }

    /// Convert the buffer to interleaved frame order
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut interleaved = Vec::with_capacity(self.channels() * self.len());
        for frame in 0..self.len() {
            for channel in &self.samples {
                interleaved.push(channel[frame]);
            }
        }
        interleaved
    }

    /// Number of channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Number of samples per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.first().map_or(0, Vec::len)
    }

    /// True when the buffer holds no frames
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.len() as f64 / self.sample_rate as f64
    }

    /// Get a channel's samples
    ///
    /// # Panics
    /// Panics if `index` is out of range.
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Iterate over channels in order
    pub fn iter_channels(&self) -> impl Iterator<Item = &[f32]> {
        self.samples.iter().map(Vec::as_slice)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_buffer_new() {
        let buffer = PcmBuffer::new(vec![vec![0.1, 0.2], vec![0.3, 0.4]], 8000).unwrap();
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.sample_rate(), 8000);
        assert_eq!(buffer.channel(1), &[0.3, 0.4]);
    }

    #[test]
    fn test_buffer_rejects_no_channels() {
        let err = PcmBuffer::new(Vec::new(), 44_100).unwrap_err();
        assert_eq!(err.error_code(), "DECODE_ERROR");
    }

    #[test]
    fn test_buffer_rejects_zero_rate() {
        assert!(PcmBuffer::new(vec![vec![0.0]], 0).is_err());
    }

    #[test]
    fn test_buffer_rejects_ragged_channels() {
        let err = PcmBuffer::new(vec![vec![0.0; 4], vec![0.0; 3]], 44_100).unwrap_err();
        assert!(err.to_string().contains("channel 1"));
    }

    #[test]
    fn test_buffer_duration() {
        let buffer = PcmBuffer::silence(1, 22_050, 44_100).unwrap();
        assert_relative_eq!(buffer.duration_secs(), 0.5);
    }

    #[test]
    fn test_buffer_empty_is_allowed() {
        let buffer = PcmBuffer::silence(2, 0, 44_100).unwrap();
        assert!(buffer.is_empty());
        assert!(buffer.to_interleaved().is_empty());
    }

    #[test]
    fn test_buffer_from_interleaved_stereo() {
        let buffer =
            PcmBuffer::from_interleaved(&[0.1, -0.1, 0.2, -0.2, 0.3, -0.3], 2, 48_000).unwrap();
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.channel(0), &[0.1, 0.2, 0.3]);
        assert_eq!(buffer.channel(1), &[-0.1, -0.2, -0.3]);
    }

    #[test]
    fn test_buffer_from_interleaved_partial_frame() {
        assert!(PcmBuffer::from_interleaved(&[0.1, 0.2, 0.3], 2, 48_000).is_err());
    }

    #[test]
    fn test_buffer_to_interleaved() {
        let buffer = PcmBuffer::new(vec![vec![1.0, 2.0], vec![3.0, 4.0]], 48_000).unwrap();
        assert_eq!(buffer.to_interleaved(), vec![1.0, 3.0, 2.0, 4.0]);
    }

    #[test]
    fn test_sine_wave_starts_at_zero() {
        let buffer = PcmBuffer::sine_wave(440.0, 100, 44_100).unwrap();
        assert_eq!(buffer.channels(), 1);
        assert_eq!(buffer.len(), 100);
        assert_relative_eq!(buffer.channel(0)[0], 0.0);
        assert!(buffer.channel(0).iter().all(|s| s.abs() <= 1.0));
    }
}
