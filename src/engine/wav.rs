//! WAV Encoder
//!
//! Serializes a [`PcmBuffer`] into a canonical 16-bit integer PCM RIFF/WAVE
//! file, entirely in memory. The layout is fixed:
//!
//! | Offset | Size | Field                                   |
//! |--------|------|-----------------------------------------|
//! | 0      | 4    | `"RIFF"`                                |
//! | 4      | 4    | `36 + data_bytes`                       |
//! | 8      | 4    | `"WAVE"`                                |
//! | 12     | 4    | `"fmt "`                                |
//! | 16     | 4    | `16` (fmt chunk size)                   |
//! | 20     | 2    | `1` (integer PCM)                       |
//! | 22     | 2    | channel count                           |
//! | 24     | 4    | sample rate                             |
//! | 28     | 4    | byte rate (`rate × channels × 2`)       |
//! | 32     | 2    | block align (`channels × 2`)            |
//! | 34     | 2    | `16` (bits per sample)                  |
//! | 36     | 4    | `"data"`                                |
//! | 40     | 4    | `data_bytes`                            |
//! | 44     | ...  | interleaved little-endian `i16` frames  |
//!
//! All integers are little-endian.

use crate::engine::buffer::PcmBuffer;
use crate::error::{CropperError, Result};

/// Size of the canonical header in bytes
pub const WAV_HEADER_LEN: usize = 44;

/// Bits per encoded sample
pub const BITS_PER_SAMPLE: u16 = 16;

/// Bytes per encoded sample
const BYTES_PER_SAMPLE: u16 = BITS_PER_SAMPLE / 8;

/// Scale applied to a clamped float sample before truncation
pub const QUANTIZE_SCALE: f32 = 32767.0;

/// Header fields derived from a buffer's format and length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub channels: u16,
    pub sample_rate: u32,
    /// `channels × 2`
    pub block_align: u16,
    /// `sample_rate × block_align`
    pub byte_rate: u32,
    pub data_bytes: u32,
}

impl WavHeader {
    /// Compute the header for `frames` frames of `channels` channels
    ///
    /// # Errors
    /// * `WavTooLarge` - If the audio does not fit the 32-bit RIFF size fields
    /// * `WavFormat` - If block align or byte rate do not fit their fields
    pub fn new(channels: usize, frames: u64, sample_rate: u32) -> Result<Self> {
        let data_bytes = frames
            .checked_mul(channels as u64)
            .and_then(|samples| samples.checked_mul(BYTES_PER_SAMPLE as u64))
            .unwrap_or(u64::MAX);
        // The RIFF size field holds 36 + data_bytes
        if data_bytes > (u32::MAX - 36) as u64 {
            return Err(CropperError::WavTooLarge { data_bytes });
        }

        let block_align = channels as u64 * BYTES_PER_SAMPLE as u64;
        let block_align = u16::try_from(block_align).map_err(|_| CropperError::WavFormat {
            reason: format!("{} channels exceed the block align field", channels),
        })?;
        let byte_rate = u32::try_from(sample_rate as u64 * block_align as u64).map_err(|_| {
            CropperError::WavFormat {
                reason: format!(
                    "{} Hz with {} channels exceeds the byte rate field",
                    sample_rate, channels
                ),
            }
        })?;

        Ok(Self {
            // block_align fits u16, so channels does too
            channels: channels as u16,
            sample_rate,
            block_align,
            byte_rate,
            data_bytes: data_bytes as u32,
        })
    }

    /// Compute the header for a buffer
    pub fn for_buffer(buffer: &PcmBuffer) -> Result<Self> {
        Self::new(buffer.channels(), buffer.len() as u64, buffer.sample_rate())
    }

    /// Total file size including the header
    pub fn file_len(&self) -> usize {
        WAV_HEADER_LEN + self.data_bytes as usize
    }

    /// Append the 44 header bytes to `out`
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + self.data_bytes).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16_u32.to_le_bytes());
        out.extend_from_slice(&1_u16.to_le_bytes());
        out.extend_from_slice(&self.channels.to_le_bytes());
        out.extend_from_slice(&self.sample_rate.to_le_bytes());
        out.extend_from_slice(&self.byte_rate.to_le_bytes());
        out.extend_from_slice(&self.block_align.to_le_bytes());
        out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&self.data_bytes.to_le_bytes());
    }
}

/// Quantize one float sample to 16-bit PCM
///
/// The sample is clamped to `[-1.0, 1.0]`, scaled by 32767 and truncated
/// toward zero, so `1.0 → 32767` and `-1.0 → -32767`. `-32768` is never
/// produced. NaN encodes as silence.
#[inline]
pub fn quantize(sample: f32) -> i16 {
    // `as` truncates toward zero and maps NaN to 0
    (sample.clamp(-1.0, 1.0) * QUANTIZE_SCALE) as i16
}

/// Encode a buffer as a canonical 16-bit PCM WAV file
///
/// Frames are interleaved channel by channel (frame 0 channel 0, frame 0
/// channel 1, ..., frame 1 channel 0, ...).
///
/// # Errors
/// * `WavTooLarge` - If the audio does not fit the 32-bit RIFF size fields
/// * `WavFormat` - If the channel count or rate overflow the header fields
///
/// # Example
/// ```
/// use segment_cropper::engine::{encode, PcmBuffer};
///
/// let buffer = PcmBuffer::silence(2, 100, 44_100).unwrap();
/// let bytes = encode(&buffer).unwrap();
/// assert_eq!(bytes.len(), 44 + 100 * 2 * 2);
/// assert_eq!(&bytes[0..4], b"RIFF");
/// ```
pub fn encode(buffer: &PcmBuffer) -> Result<Vec<u8>> {
    let header = WavHeader::for_buffer(buffer)?;
    let mut out = Vec::with_capacity(header.file_len());
    header.write_to(&mut out);

    let channels: Vec<&[f32]> = buffer.iter_channels().collect();
    for frame in 0..buffer.len() {
        for channel in &channels {
            out.extend_from_slice(&quantize(channel[frame]).to_le_bytes());
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn u16_at(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
    }

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    fn i16_at(bytes: &[u8], offset: usize) -> i16 {
        i16::from_le_bytes([bytes[offset], bytes[offset + 1]])
    }

    #[test_case(1, 0, 8_000 ; "empty mono")]
    #[test_case(1, 441, 44_100 ; "mono")]
    #[test_case(2, 480, 48_000 ; "stereo")]
    #[test_case(6, 17, 96_000 ; "surround")]
    fn test_header_layout(channels: usize, len: usize, rate: u32) {
        let buffer = PcmBuffer::silence(channels, len, rate).unwrap();
        let bytes = encode(&buffer).unwrap();
        let data_bytes = (len * channels * 2) as u32;

        assert_eq!(bytes.len(), 44 + data_bytes as usize);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32_at(&bytes, 4), 36 + data_bytes);
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(u32_at(&bytes, 16), 16);
        assert_eq!(u16_at(&bytes, 20), 1);
        assert_eq!(u16_at(&bytes, 22), channels as u16);
        assert_eq!(u32_at(&bytes, 24), rate);
        assert_eq!(u32_at(&bytes, 28), rate * channels as u32 * 2);
        assert_eq!(u16_at(&bytes, 32), channels as u16 * 2);
        assert_eq!(u16_at(&bytes, 34), 16);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(u32_at(&bytes, 40), data_bytes);
    }

    #[test_case(1.0, 32767 ; "full scale positive")]
    #[test_case(-1.0, -32767 ; "full scale negative")]
    #[test_case(1.5, 32767 ; "clamped positive")]
    #[test_case(-3.0, -32767 ; "clamped negative")]
    #[test_case(0.0, 0 ; "silence")]
    #[test_case(0.5, 16383 ; "half truncates")]
    #[test_case(-0.5, -16383 ; "negative half truncates toward zero")]
    #[test_case(f32::NAN, 0 ; "nan")]
    fn test_quantize(sample: f32, expected: i16) {
        assert_eq!(quantize(sample), expected);
    }

    #[test]
    fn test_frames_are_interleaved() {
        let buffer = PcmBuffer::new(vec![vec![1.0, 0.0], vec![-1.0, 0.5]], 8_000).unwrap();
        let bytes = encode(&buffer).unwrap();

        assert_eq!(i16_at(&bytes, 44), 32767);
        assert_eq!(i16_at(&bytes, 46), -32767);
        assert_eq!(i16_at(&bytes, 48), 0);
        assert_eq!(i16_at(&bytes, 50), 16383);
    }

    #[test]
    fn test_standard_decoder_accepts_output() {
        let buffer = PcmBuffer::new(
            vec![vec![0.25, -0.25, 1.0], vec![0.0, 0.75, -1.0]],
            22_050,
        )
        .unwrap();
        let bytes = encode(&buffer).unwrap();

        let mut reader = hound::WavReader::new(std::io::Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 22_050);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, hound::SampleFormat::Int);

        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![8191, 0, -8191, 24575, 32767, -32767]);
    }

    #[test]
    fn test_extreme_rate_is_rejected_not_overflowed() {
        let buffer = PcmBuffer::silence(2, 4, 3_000_000_000).unwrap();
        let err = encode(&buffer).unwrap_err();
        assert_eq!(err.error_code(), "WAV_FORMAT");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_too_many_channels_is_rejected_not_overflowed() {
        let buffer = PcmBuffer::silence(40_000, 1, 8_000).unwrap();
        let err = encode(&buffer).unwrap_err();
        assert_eq!(err.error_code(), "WAV_FORMAT");
    }

    #[test]
    fn test_largest_representable_format() {
        // 32767 channels × 2 bytes fills block align; rate × 65534 just fits u32
        let header = WavHeader::new(32_767, 0, 65_538).unwrap();
        assert_eq!(header.block_align, 65_534);
        assert_eq!(header.byte_rate, 65_538 * 65_534);
    }

    #[test]
    fn test_oversized_data_is_rejected() {
        let err = WavHeader::new(2, u64::MAX / 2, 44_100).unwrap_err();
        assert_eq!(err.error_code(), "WAV_TOO_LARGE");
        let err = WavHeader::new(1, (u32::MAX as u64) / 2, 44_100).unwrap_err();
        assert_eq!(err.error_code(), "WAV_TOO_LARGE");
    }
}
