//! Source decoding
//!
//! Turning an uploaded file into linear PCM is an external capability. The
//! [`Decoder`] trait is the seam the export pipeline calls through;
//! [`WavDecoder`] is the built-in implementation for WAV sources.

use std::io::Cursor;

use hound::{SampleFormat, WavReader};

use crate::engine::buffer::PcmBuffer;
use crate::error::{CropperError, Result};

/// Decodes raw source bytes into a [`PcmBuffer`]
///
/// Implementations must be shareable across export worker threads.
pub trait Decoder: Send + Sync {
    /// Decode a complete source file
    ///
    /// # Errors
    /// * `Decode` - If the bytes are malformed or in an unsupported format
    fn decode(&self, bytes: &[u8]) -> Result<PcmBuffer>;
}

impl<D: Decoder + ?Sized> Decoder for &D {
    fn decode(&self, bytes: &[u8]) -> Result<PcmBuffer> {
        (**self).decode(bytes)
    }
}

impl<D: Decoder + ?Sized> Decoder for Box<D> {
    fn decode(&self, bytes: &[u8]) -> Result<PcmBuffer> {
        (**self).decode(bytes)
    }
}

/// Decoder for RIFF/WAVE sources backed by `hound`
///
/// Accepts 8/16/24/32-bit integer and 32-bit float PCM with any channel
/// count, at the file's native sample rate.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavDecoder;

impl Decoder for WavDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<PcmBuffer> {
        let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| CropperError::Decode {
            reason: format!("Failed to open WAV data: {}", e),
            source: Some(Box::new(e)),
        })?;

        let spec = reader.spec();
        let channels = spec.channels as usize;
        let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;

        PcmBuffer::from_interleaved(&interleaved, channels, spec.sample_rate)
    }
}

/// Read samples from a WAV reader and normalize them to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    fn invalid(bits: &str, e: hound::Error) -> CropperError {
        CropperError::Decode {
            reason: format!("Failed to read {} samples: {}", bits, e),
            source: Some(Box::new(e)),
        }
    }

    match sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| invalid("float", e)),
        SampleFormat::Int => match bits_per_sample {
            8 => reader
                .samples::<i8>()
                .map(|s| s.map(|v| v as f32 / 128.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| invalid("8-bit", e)),
            16 => reader
                .samples::<i16>()
                .map(|s| s.map(|v| v as f32 / 32768.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| invalid("16-bit", e)),
            // 24-bit samples are stored as i32 in hound
            24 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 8_388_608.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| invalid("24-bit", e)),
            32 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 2_147_483_648.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| invalid("32-bit int", e)),
            other => Err(CropperError::decode(format!(
                "{}-bit integer audio is not supported",
                other
            ))),
        },
    }
}
