//! Audio Engine Module
//!
//! The sample-domain half of the pipeline:
//! - PCM buffer type
//! - Source decoding seam
//! - Sample cropping
//! - WAV encoding

pub mod buffer;
pub mod crop;
pub mod decode;
pub mod format;
pub mod wav;

pub use buffer::PcmBuffer;
pub use crop::{crop, seconds_to_sample};
pub use decode::{Decoder, WavDecoder};
pub use format::{format_duration, format_file_size};
pub use wav::{encode, quantize, WavHeader, WAV_HEADER_LEN};
