//! Still-image encoders for outgoing frames

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;
use image::ExtendedColorType;

use crate::capture::{Frame, PixelFormat};
use crate::error::{RelayError, Result};

/// Turns a frame into compressed image bytes
pub trait FrameEncoder: Send + Sync {
    fn encode(&self, frame: &Frame) -> Result<Bytes>;
}

/// Baseline JPEG encoder
#[derive(Debug, Clone, Copy)]
pub struct JpegEncoder {
    quality: u8,
}

impl JpegEncoder {
    /// Quality is clamped to 1-100
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl FrameEncoder for JpegEncoder {
    fn encode(&self, frame: &Frame) -> Result<Bytes> {
        let color = match frame.meta.format {
            PixelFormat::Rgb24 => ExtendedColorType::Rgb8,
        };

        let expected = frame.width() as usize
            * frame.height() as usize
            * frame.meta.format.bytes_per_pixel();
        if frame.data.len() != expected {
            return Err(RelayError::Encode(format!(
                "{}x{} frame carries {} bytes, expected {}",
                frame.width(),
                frame.height(),
                frame.data.len(),
                expected
            )));
        }

        // JPEG output is usually well under a byte per pixel
        let mut out = Vec::with_capacity(frame.data.len() / 8);
        ImageJpegEncoder::new_with_quality(&mut out, self.quality).encode(
            &frame.data,
            frame.width(),
            frame.height(),
            color,
        )?;

        if out.is_empty() {
            return Err(RelayError::Encode("encoder produced no data".into()));
        }
        Ok(Bytes::from(out))
    }
}
