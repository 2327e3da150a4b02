//! Resizing of decoded upstream frames to the relay's target resolution

use bytes::Bytes;
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgb};

use crate::capture::frame::RawFrame;
use crate::error::{RelayError, Result};

/// Resizes raw RGB24 frames to a fixed output size
#[derive(Debug, Clone, Copy)]
pub struct Scaler {
    width: u32,
    height: u32,
    filter: FilterType,
}

impl Scaler {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            filter: FilterType::Triangle,
        }
    }

    pub fn target(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Scale `raw` to the target size, returning packed RGB24 bytes.
    /// Frames already at the target size are passed through without copying.
    pub fn scale(&self, raw: &RawFrame) -> Result<Bytes> {
        if raw.data.len() != raw.expected_len() {
            return Err(RelayError::MalformedFrame(format!(
                "{}x{} frame carries {} bytes, expected {}",
                raw.width,
                raw.height,
                raw.data.len(),
                raw.expected_len()
            )));
        }

        if (raw.width, raw.height) == (self.width, self.height) {
            return Ok(raw.data.clone());
        }

        let source: ImageBuffer<Rgb<u8>, &[u8]> =
            ImageBuffer::from_raw(raw.width, raw.height, &raw.data[..]).ok_or_else(|| {
                RelayError::MalformedFrame("pixel buffer too small for dimensions".into())
            })?;

        let resized = imageops::resize(&source, self.width, self.height, self.filter);
        Ok(Bytes::from(resized.into_raw()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_frames_at_target_size() {
        let raw = RawFrame::rgb24(4, 2, vec![7u8; 4 * 2 * 3]);
        let scaled = Scaler::new(4, 2).scale(&raw).unwrap();
        assert_eq!(scaled, raw.data);
    }

    #[test]
    fn resizes_to_target_dimensions() {
        let raw = RawFrame::rgb24(8, 6, vec![200u8; 8 * 6 * 3]);
        let scaled = Scaler::new(4, 3).scale(&raw).unwrap();
        assert_eq!(scaled.len(), 4 * 3 * 3);
        // Uniform input stays uniform
        assert!(scaled.iter().all(|&b| b == 200));
    }

    #[test]
    fn rejects_length_mismatch() {
        let raw = RawFrame::rgb24(8, 6, vec![0u8; 10]);
        let err = Scaler::new(4, 3).scale(&raw).unwrap_err();
        assert!(matches!(err, RelayError::MalformedFrame(_)));
    }
}
