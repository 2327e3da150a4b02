use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Published frame with zero-copy semantics
#[derive(Clone, Debug)]
pub struct Frame {
    /// Immutable packed pixel data - can be shared across threads without copying
    pub data: Bytes,

    /// Frame metadata
    pub meta: Arc<FrameMetadata>,

    /// Capture timestamp
    pub timestamp: Instant,
}

/// Frame metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameMetadata {
    /// Monotonic across the whole relay, starts at 1
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: PixelFormat,
}

/// Pixel formats we support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgb24,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb24 => 3,
        }
    }
}

impl Frame {
    /// Wrap packed RGB24 pixels captured at `timestamp`
    pub fn rgb24(sequence: u64, width: u32, height: u32, data: Bytes, timestamp: Instant) -> Self {
        Self {
            data,
            meta: Arc::new(FrameMetadata {
                sequence,
                width,
                height,
                stride: width * PixelFormat::Rgb24.bytes_per_pixel() as u32,
                format: PixelFormat::Rgb24,
            }),
            timestamp,
        }
    }

    pub fn sequence(&self) -> u64 {
        self.meta.sequence
    }

    pub fn width(&self) -> u32 {
        self.meta.width
    }

    pub fn height(&self) -> u32 {
        self.meta.height
    }
}

/// Decoded frame as delivered by the upstream, before scaling
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl RawFrame {
    pub fn rgb24(width: u32, height: u32, data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            format: PixelFormat::Rgb24,
        }
    }

    /// Zero-sized frames are skipped rather than treated as read failures
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.is_empty()
    }

    /// Byte length implied by the dimensions
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}
