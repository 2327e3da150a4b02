pub mod capture_loop;
pub mod frame;
#[cfg(feature = "gstreamer-pipeline")]
pub mod gst_capture;
pub mod scale;
pub mod session;

pub use capture_loop::{CaptureHandle, CaptureLoop, CaptureState, CaptureStatsSnapshot, Step};
pub use frame::{Frame, FrameMetadata, PixelFormat, RawFrame};
#[cfg(feature = "gstreamer-pipeline")]
pub use gst_capture::GstConnector;
pub use session::{CaptureSession, Connector, FrameSource};
