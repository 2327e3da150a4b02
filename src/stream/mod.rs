pub mod encoder;
pub mod mjpeg;
pub mod multipart;

pub use encoder::{FrameEncoder, JpegEncoder};
pub use mjpeg::MjpegStream;
