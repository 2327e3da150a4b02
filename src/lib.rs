pub mod capture;
pub mod error;
pub mod pipeline;
pub mod relay;
pub mod server;
pub mod stream;
pub mod utils;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use capture::{Frame, PixelFormat};
pub use error::{RelayError, Result};
pub use pipeline::FrameCell;
pub use relay::Relay;

/// Environment variable prefix, e.g. `CAMRELAY__SOURCE__URL`
pub const ENV_PREFIX: &str = "CAMRELAY";

/// Relay configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub capture: CaptureConfig,
    pub stream: StreamConfig,
    pub server: ServerConfig,
}

/// Upstream connection settings, read when a session is opened
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub url: String,
    /// Advisory; picks the depayloader of the primary pipeline
    pub codec: VideoCodec,
    /// Receive buffer depth in frames
    pub buffer_size: u32,
    pub latency_ms: u32,
    /// A pull that waits longer than this counts as a failed read
    pub read_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    H264,
    H265,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Consecutive failed reads tolerated before reconnecting
    pub failure_threshold: u32,
    pub reconnect_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// JPEG quality, 1-100
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "rtsp://127.0.0.1:554/stream".into(),
            codec: VideoCodec::H264,
            buffer_size: 4,
            latency_ms: 0,
            read_timeout_ms: 5000,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 30,
            failure_threshold: 5,
            reconnect_delay_ms: 2000,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { jpeg_quality: 85 }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5001".into(),
        }
    }
}

impl SourceConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl CaptureConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.fps.max(1)))
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl Config {
    /// Layer defaults, an optional TOML file and `CAMRELAY__*` environment
    /// variables, then validate the result.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config: Config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.url.trim().is_empty() {
            return Err(RelayError::Config("source.url must not be empty".into()));
        }
        // JPEG headers carry 16-bit dimensions
        let max = u32::from(u16::MAX);
        if self.capture.width == 0
            || self.capture.height == 0
            || self.capture.width > max
            || self.capture.height > max
        {
            return Err(RelayError::Config(format!(
                "capture resolution {}x{} is invalid",
                self.capture.width, self.capture.height
            )));
        }
        if self.capture.fps == 0 {
            return Err(RelayError::Config("capture.fps must be positive".into()));
        }
        if self.capture.failure_threshold == 0 {
            return Err(RelayError::Config(
                "capture.failure_threshold must be positive".into(),
            ));
        }
        if !(1..=100).contains(&self.stream.jpeg_quality) {
            return Err(RelayError::Config(format!(
                "stream.jpeg_quality {} is outside 1-100",
                self.stream.jpeg_quality
            )));
        }
        Ok(())
    }
}
