//! Upstream connection seams used by the capture loop

use std::time::{Duration, Instant};

use crate::capture::frame::RawFrame;
use crate::error::Result;
use crate::SourceConfig;

/// A live, decoded video feed. Dropping it releases the native handle.
pub trait FrameSource: Send {
    /// Pull the next decoded frame, blocking until one arrives or the
    /// source gives up.
    fn read_frame(&mut self) -> Result<RawFrame>;
}

/// Opens upstream sessions, trying its primary configuration before any
/// fallback. Errors are [`RelayError::SessionOpen`](crate::RelayError::SessionOpen).
pub trait Connector: Send {
    type Source: FrameSource;

    fn open(&mut self, config: &SourceConfig) -> Result<Self::Source>;
}

/// One connection to the upstream plus the bookkeeping the capture loop
/// keeps per connection.
pub struct CaptureSession<S> {
    source: S,
    consecutive_failures: u32,
    last_accepted: Option<Instant>,
}

impl<S: FrameSource> CaptureSession<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            consecutive_failures: 0,
            last_accepted: None,
        }
    }

    pub fn read_frame(&mut self) -> Result<RawFrame> {
        self.source.read_frame()
    }

    /// Count a failed pull and return the running total
    pub fn record_failure(&mut self) -> u32 {
        self.consecutive_failures += 1;
        self.consecutive_failures
    }

    /// Any successful pull clears the failure streak
    pub fn record_success(&mut self, at: Instant) {
        self.consecutive_failures = 0;
        self.last_accepted = Some(at);
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// How long to wait before the next pull to respect `interval`
    pub fn pacing_delay(&self, interval: Duration, now: Instant) -> Option<Duration> {
        let last = self.last_accepted?;
        interval
            .checked_sub(now.saturating_duration_since(last))
            .filter(|remaining| !remaining.is_zero())
    }
}
