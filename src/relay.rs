//! Relay façade: one capture loop feeding any number of MJPEG clients

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{error, info};

use crate::capture::capture_loop::CaptureStats;
use crate::capture::{CaptureHandle, CaptureLoop, CaptureStatsSnapshot, Connector};
use crate::error::Result;
use crate::pipeline::{FrameCell, FrameCellStats};
use crate::stream::{FrameEncoder, JpegEncoder, MjpegStream};
use crate::utils::{redact_url, MonotonicClock};
use crate::Config;

/// Liveness report for `/health`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Health {
    pub status: &'static str,
    /// UNIX seconds, never decreasing
    pub timestamp: f64,
}

/// Counters for `/stats`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RelayStats {
    pub capture: CaptureStatsSnapshot,
    pub cell: FrameCellStats,
    pub clients_connected: usize,
}

pub struct Relay {
    cell: Arc<FrameCell>,
    encoder: Arc<dyn FrameEncoder>,
    capture: Mutex<Option<CaptureHandle>>,
    capture_stats: Arc<CaptureStats>,
    clients: Arc<AtomicUsize>,
    clock: MonotonicClock,
}

impl Relay {
    /// Connect to the upstream and start capturing, encoding with JPEG at
    /// the configured quality.
    pub fn start<C>(config: &Config, connector: C) -> Result<Self>
    where
        C: Connector + 'static,
    {
        let encoder = Arc::new(JpegEncoder::new(config.stream.jpeg_quality));
        Self::with_encoder(config, connector, encoder)
    }

    /// Like [`start`](Self::start) with a custom encoder
    pub fn with_encoder<C>(
        config: &Config,
        connector: C,
        encoder: Arc<dyn FrameEncoder>,
    ) -> Result<Self>
    where
        C: Connector + 'static,
    {
        config.validate()?;
        info!(
            "Starting relay for {} at {}x{}@{}fps",
            redact_url(&config.source.url),
            config.capture.width,
            config.capture.height,
            config.capture.fps
        );

        let cell = Arc::new(FrameCell::new());
        let capture = CaptureLoop::connect(
            connector,
            config.source.clone(),
            config.capture.clone(),
            Arc::clone(&cell),
        )?
        .spawn()?;

        Ok(Self {
            cell,
            encoder,
            capture_stats: capture.shared_stats(),
            capture: Mutex::new(Some(capture)),
            clients: Arc::new(AtomicUsize::new(0)),
            clock: MonotonicClock::new(),
        })
    }

    /// A fresh stream for one client, starting at the current frame
    pub fn subscribe(&self) -> MjpegStream {
        MjpegStream::tracked(
            Arc::clone(&self.cell),
            Arc::clone(&self.encoder),
            Arc::clone(&self.clients),
        )
    }

    pub fn frame_cell(&self) -> &Arc<FrameCell> {
        &self.cell
    }

    pub fn health(&self) -> Health {
        Health {
            status: "healthy",
            timestamp: self.clock.now(),
        }
    }

    pub fn stats(&self) -> RelayStats {
        RelayStats {
            capture: self.capture_stats.snapshot(),
            cell: self.cell.stats(),
            clients_connected: self.clients.load(Ordering::Relaxed),
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.capture
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(CaptureHandle::is_running)
    }

    /// Stop capturing and release the upstream. Clients keep their last frame.
    pub fn shutdown(&self) {
        let handle = self
            .capture
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            info!("Stopping relay");
            handle.stop();
        }
    }

    /// [`shutdown`](Self::shutdown) from async code. Joining the capture
    /// thread can block for a full read timeout, so it runs on the blocking
    /// pool.
    pub async fn close(self: Arc<Self>) {
        if let Err(e) = tokio::task::spawn_blocking(move || self.shutdown()).await {
            error!("Relay shutdown task failed: {}", e);
        }
    }
}
