//! Per-client MJPEG stream over the shared frame cell

use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::Stream;
use tracing::{error, warn};

use crate::pipeline::FrameCell;
use crate::stream::encoder::FrameEncoder;
use crate::stream::multipart;

/// Pause before re-encoding a frame whose last encode failed
const ENCODE_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Lazily encodes the latest frame for one HTTP client.
///
/// Each call to [`next_chunk`](Self::next_chunk) waits for a frame newer than
/// the previous one, encodes it and wraps it as a multipart part. A failed
/// encode is retried on the latest frame; the stream itself never ends.
pub struct MjpegStream {
    cell: Arc<FrameCell>,
    encoder: Arc<dyn FrameEncoder>,
    last_sequence: Option<u64>,
    _client: Option<ClientGuard>,
}

impl MjpegStream {
    pub fn new(cell: Arc<FrameCell>, encoder: Arc<dyn FrameEncoder>) -> Self {
        Self {
            cell,
            encoder,
            last_sequence: None,
            _client: None,
        }
    }

    /// Same as [`new`](Self::new), counted in `clients` while alive
    pub fn tracked(
        cell: Arc<FrameCell>,
        encoder: Arc<dyn FrameEncoder>,
        clients: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            _client: Some(ClientGuard::new(clients)),
            ..Self::new(cell, encoder)
        }
    }

    /// Sequence of the last frame turned into a chunk
    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    pub async fn next_chunk(&mut self) -> Bytes {
        loop {
            let frame = self.cell.next_after(self.last_sequence).await;
            let sequence = frame.sequence();

            let encoder = Arc::clone(&self.encoder);
            let started = Instant::now();
            match tokio::task::spawn_blocking(move || encoder.encode(&frame)).await {
                Ok(Ok(jpeg)) => {
                    metrics::histogram!("stream_encode_time_us")
                        .record(started.elapsed().as_micros() as f64);
                    self.last_sequence = Some(sequence);
                    return multipart::part(&jpeg);
                }
                Ok(Err(e)) => {
                    metrics::counter!("stream_encode_failures").increment(1);
                    warn!("Error encoding frame {}: {}", sequence, e);
                }
                Err(e) => {
                    metrics::counter!("stream_encode_failures").increment(1);
                    error!("Encoder task for frame {} failed: {}", sequence, e);
                }
            }
            tokio::time::sleep(ENCODE_RETRY_DELAY).await;
        }
    }

    /// Infinite body stream for an HTTP response
    pub fn into_body_stream(self) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
        futures::stream::unfold(self, |mut stream| async move {
            let chunk = stream.next_chunk().await;
            Some((Ok(chunk), stream))
        })
    }
}

/// Keeps a live-client count accurate across disconnects
struct ClientGuard(Arc<AtomicUsize>);

impl ClientGuard {
    fn new(clients: Arc<AtomicUsize>) -> Self {
        clients.fetch_add(1, Ordering::Relaxed);
        Self(clients)
    }
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}
