//! camrelay: RTSP camera to MJPEG-over-HTTP relay

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use camrelay::capture::GstConnector;
use camrelay::{server, Config, Relay};
use color_eyre::Result;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("camrelay=info")),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("camrelay launching...");

    // Load configuration
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;

    // Connect and start capturing before accepting any client
    let connector = GstConnector::new(&config.capture)?;
    let relay = Arc::new(Relay::start(&config, connector)?);

    let listener = TcpListener::bind(&config.server.bind).await?;
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(server::serve(listener, Arc::clone(&relay), async {
        stop_rx.await.ok();
    }));

    tokio::select! {
        result = &mut server => {
            result??;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Server shutting down...");
            let _ = stop_tx.send(());
            // Streaming clients never finish on their own
            if tokio::time::timeout(Duration::from_secs(5), server).await.is_err() {
                warn!("Closing with clients still connected");
            }
        }
    }

    relay.close().await;
    info!("camrelay stopped");
    Ok(())
}
