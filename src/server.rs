//! HTTP surface: MJPEG feed, health and stats

use std::future::Future;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::error::Result;
use crate::relay::{Health, Relay, RelayStats};
use crate::stream::multipart;

/// Build the router for a running relay
pub fn router(relay: Arc<Relay>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_methods([Method::GET, Method::OPTIONS]);

    Router::new()
        .route("/video_feed", get(video_feed))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .with_state(relay)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

/// Serve `router` on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, relay: Arc<Relay>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("HTTP server listening on {}", listener.local_addr()?);
    axum::serve(listener, router(relay))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn video_feed(State(relay): State<Arc<Relay>>) -> Response {
    debug!("New video feed client");
    let body = Body::from_stream(relay.subscribe().into_body_stream());

    (
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static(multipart::CONTENT_TYPE),
        )],
        body,
    )
        .into_response()
}

async fn health(State(relay): State<Arc<Relay>>) -> Json<Health> {
    Json(relay.health())
}

async fn stats(State(relay): State<Arc<Relay>>) -> Json<RelayStats> {
    Json(relay.stats())
}
