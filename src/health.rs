//! Liveness endpoint for hosting platforms that poll an HTTP port

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

async fn ok() -> &'static str {
    "ok"
}

/// Router answering `GET /` and `GET /healthz` with `200 ok`
pub fn router() -> Router {
    Router::new().route("/", get(ok)).route("/healthz", get(ok))
}

/// Binds `0.0.0.0:port` and serves until `shutdown` fires.
///
/// # Errors
///
/// Returns an error if the port cannot be bound or the server fails.
pub async fn serve(port: u16, shutdown: CancellationToken) -> std::io::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    serve_on(listener, shutdown).await
}

/// Serves on an already bound listener until `shutdown` fires.
///
/// # Errors
///
/// Returns an error if the server fails.
pub async fn serve_on(listener: TcpListener, shutdown: CancellationToken) -> std::io::Result<()> {
    info!(addr = ?listener.local_addr().ok(), "Health endpoint listening");
    axum::serve(listener, router())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
