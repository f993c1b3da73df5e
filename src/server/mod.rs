//! HTTP API
//!
//! JSON endpoints over the image, billing and composition services. Every
//! response uses the `{success, message?, data?}` envelope; the
//! authenticated user arrives in the `x-user-id` header.

pub mod response;
pub mod routes;
pub mod state;

pub use response::{ApiError, ApiResponse, UserId, USER_ID_HEADER};
pub use state::AppState;

use crate::error::Result;
use crate::tracing_config::spans;
use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::Instrument;

/// All API routes over `state`
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/compose", post(routes::compose))
        .route("/api/remove-background", post(routes::remove_background))
        .route("/api/paypal/createorder", post(routes::create_order))
        .route("/api/paypal/captureorder", post(routes::capture_order))
        .route("/api/images", get(routes::list_images).post(routes::create_image))
        .route(
            "/api/images/:id",
            get(routes::get_image)
                .put(routes::update_image)
                .delete(routes::delete_image),
        )
        .route("/api/users", post(routes::register_user))
        .route("/api/users/:id", get(routes::get_user))
        .route("/api/users/:id/images", get(routes::user_images))
        .route("/api/plans", get(routes::plans))
        .route("/api/transformations", get(routes::transformations))
        .layer(middleware::from_fn(trace_requests))
        .with_state(state)
}

async fn trace_requests(request: Request, next: Next) -> Response {
    let span = spans::request(request.method().as_str(), request.uri().path());
    async move {
        let started = Instant::now();
        let response = next.run(request).await;
        tracing::info!(
            status = response.status().as_u16(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Request finished"
        );
        response
    }
    .instrument(span)
    .await
}

/// Bind `addr` and serve until Ctrl-C
///
/// # Errors
/// - Address cannot be bound
/// - Server I/O failure
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(address = %listener.local_addr()?, "🌐 Listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
