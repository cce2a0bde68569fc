//! HTTP API over the RAG engine.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Welcome document |
//! | `GET`  | `/health` | Collection status and configured providers |
//! | `GET`  | `/models` | Enabled providers and allow-listed Ollama models |
//! | `POST` | `/search` | Semantic search over the fables |
//! | `POST` | `/generate` | Answer a question from retrieved fables |
//! | `GET`  | `/fables/{id}` | Fetch one fable |
//!
//! Errors are returned as `{"detail": "<message>"}`. Malformed or out-of-range
//! request bodies are rejected with 422 before the engine is touched.

pub mod error;
pub mod handlers;
pub mod models;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use crate::app::AppContext;

pub use error::ApiError;

/// Build the router with all routes and the CORS layer
pub fn router(ctx: Arc<AppContext>) -> Router {
    let cors = cors_layer(&ctx.config().cors_origins);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/models", get(handlers::models))
        .route("/search", post(handlers::search))
        .route("/generate", post(handlers::generate))
        .route("/fables/{id}", get(handlers::get_fable))
        .layer(cors)
        .with_state(ctx)
}

/// CORS for the configured origins with credentials allowed.
///
/// A `*` entry opens the API to any origin; browsers refuse credentials on a
/// wildcard, so that mode drops them.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Bind `addr` and serve until the process is stopped
pub async fn serve(ctx: Arc<AppContext>, addr: &str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "fable API listening");
    axum::serve(listener, router(ctx)).await?;
    Ok(())
}
