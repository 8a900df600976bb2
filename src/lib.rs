//! HTTPS file drop: upload a file, list what has been uploaded, fetch it back.

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod naming;
pub mod server;
pub mod storage;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use storage::FileIndex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub index: Arc<dyn FileIndex>,
    /// Scheme used when building listing URLs.
    pub scheme: &'static str,
    /// Port advertised in listing URLs.
    pub public_port: u16,
}

impl AppState {
    pub fn new(index: Arc<dyn FileIndex>, public_port: u16) -> Self {
        Self {
            index,
            scheme: "https",
            public_port,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/upload", post(handlers::upload_file))
        .route("/files", get(handlers::list_files))
        .route("/files/*path", get(handlers::serve_file))
        .fallback(handlers::unmatched)
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
