// API Module
//
// Read-only HTTP surface: the last persisted checkpoint of each index, the scheduler
// status and Prometheus metrics. Nothing here touches in-progress scan state.

pub mod handlers;

pub use handlers::*;

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::checkpoint::CheckpointStore;
use crate::engine::CheckpointKeys;
use crate::monitor::SharedStatus;

/// Shared by every handler.
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn CheckpointStore>,
    pub keys: CheckpointKeys,
    pub status: SharedStatus,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/twist_id", get(twist_id))
        .route("/twist_data", get(twist_data))
        .route("/status", get(status))
        .route("/metrics", get(metrics))
        .layer(Extension(state))
        .layer(CorsLayer::permissive())
}

pub async fn serve(bind_addr: &str, state: Arc<ApiState>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "HTTP API listening");
    axum::serve(listener, router(state)).await
}
