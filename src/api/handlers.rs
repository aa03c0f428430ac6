// API Handlers
//
// Index documents are returned verbatim; an unreadable checkpoint yields `{}`.

use std::sync::Arc;

use axum::{http::StatusCode, Extension, Json};
use serde_json::{json, Value};
use tracing::warn;

use super::ApiState;
use crate::metrics::gather_metrics;
use crate::monitor::SchedulerStatus;

async fn load_or_empty(state: &ApiState, key: &str) -> Value {
    match state.store.load(key).await {
        Ok(Some(doc)) => doc,
        Ok(None) => json!({}),
        Err(e) => {
            warn!(key = key, error = %e, "Cannot read checkpoint for API");
            json!({})
        }
    }
}

/// GET /twist_id
pub async fn twist_id(Extension(state): Extension<Arc<ApiState>>) -> Json<Value> {
    Json(load_or_empty(&state, &state.keys.identity).await)
}

/// GET /twist_data
pub async fn twist_data(Extension(state): Extension<Arc<ApiState>>) -> Json<Value> {
    Json(load_or_empty(&state, &state.keys.data).await)
}

/// GET /status
pub async fn status(Extension(state): Extension<Arc<ApiState>>) -> Json<SchedulerStatus> {
    Json(state.status.read().await.clone())
}

/// GET /metrics
pub async fn metrics() -> Result<String, (StatusCode, String)> {
    gather_metrics().map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
    use crate::engine::CheckpointKeys;
    use tokio::sync::RwLock;

    fn state(store: Arc<dyn CheckpointStore>) -> Arc<ApiState> {
        Arc::new(ApiState {
            store,
            keys: CheckpointKeys {
                identity: "twist_id.json".to_string(),
                data: "twist_data.json".to_string(),
            },
            status: Arc::new(RwLock::new(SchedulerStatus::default())),
        })
    }

    #[tokio::test]
    async fn test_documents_verbatim_or_empty() {
        let store = Arc::new(MemoryCheckpointStore::new());
        store
            .save("twist_id.json", &json!({"block": 10, "validTwistIds": []}))
            .await
            .unwrap();
        let state = state(store);

        let Json(id_doc) = twist_id(Extension(state.clone())).await;
        assert_eq!(id_doc, json!({"block": 10, "validTwistIds": []}));

        let Json(data_doc) = twist_data(Extension(state)).await;
        assert_eq!(data_doc, json!({}));
    }

    #[tokio::test]
    async fn test_unreadable_document_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("twist_data.json"), b"garbage").unwrap();
        let state = state(Arc::new(FileCheckpointStore::new(dir.path())));

        let Json(doc) = twist_data(Extension(state)).await;
        assert_eq!(doc, json!({}));
    }

    #[tokio::test]
    async fn test_status_shape() {
        let state = state(Arc::new(MemoryCheckpointStore::new()));
        {
            let mut status = state.status.write().await;
            status.last_observed_height = Some(77);
            status.caught_up = true;
            status.passes_completed = 3;
        }

        let Json(body) = status(Extension(state)).await;
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            json!({"lastObservedHeight": 77, "caughtUp": true, "passesCompleted": 3})
        );
    }

    #[tokio::test]
    async fn test_metrics_text() {
        crate::metrics::init_metrics().unwrap();
        crate::metrics::set_chain_tip_height(5);
        let body = metrics().await.unwrap();
        assert!(body.contains("twistindex_chain_tip_height"));
    }
}
