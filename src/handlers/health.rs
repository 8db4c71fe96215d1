use axum::{extract::State, Json};

use crate::AppState;

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "database": state.db.ping().await,
        "storage": state.store.storage_type(),
    }))
}
