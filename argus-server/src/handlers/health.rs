use axum::{Json, extract::State};
use chrono::Utc;
use serde_json::{Value, json};

use crate::infra::app_state::AppState;

pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
        "connections": state.registry.len(),
    }))
}
