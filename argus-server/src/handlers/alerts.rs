use argus_core::{AlertEvent, NewAlert};
use axum::{Json, extract::State, http::StatusCode};

use crate::infra::{app_state::AppState, errors::AppResult};

/// Called by the detection worker. Responds with the alert as it was
/// broadcast, camera summary included.
pub async fn create_alert_handler(
    State(state): State<AppState>,
    Json(new_alert): Json<NewAlert>,
) -> AppResult<(StatusCode, Json<AlertEvent>)> {
    let receipt = state.alert_ingest.ingest(new_alert).await?;
    Ok((StatusCode::CREATED, Json(receipt.event)))
}
