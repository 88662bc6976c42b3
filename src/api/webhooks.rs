//! Gateway callback endpoint.

use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{error, info};

use crate::services::callback_processor::{CallbackDisposition, CallbackProcessor};

pub struct WebhookState {
    pub processor: Arc<CallbackProcessor>,
}

/// POST /webhooks/momo
///
/// Always answers 200 so the gateway does not retry-storm; outcomes go to the logs.
pub async fn handle_momo_callback(
    State(state): State<Arc<WebhookState>>,
    body: Bytes,
) -> impl IntoResponse {
    info!(provider = "momo", "Received payment callback");

    let payload: JsonValue = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            error!(provider = "momo", error = %e, "Invalid JSON payload");
            return ack();
        }
    };

    let disposition = state.processor.handle(payload).await;
    if matches!(disposition, CallbackDisposition::StorageFailure) {
        error!(provider = "momo", "Callback acknowledged without being applied");
    }

    ack()
}

fn ack() -> (StatusCode, Json<JsonValue>) {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}
