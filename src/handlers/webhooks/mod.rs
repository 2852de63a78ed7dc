use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};

use crate::activation;
use crate::db::AppState;
use crate::error::AppError;

/// Provider callback for whichever gateway is configured.
///
/// Anything we handled, including "not ours" and "already done", is a 200
/// so the provider does not retry-storm us.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    match activation::handle_webhook(&state, &headers, &body).await {
        Ok(outcome) => (StatusCode::OK, outcome.message()),
        Err(AppError::Unauthorized(_)) => (StatusCode::UNAUTHORIZED, "Invalid signature"),
        Err(AppError::BadRequest(e)) => {
            tracing::error!("Failed to parse {} webhook: {}", state.gateway.name(), e);
            (StatusCode::BAD_REQUEST, "Invalid payload")
        }
        Err(e) => {
            tracing::error!("Webhook processing failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Processing error")
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/webhook", post(handle_webhook))
}
