use axum::{Json, extract::State};

use crate::activation::{self, ReconciliationReport};
use crate::db::AppState;
use crate::error::Result;

/// Paid payments with no session and sessions the router never accepted.
pub async fn reconciliation(State(state): State<AppState>) -> Result<Json<ReconciliationReport>> {
    Ok(Json(activation::reconciliation_report(&state)?))
}
