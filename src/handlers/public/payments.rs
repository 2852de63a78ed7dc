use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

use crate::activation::{self, InitiatePayment, InitiatedPayment, PollOutcome};
use crate::db::AppState;
use crate::error::{AppError, Result};

pub async fn initiate(
    State(state): State<AppState>,
    Json(input): Json<InitiatePayment>,
) -> Result<Json<InitiatedPayment>> {
    Ok(Json(activation::initiate_payment(&state, input).await?))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub tx_ref: String,
}

/// Polled by the portal page until the payment settles.
pub async fn payment_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<PollOutcome>> {
    let tx_ref = query.tx_ref.trim();
    if tx_ref.is_empty() {
        return Err(AppError::BadRequest("tx_ref is required".into()));
    }
    Ok(Json(activation::poll_status(&state, tx_ref).await?))
}
