use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::{PaymentStatus, PaymentWithPackage};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct PaymentsQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

pub async fn list_payments(
    State(state): State<AppState>,
    Query(query): Query<PaymentsQuery>,
) -> Result<Json<Vec<PaymentWithPackage>>> {
    let status = match query.status.as_deref().filter(|s| !s.is_empty() && *s != "all") {
        Some(s) => Some(
            s.parse::<PaymentStatus>()
                .map_err(|_| AppError::BadRequest(format!("Unknown payment status '{}'", s)))?,
        ),
        None => None,
    };
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let conn = state.db.get()?;
    Ok(Json(queries::list_payments(&conn, status, limit)?))
}
