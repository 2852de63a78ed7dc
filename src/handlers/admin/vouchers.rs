use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::activation;
use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::{Voucher, VoucherWithPackage};

const LIST_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct IssueVouchers {
    pub package_id: i64,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

pub async fn list_vouchers(State(state): State<AppState>) -> Result<Json<Vec<VoucherWithPackage>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_vouchers(&conn, LIST_LIMIT)?))
}

pub async fn issue_vouchers(
    State(state): State<AppState>,
    Json(input): Json<IssueVouchers>,
) -> Result<(StatusCode, Json<Vec<Voucher>>)> {
    let (_, vouchers) = activation::issue_voucher_batch(&state, input.package_id, input.quantity)?;
    Ok((StatusCode::CREATED, Json(vouchers)))
}

pub async fn delete_voucher(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    let conn = state.db.get()?;
    if !queries::delete_unused_voucher(&conn, id)? {
        return Err(AppError::NotFound("Voucher not found or already used".into()));
    }
    Ok(StatusCode::NO_CONTENT)
}
