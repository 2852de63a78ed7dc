use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;

use crate::activation;
use crate::db::{AppState, queries};
use crate::error::Result;
use crate::models::Session;

pub async fn list_sessions(State(state): State<AppState>) -> Result<Json<Vec<Session>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_active_sessions(&conn)?))
}

pub async fn disconnect_session(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Session>> {
    Ok(Json(activation::disconnect_session(&state, id).await?))
}

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub expired: usize,
}

pub async fn sweep_sessions(State(state): State<AppState>) -> Result<Json<SweepResponse>> {
    let expired = activation::sweep_expired_sessions(&state).await?;
    Ok(Json(SweepResponse { expired }))
}
