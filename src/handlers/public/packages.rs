use axum::{Json, extract::State};

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::models::Package;

/// Active packages, cheapest first.
pub async fn list_packages(State(state): State<AppState>) -> Result<Json<Vec<Package>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_active_packages(&conn)?))
}
