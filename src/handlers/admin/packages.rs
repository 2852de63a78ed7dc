use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::{CreatePackage, Package};

pub async fn list_all_packages(State(state): State<AppState>) -> Result<Json<Vec<Package>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_all_packages(&conn)?))
}

pub async fn create_package(
    State(state): State<AppState>,
    Json(input): Json<CreatePackage>,
) -> Result<(StatusCode, Json<Package>)> {
    let conn = state.db.get()?;
    let package = queries::create_package(&conn, &input)?;
    tracing::info!("Created package {} ({})", package.id, package.name);
    Ok((StatusCode::CREATED, Json(package)))
}

/// Soft delete: payments and vouchers keep pointing at the row.
pub async fn deactivate_package(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    let conn = state.db.get()?;
    if !queries::deactivate_package(&conn, id)? {
        return Err(AppError::NotFound("Package not found".into()));
    }
    Ok(StatusCode::NO_CONTENT)
}
