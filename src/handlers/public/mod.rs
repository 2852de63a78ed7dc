mod packages;
mod payments;
mod vouchers;

pub use packages::*;
pub use payments::*;
pub use vouchers::*;

use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::Serialize;

use crate::db::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/packages", get(list_packages))
        .route("/payments/initiate", post(initiate))
        .route("/payments/status", get(payment_status))
        .route("/vouchers/redeem", post(redeem))
}
