use axum::{Json, extract::State, http::HeaderMap};
use serde::Deserialize;

use crate::activation::{self, Credentials};
use crate::db::AppState;
use crate::error::Result;
use crate::util::extract_client_ip;

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
}

pub async fn redeem(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<RedeemRequest>,
) -> Result<Json<Credentials>> {
    // The router's login page passes the client IP; fall back to the proxy header
    let ip_address = input.ip_address.or_else(|| extract_client_ip(&headers));

    let credentials = activation::redeem_voucher(
        &state,
        &input.code,
        input.mac_address.as_deref(),
        ip_address.as_deref(),
    )
    .await?;
    Ok(Json(credentials))
}
