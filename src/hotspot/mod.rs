//! Router-side hotspot account management.
//!
//! Every call here is best-effort. By the time the pipeline reaches the
//! router the payment or voucher is already committed, so callers log a
//! `RouterError` and carry on instead of failing the request.

mod demo;
mod mikrotik;

pub use demo::DemoRouter;
pub use mikrotik::MikrotikClient;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Config;
use crate::error::{AppError, Result};

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("router request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("router returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Account to create on the hotspot controller.
#[derive(Debug, Clone)]
pub struct HotspotUser {
    pub username: String,
    pub password: String,
    /// Bind the account to this device when known
    pub mac_address: Option<String>,
    /// RouterOS duration string (`1d`, `3d`, `12h`)
    pub uptime_limit: String,
}

#[async_trait]
pub trait AccessProvisioner: Send + Sync {
    fn name(&self) -> &'static str;

    /// Create or update the account. Re-provisioning an existing username
    /// overwrites its password and limit.
    async fn create_user(&self, user: &HotspotUser) -> std::result::Result<(), RouterError>;

    /// Remove the account; a missing user is not an error.
    async fn remove_user(&self, username: &str) -> std::result::Result<(), RouterError>;

    /// Kick the device off: drop its IP bindings and active hotspot entries.
    async fn disconnect(&self, mac_address: &str) -> std::result::Result<(), RouterError>;
}

/// RouterOS `limit-uptime` for a package duration.
///
/// Whole days are written as days (`168` -> `7d`), a remainder is appended
/// in hours (`36` -> `1d12h`), and anything under a day stays in hours.
pub fn uptime_limit(duration_hours: i64) -> String {
    let hours = duration_hours.max(0);
    let (days, rest) = (hours / 24, hours % 24);
    match (days, rest) {
        (0, h) => format!("{}h", h),
        (d, 0) => format!("{}d", d),
        (d, h) => format!("{}d{}h", d, h),
    }
}

pub fn build_router(config: &Config) -> Result<Arc<dyn AccessProvisioner>> {
    if config.demo_mode {
        return Ok(Arc::new(DemoRouter));
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.router_timeout_secs))
        // RouterOS ships a self-signed certificate
        .danger_accept_invalid_certs(true)
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build router client: {}", e)))?;

    Ok(Arc::new(MikrotikClient::new(
        client,
        &config.router_url,
        &config.router_user,
        &config.router_password,
        &config.router_profile,
    )))
}
