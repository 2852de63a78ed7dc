use serde::{Deserialize, Serialize};

/// Payment id recorded on sessions that came from a voucher.
pub const VOUCHER_PAYMENT_ID: i64 = 0;

/// A granted, time-bounded access record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    /// `VOUCHER_PAYMENT_ID` for voucher-originated sessions
    pub payment_id: i64,
    pub voucher_id: Option<i64>,
    pub mac_address: String,
    pub ip_address: Option<String>,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub package_name: String,
    pub started_at: i64,
    pub expires_at: i64,
    pub is_active: bool,
    /// Whether the router accepted the hotspot account
    pub provisioned: bool,
}

#[derive(Debug)]
pub struct CreateSession {
    pub payment_id: i64,
    pub voucher_id: Option<i64>,
    pub mac_address: String,
    pub ip_address: Option<String>,
    pub username: String,
    pub password: String,
    pub package_name: String,
    pub started_at: i64,
    pub expires_at: i64,
    pub provisioned: bool,
}
