use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Successful,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    /// Idempotency key shared with the provider (Flutterwave tx_ref / pawaPay depositId)
    pub tx_ref: String,
    /// Provider's own transaction id, recorded on the terminal transition
    pub provider_ref: Option<String>,
    pub phone: String,
    pub amount: i64,
    pub package_id: i64,
    pub status: PaymentStatus,
    pub mac_address: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: i64,
    pub paid_at: Option<i64>,
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentWithPackage {
    #[serde(flatten)]
    pub payment: Payment,
    pub package_name: Option<String>,
}

#[derive(Debug)]
pub struct CreatePayment {
    pub tx_ref: String,
    pub phone: String,
    pub amount: i64,
    pub package_id: i64,
    pub mac_address: Option<String>,
    pub ip_address: Option<String>,
}
