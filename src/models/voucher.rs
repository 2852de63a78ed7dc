use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voucher {
    pub id: i64,
    /// Always stored uppercase
    pub code: String,
    pub package_id: i64,
    pub is_used: bool,
    /// MAC address of the redeeming device
    pub used_by: Option<String>,
    pub used_at: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VoucherWithPackage {
    #[serde(flatten)]
    pub voucher: Voucher,
    pub package_name: Option<String>,
    pub package_price: Option<i64>,
}
