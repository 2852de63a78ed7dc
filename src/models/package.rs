use serde::{Deserialize, Serialize};

/// A sellable time-boxed access package.
///
/// Packages are never hard-deleted: payments and vouchers keep referencing
/// them, so "deleting" one only clears `is_active`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub duration_hours: i64,
    /// Whole currency units (UGX has no minor unit)
    pub price: i64,
    pub is_active: bool,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreatePackage {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub duration_hours: i64,
    pub price: i64,
}
