use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::{Package, Voucher};

use super::{ActivationTarget, Credentials, UNKNOWN_MAC, activate};

/// Redeem a printed voucher for access.
///
/// The `is_used` flip is a conditional update, so of two simultaneous
/// redemptions exactly one activates and the other gets `AlreadyUsed`. Once
/// claimed the voucher stays consumed even if activation fails afterwards.
pub async fn redeem_voucher(
    state: &AppState,
    code: &str,
    mac_address: Option<&str>,
    ip_address: Option<&str>,
) -> Result<Credentials> {
    let code = queries::normalize_voucher_code(code);
    if code.is_empty() {
        return Err(AppError::BadRequest("Voucher code is required".into()));
    }
    let mac_address = mac_address
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(UNKNOWN_MAC);

    let (voucher, package, used_at) = {
        let conn = state.db.get()?;
        let voucher = queries::get_voucher_by_code(&conn, &code)?
            .ok_or_else(|| AppError::NotFound("Invalid voucher code".into()))?;
        if voucher.is_used {
            return Err(AppError::AlreadyUsed("Voucher has already been used".into()));
        }

        let package = queries::get_package_by_id(&conn, voucher.package_id)?.ok_or_else(|| {
            AppError::Internal(format!(
                "Package {} referenced by voucher {} does not exist",
                voucher.package_id, voucher.id
            ))
        })?;

        let used_at = queries::now();
        if !queries::try_redeem_voucher(&conn, voucher.id, mac_address, used_at)? {
            return Err(AppError::AlreadyUsed("Voucher has already been used".into()));
        }
        (voucher, package, used_at)
    };

    tracing::info!("Voucher {} redeemed by {}", voucher.code, mac_address);

    let target = ActivationTarget::Voucher {
        voucher: &voucher,
        mac_address,
        ip_address,
    };
    activate(state, &package, target, used_at).await
}

/// Bulk-issue vouchers for an active package. Shared by the admin API and
/// the `vouchers` command.
pub fn issue_voucher_batch(state: &AppState, package_id: i64, quantity: i64) -> Result<(Package, Vec<Voucher>)> {
    let conn = state.db.get()?;
    let package = queries::get_package_by_id(&conn, package_id)?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::BadRequest("Invalid package selected".into()))?;

    let vouchers = queries::issue_vouchers(&conn, package.id, quantity)?;
    tracing::info!("Issued {} vouchers for package {}", vouchers.len(), package.id);
    Ok((package, vouchers))
}
