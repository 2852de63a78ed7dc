//! Payment-to-access activation.
//!
//! Three triggers (provider webhook, client status poll, voucher redemption)
//! converge on [`activate`], the only code path that creates a session or
//! touches the router. Double activation is prevented by the ledger's
//! conditional updates, never by in-process locks, so any number of
//! instances can share one database.

mod credentials;
mod initiate;
mod maintenance;
mod poll;
mod voucher;
mod webhook;

pub use credentials::*;
pub use initiate::*;
pub use maintenance::*;
pub use poll::*;
pub use voucher::*;
pub use webhook::*;

use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::hotspot::{HotspotUser, uptime_limit};
use crate::models::{CreateSession, Package, Payment, Session, VOUCHER_PAYMENT_ID, Voucher};
use crate::payments::ReportedAmount;

/// MAC recorded when the portal could not report the device.
pub const UNKNOWN_MAC: &str = "unknown";

const SECONDS_PER_HOUR: i64 = 3600;

/// What the customer needs to log in to the hotspot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub package_name: String,
    pub expires_at: i64,
}

impl From<Session> for Credentials {
    fn from(session: Session) -> Self {
        Self {
            username: session.username,
            password: session.password,
            package_name: session.package_name,
            expires_at: session.expires_at,
        }
    }
}

/// What a session is granted for.
#[derive(Debug, Clone, Copy)]
pub enum ActivationTarget<'a> {
    Payment(&'a Payment),
    Voucher {
        voucher: &'a Voucher,
        mac_address: &'a str,
        ip_address: Option<&'a str>,
    },
}

impl ActivationTarget<'_> {
    fn payment_id(&self) -> i64 {
        match self {
            ActivationTarget::Payment(payment) => payment.id,
            ActivationTarget::Voucher { .. } => VOUCHER_PAYMENT_ID,
        }
    }

    fn voucher_id(&self) -> Option<i64> {
        match self {
            ActivationTarget::Payment(_) => None,
            ActivationTarget::Voucher { voucher, .. } => Some(voucher.id),
        }
    }

    fn mac_address(&self) -> &str {
        match self {
            ActivationTarget::Payment(payment) => payment.mac_address.as_deref().unwrap_or(UNKNOWN_MAC),
            ActivationTarget::Voucher { mac_address, .. } => *mac_address,
        }
    }

    fn ip_address(&self) -> Option<&str> {
        match self {
            ActivationTarget::Payment(payment) => payment.ip_address.as_deref(),
            ActivationTarget::Voucher { ip_address, .. } => *ip_address,
        }
    }

    fn username(&self, prefix: &str) -> String {
        match self {
            ActivationTarget::Payment(payment) => payment_username(prefix, &payment.phone, payment.id),
            ActivationTarget::Voucher { voucher, .. } => voucher_username(prefix, &voucher.code, voucher.id),
        }
    }

    fn existing_session(&self, conn: &rusqlite::Connection) -> Result<Option<Session>> {
        match self {
            ActivationTarget::Payment(payment) => queries::get_session_by_payment(conn, payment.id),
            ActivationTarget::Voucher { voucher, .. } => queries::get_session_by_voucher(conn, voucher.id),
        }
    }
}

/// A success report is only honoured when its amount, if any, is exactly
/// what the payment was charged.
pub(crate) fn amount_matches(payment: &Payment, reported: Option<&ReportedAmount>) -> bool {
    match reported {
        Some(amount) if !amount.matches(payment.amount) => {
            tracing::error!(
                "Amount mismatch for {}: expected {}, provider reported {}",
                payment.tx_ref,
                payment.amount,
                amount
            );
            false
        }
        _ => true,
    }
}

/// `started_at + duration`, the single expiry rule for payments and vouchers.
pub fn expiry_for(package: &Package, started_at: i64) -> i64 {
    started_at + package.duration_hours * SECONDS_PER_HOUR
}

/// Open a session for an already-committed payment or voucher and create
/// the matching hotspot account.
///
/// The caller must have won the ledger transition (payment pending ->
/// successful, or voucher unused -> used) before calling this. `started_at`
/// is the commit time (`paid_at` / `used_at`), so the session expiry always
/// equals the one recorded on the payment.
///
/// A router failure does not fail activation: the session is kept with
/// `provisioned = false` and shows up in reconciliation.
pub async fn activate(
    state: &AppState,
    package: &Package,
    target: ActivationTarget<'_>,
    started_at: i64,
) -> Result<Credentials> {
    let username = target.username(&state.username_prefix);
    let password = generate_password();
    let expires_at = expiry_for(package, started_at);
    let mac_address = target.mac_address().to_string();

    let session = {
        let conn = state.db.get()?;
        let input = CreateSession {
            payment_id: target.payment_id(),
            voucher_id: target.voucher_id(),
            mac_address: mac_address.clone(),
            ip_address: target.ip_address().map(str::to_string),
            username: username.clone(),
            password: password.clone(),
            package_name: package.name.clone(),
            started_at,
            expires_at,
            provisioned: false,
        };
        match queries::create_session(&conn, &input) {
            Ok(session) => session,
            // Unique index on payment_id / voucher_id: someone else already opened it
            Err(AppError::Database(ref e)) if queries::is_unique_violation(e) => {
                let existing = target.existing_session(&conn)?.ok_or_else(|| {
                    AppError::Internal(format!("Session for {} vanished after conflict", username))
                })?;
                return Ok(existing.into());
            }
            Err(e) => return Err(e),
        }
    };

    let user = HotspotUser {
        username: session.username.clone(),
        password: session.password.clone(),
        mac_address: (mac_address != UNKNOWN_MAC).then_some(mac_address),
        uptime_limit: uptime_limit(package.duration_hours),
    };

    match state.router.create_user(&user).await {
        Ok(()) => {
            let conn = state.db.get()?;
            queries::mark_session_provisioned(&conn, session.id)?;
        }
        Err(e) => {
            tracing::error!(
                "Provisioning failed for session {} (user {}): {}; left for reconciliation",
                session.id,
                session.username,
                e
            );
        }
    }

    Ok(session.into())
}

/// Apply a provider "successful" report to a pending payment.
///
/// Returns the new credentials when this call won the transition, `None`
/// when the payment was no longer pending (another webhook or poll got
/// there first).
pub async fn settle_successful(
    state: &AppState,
    payment: &Payment,
    provider_ref: Option<&str>,
) -> Result<Option<Credentials>> {
    let (package, paid_at, won) = {
        let conn = state.db.get()?;
        // Looked up before the flip so a dangling package never strands a paid payment
        let package = queries::get_package_by_id(&conn, payment.package_id)?.ok_or_else(|| {
            AppError::Internal(format!(
                "Package {} referenced by payment {} does not exist",
                payment.package_id, payment.tx_ref
            ))
        })?;
        let paid_at = queries::now();
        let won = queries::try_mark_payment_successful(
            &conn,
            &payment.tx_ref,
            provider_ref,
            paid_at,
            expiry_for(&package, paid_at),
        )?;
        (package, paid_at, won)
    };

    if !won {
        return Ok(None);
    }

    tracing::info!("Payment {} marked successful", payment.tx_ref);
    let credentials = activate(state, &package, ActivationTarget::Payment(payment), paid_at).await?;
    Ok(Some(credentials))
}

/// Apply a provider "failed" report. Only a pending payment can fail.
pub fn settle_failed(state: &AppState, payment: &Payment, provider_ref: Option<&str>) -> Result<bool> {
    let conn = state.db.get()?;
    let changed = queries::try_mark_payment_failed(&conn, &payment.tx_ref, provider_ref)?;
    if changed {
        tracing::info!("Payment {} marked failed", payment.tx_ref);
    }
    Ok(changed)
}
