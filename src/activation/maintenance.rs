use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::{PaymentWithPackage, Session};

use super::UNKNOWN_MAC;

#[derive(Debug, Serialize)]
pub struct ReconciliationReport {
    /// Money captured, no session opened
    pub paid_without_session: Vec<PaymentWithPackage>,
    /// Session opened, router account never created
    pub unprovisioned_sessions: Vec<Session>,
}

/// Items an operator has to fix by hand.
pub fn reconciliation_report(state: &AppState) -> Result<ReconciliationReport> {
    let conn = state.db.get()?;
    Ok(ReconciliationReport {
        paid_without_session: queries::list_paid_payments_without_session(&conn)?,
        unprovisioned_sessions: queries::list_unprovisioned_sessions(&conn)?,
    })
}

/// Deactivate every expired session and remove its router account.
/// Returns how many sessions this call expired.
pub async fn sweep_expired_sessions(state: &AppState) -> Result<usize> {
    let expired = {
        let conn = state.db.get()?;
        queries::deactivate_expired_sessions(&conn, queries::now())?
    };

    for session in &expired {
        if let Err(e) = state.router.remove_user(&session.username).await {
            tracing::warn!("Failed to remove expired hotspot user {}: {}", session.username, e);
        }
    }

    if !expired.is_empty() {
        tracing::info!("Expired {} sessions", expired.len());
    }
    Ok(expired.len())
}

/// Operator disconnect. The ledger flip happens first; router cleanup is
/// best-effort.
pub async fn disconnect_session(state: &AppState, id: i64) -> Result<Session> {
    let (session, changed) = {
        let conn = state.db.get()?;
        let changed = queries::deactivate_session(&conn, id)?;
        let session = queries::get_session_by_id(&conn, id)?
            .ok_or_else(|| AppError::NotFound("Session not found".into()))?;
        (session, changed)
    };

    if !changed {
        return Ok(session);
    }

    if session.mac_address != UNKNOWN_MAC {
        if let Err(e) = state.router.disconnect(&session.mac_address).await {
            tracing::warn!("Failed to disconnect {}: {}", session.mac_address, e);
        }
    }
    if let Err(e) = state.router.remove_user(&session.username).await {
        tracing::warn!("Failed to remove hotspot user {}: {}", session.username, e);
    }

    tracing::info!("Session {} ({}) disconnected", session.id, session.username);
    Ok(session)
}
