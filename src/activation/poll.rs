use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::PaymentStatus;
use crate::payments::ProviderStatus;

use super::{Credentials, amount_matches, settle_failed, settle_successful};

#[derive(Debug, Clone, Serialize)]
pub struct PollOutcome {
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<Credentials>,
}

impl PollOutcome {
    fn pending() -> Self {
        Self {
            status: PaymentStatus::Pending,
            session: None,
        }
    }
}

/// What the ledger alone can answer, or `None` while the payment is still
/// pending and the provider has to be asked.
fn settled_outcome(state: &AppState, tx_ref: &str) -> Result<Option<PollOutcome>> {
    let conn = state.db.get()?;
    let payment = queries::get_payment_by_tx_ref(&conn, tx_ref)?
        .ok_or_else(|| AppError::NotFound("Transaction not found".into()))?;

    let outcome = match payment.status {
        PaymentStatus::Pending => return Ok(None),
        PaymentStatus::Failed => PollOutcome {
            status: PaymentStatus::Failed,
            session: None,
        },
        PaymentStatus::Successful => match queries::get_session_by_payment(&conn, payment.id)? {
            Some(session) => PollOutcome {
                status: PaymentStatus::Successful,
                session: Some(session.into()),
            },
            // Marked paid, session not written yet: keep the client polling
            None => PollOutcome::pending(),
        },
    };
    Ok(Some(outcome))
}

/// Client-driven status check, the fallback when webhooks are late or lost.
///
/// A settled payment is answered from the ledger; "successful" is only
/// reported together with its credentials. A pending one is checked with
/// the provider; a transport error there reads as still pending, never as
/// failed.
pub async fn poll_status(state: &AppState, tx_ref: &str) -> Result<PollOutcome> {
    if let Some(outcome) = settled_outcome(state, tx_ref)? {
        return Ok(outcome);
    }

    let report = match state.gateway.query_status(tx_ref).await {
        Ok(report) => report,
        Err(e) => {
            tracing::warn!("Status check for {} failed, reporting pending: {}", tx_ref, e);
            return Ok(PollOutcome::pending());
        }
    };

    let payment = {
        let conn = state.db.get()?;
        queries::get_payment_by_tx_ref(&conn, tx_ref)?
            .ok_or_else(|| AppError::NotFound("Transaction not found".into()))?
    };

    match report.status {
        ProviderStatus::Pending => return Ok(PollOutcome::pending()),
        ProviderStatus::Successful => {
            if !amount_matches(&payment, report.amount.as_ref()) {
                return Ok(PollOutcome::pending());
            }
            if let Some(credentials) = settle_successful(state, &payment, report.provider_ref.as_deref()).await? {
                return Ok(PollOutcome {
                    status: PaymentStatus::Successful,
                    session: Some(credentials),
                });
            }
        }
        ProviderStatus::Failed => {
            settle_failed(state, &payment, report.provider_ref.as_deref())?;
        }
    }

    // Lost the race to a concurrent webhook or poll; report what it wrote
    Ok(settled_outcome(state, tx_ref)?.unwrap_or_else(PollOutcome::pending))
}
