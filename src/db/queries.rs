use chrono::Utc;
use rusqlite::{Connection, params};

use crate::error::{AppError, Result};
use crate::models::*;

use super::from_row::{
    PACKAGE_COLS, PAYMENT_COLS, SESSION_COLS, VOUCHER_COLS, aliased, query_all, query_one,
};

pub fn now() -> i64 {
    Utc::now().timestamp()
}

/// UNIQUE constraint only; foreign-key, CHECK and NOT NULL failures are real errors.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

// ============ Packages ============

pub fn create_package(conn: &Connection, input: &CreatePackage) -> Result<Package> {
    if input.name.trim().is_empty() {
        return Err(AppError::BadRequest("Package name is required".into()));
    }
    if input.duration_hours <= 0 || input.price <= 0 {
        return Err(AppError::BadRequest(
            "duration_hours and price must be positive".into(),
        ));
    }

    let now = now();
    conn.execute(
        "INSERT INTO packages (name, description, duration_hours, price, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, 1, ?5)",
        params![&input.name, &input.description, input.duration_hours, input.price, now],
    )?;

    Ok(Package {
        id: conn.last_insert_rowid(),
        name: input.name.clone(),
        description: input.description.clone(),
        duration_hours: input.duration_hours,
        price: input.price,
        is_active: true,
        created_at: now,
    })
}

/// Look up a package regardless of its active flag (historical references stay valid).
pub fn get_package_by_id(conn: &Connection, id: i64) -> Result<Option<Package>> {
    query_one(
        conn,
        &format!("SELECT {} FROM packages WHERE id = ?1", PACKAGE_COLS),
        params![id],
    )
}

pub fn list_active_packages(conn: &Connection) -> Result<Vec<Package>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM packages WHERE is_active = 1 ORDER BY price ASC",
            PACKAGE_COLS
        ),
        params![],
    )
}

pub fn list_all_packages(conn: &Connection) -> Result<Vec<Package>> {
    query_all(
        conn,
        &format!("SELECT {} FROM packages ORDER BY price ASC", PACKAGE_COLS),
        params![],
    )
}

pub fn count_packages(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM packages", [], |row| row.get(0))?;
    Ok(count)
}

/// Soft-delete: the row stays so payments and vouchers keep a valid reference.
pub fn deactivate_package(conn: &Connection, id: i64) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE packages SET is_active = 0 WHERE id = ?1 AND is_active = 1",
        params![id],
    )?;
    Ok(affected > 0)
}

// ============ Payments ============

pub fn create_payment(conn: &Connection, input: &CreatePayment) -> Result<Payment> {
    let now = now();
    conn.execute(
        "INSERT INTO payments (tx_ref, phone, amount, package_id, status, mac_address, ip_address, created_at)
         VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?6, ?7)",
        params![
            &input.tx_ref,
            &input.phone,
            input.amount,
            input.package_id,
            &input.mac_address,
            &input.ip_address,
            now
        ],
    )?;

    Ok(Payment {
        id: conn.last_insert_rowid(),
        tx_ref: input.tx_ref.clone(),
        provider_ref: None,
        phone: input.phone.clone(),
        amount: input.amount,
        package_id: input.package_id,
        status: PaymentStatus::Pending,
        mac_address: input.mac_address.clone(),
        ip_address: input.ip_address.clone(),
        created_at: now,
        paid_at: None,
        expires_at: None,
    })
}

pub fn get_payment_by_tx_ref(conn: &Connection, tx_ref: &str) -> Result<Option<Payment>> {
    query_one(
        conn,
        &format!("SELECT {} FROM payments WHERE tx_ref = ?1", PAYMENT_COLS),
        params![tx_ref],
    )
}

pub fn get_payment_by_id(conn: &Connection, id: i64) -> Result<Option<Payment>> {
    query_one(
        conn,
        &format!("SELECT {} FROM payments WHERE id = ?1", PAYMENT_COLS),
        params![id],
    )
}

/// Atomically move a payment from `pending` to `successful`.
///
/// Compare-and-swap on the status column: when a webhook races a status
/// poll (or a webhook is delivered twice) exactly one caller gets `true`
/// and goes on to provision access. `paid_at` and `expires_at` are written
/// in the same statement, so they are set exactly once.
pub fn try_mark_payment_successful(
    conn: &Connection,
    tx_ref: &str,
    provider_ref: Option<&str>,
    paid_at: i64,
    expires_at: i64,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE payments
         SET status = 'successful', provider_ref = COALESCE(?1, provider_ref), paid_at = ?2, expires_at = ?3
         WHERE tx_ref = ?4 AND status = 'pending'",
        params![provider_ref, paid_at, expires_at, tx_ref],
    )?;
    Ok(affected > 0)
}

/// Atomically move a payment from `pending` to `failed`. A successful
/// payment is never downgraded.
pub fn try_mark_payment_failed(
    conn: &Connection,
    tx_ref: &str,
    provider_ref: Option<&str>,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE payments SET status = 'failed', provider_ref = COALESCE(?1, provider_ref)
         WHERE tx_ref = ?2 AND status = 'pending'",
        params![provider_ref, tx_ref],
    )?;
    Ok(affected > 0)
}

pub fn set_payment_provider_ref(conn: &Connection, tx_ref: &str, provider_ref: &str) -> Result<()> {
    conn.execute(
        "UPDATE payments SET provider_ref = ?1 WHERE tx_ref = ?2",
        params![provider_ref, tx_ref],
    )?;
    Ok(())
}

pub fn list_payments(
    conn: &Connection,
    status: Option<PaymentStatus>,
    limit: i64,
) -> Result<Vec<PaymentWithPackage>> {
    let cols = aliased(PAYMENT_COLS, "p");
    match status {
        Some(status) => query_all(
            conn,
            &format!(
                "SELECT {}, pkg.name FROM payments p
                 LEFT JOIN packages pkg ON p.package_id = pkg.id
                 WHERE p.status = ?1
                 ORDER BY p.created_at DESC, p.id DESC LIMIT ?2",
                cols
            ),
            params![status.as_ref(), limit],
        ),
        None => query_all(
            conn,
            &format!(
                "SELECT {}, pkg.name FROM payments p
                 LEFT JOIN packages pkg ON p.package_id = pkg.id
                 ORDER BY p.created_at DESC, p.id DESC LIMIT ?1",
                cols
            ),
            params![limit],
        ),
    }
}

/// Payments marked successful that never got a session: money was captured
/// but activation did not complete (e.g. a crash between the status flip
/// and the session insert).
pub fn list_paid_payments_without_session(conn: &Connection) -> Result<Vec<PaymentWithPackage>> {
    query_all(
        conn,
        &format!(
            "SELECT {}, pkg.name FROM payments p
             LEFT JOIN packages pkg ON p.package_id = pkg.id
             WHERE p.status = 'successful'
               AND NOT EXISTS (SELECT 1 FROM sessions s WHERE s.payment_id = p.id)
             ORDER BY p.paid_at ASC",
            aliased(PAYMENT_COLS, "p")
        ),
        params![],
    )
}

// ============ Sessions ============

pub fn create_session(conn: &Connection, input: &CreateSession) -> Result<Session> {
    conn.execute(
        "INSERT INTO sessions (payment_id, voucher_id, mac_address, ip_address, username, password,
                               package_name, started_at, expires_at, is_active, provisioned)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10)",
        params![
            input.payment_id,
            input.voucher_id,
            &input.mac_address,
            &input.ip_address,
            &input.username,
            &input.password,
            &input.package_name,
            input.started_at,
            input.expires_at,
            input.provisioned
        ],
    )?;

    Ok(Session {
        id: conn.last_insert_rowid(),
        payment_id: input.payment_id,
        voucher_id: input.voucher_id,
        mac_address: input.mac_address.clone(),
        ip_address: input.ip_address.clone(),
        username: input.username.clone(),
        password: input.password.clone(),
        package_name: input.package_name.clone(),
        started_at: input.started_at,
        expires_at: input.expires_at,
        is_active: true,
        provisioned: input.provisioned,
    })
}

pub fn get_session_by_id(conn: &Connection, id: i64) -> Result<Option<Session>> {
    query_one(
        conn,
        &format!("SELECT {} FROM sessions WHERE id = ?1", SESSION_COLS),
        params![id],
    )
}

pub fn get_session_by_payment(conn: &Connection, payment_id: i64) -> Result<Option<Session>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM sessions WHERE payment_id = ?1 AND payment_id > 0",
            SESSION_COLS
        ),
        params![payment_id],
    )
}

pub fn get_session_by_voucher(conn: &Connection, voucher_id: i64) -> Result<Option<Session>> {
    query_one(
        conn,
        &format!("SELECT {} FROM sessions WHERE voucher_id = ?1", SESSION_COLS),
        params![voucher_id],
    )
}

pub fn count_sessions_for_payment(conn: &Connection, payment_id: i64) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM sessions WHERE payment_id = ?1",
        params![payment_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Sessions that currently grant access.
pub fn list_active_sessions(conn: &Connection) -> Result<Vec<Session>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM sessions WHERE is_active = 1 AND expires_at > ?1 ORDER BY started_at DESC",
            SESSION_COLS
        ),
        params![now()],
    )
}

/// Sessions whose router account was never created.
pub fn list_unprovisioned_sessions(conn: &Connection) -> Result<Vec<Session>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM sessions WHERE provisioned = 0 AND is_active = 1 ORDER BY started_at ASC",
            SESSION_COLS
        ),
        params![],
    )
}

pub fn mark_session_provisioned(conn: &Connection, id: i64) -> Result<()> {
    conn.execute(
        "UPDATE sessions SET provisioned = 1 WHERE id = ?1",
        params![id],
    )?;
    Ok(())
}

/// Deactivate one session. Returns false if it was already inactive;
/// sessions are never reactivated.
pub fn deactivate_session(conn: &Connection, id: i64) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE sessions SET is_active = 0 WHERE id = ?1 AND is_active = 1",
        params![id],
    )?;
    Ok(affected > 0)
}

/// Deactivate every active session whose expiry has passed, returning the
/// rows that were flipped by this call.
pub fn deactivate_expired_sessions(conn: &Connection, now: i64) -> Result<Vec<Session>> {
    query_all(
        conn,
        &format!(
            "UPDATE sessions SET is_active = 0
             WHERE is_active = 1 AND expires_at <= ?1
             RETURNING {}",
            SESSION_COLS
        ),
        params![now],
    )
}

// ============ Vouchers ============

/// Unambiguous alphabet: no I, O, 0 or 1.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const VOUCHER_CODE_LEN: usize = 8;
const VOUCHER_CODE_ATTEMPTS: usize = 10;
pub const MAX_VOUCHER_BATCH: i64 = 50;

/// Random string drawn from `CODE_ALPHABET`.
pub fn random_code(len: usize) -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

pub fn generate_voucher_code() -> String {
    random_code(VOUCHER_CODE_LEN)
}

/// Canonical form of a user-typed voucher code.
pub fn normalize_voucher_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Insert a voucher with an explicit code. Fails on a duplicate code.
pub fn create_voucher(conn: &Connection, code: &str, package_id: i64) -> Result<Voucher> {
    let code = normalize_voucher_code(code);
    let now = now();
    conn.execute(
        "INSERT INTO vouchers (code, package_id, is_used, created_at) VALUES (?1, ?2, 0, ?3)",
        params![&code, package_id, now],
    )?;

    Ok(Voucher {
        id: conn.last_insert_rowid(),
        code,
        package_id,
        is_used: false,
        used_by: None,
        used_at: None,
        created_at: now,
    })
}

/// Issue one voucher with a fresh random code, retrying on collision.
///
/// The UNIQUE constraint on `code` is the collision check, so two
/// concurrent issuers can never hand out the same code.
pub fn issue_voucher(conn: &Connection, package_id: i64) -> Result<Voucher> {
    for _ in 0..VOUCHER_CODE_ATTEMPTS {
        match create_voucher(conn, &generate_voucher_code(), package_id) {
            Ok(voucher) => return Ok(voucher),
            Err(AppError::Database(ref e)) if is_unique_violation(e) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(AppError::Internal(format!(
        "Could not generate a unique voucher code after {} attempts",
        VOUCHER_CODE_ATTEMPTS
    )))
}

/// Bulk issuance. Quantity is clamped to `1..=MAX_VOUCHER_BATCH`.
pub fn issue_vouchers(conn: &Connection, package_id: i64, quantity: i64) -> Result<Vec<Voucher>> {
    let quantity = quantity.clamp(1, MAX_VOUCHER_BATCH);
    (0..quantity).map(|_| issue_voucher(conn, package_id)).collect()
}

pub fn get_voucher_by_code(conn: &Connection, code: &str) -> Result<Option<Voucher>> {
    query_one(
        conn,
        &format!("SELECT {} FROM vouchers WHERE code = ?1", VOUCHER_COLS),
        params![normalize_voucher_code(code)],
    )
}

/// Atomically claim an unused voucher.
///
/// Returns `Ok(true)` only for the single caller that flipped `is_used`;
/// every concurrent or later attempt gets `Ok(false)`.
pub fn try_redeem_voucher(conn: &Connection, id: i64, used_by: &str, used_at: i64) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE vouchers SET is_used = 1, used_by = ?1, used_at = ?2 WHERE id = ?3 AND is_used = 0",
        params![used_by, used_at, id],
    )?;
    Ok(affected > 0)
}

pub fn list_vouchers(conn: &Connection, limit: i64) -> Result<Vec<VoucherWithPackage>> {
    query_all(
        conn,
        &format!(
            "SELECT {}, p.name, p.price FROM vouchers v
             LEFT JOIN packages p ON v.package_id = p.id
             ORDER BY v.created_at DESC, v.id DESC LIMIT ?1",
            aliased(VOUCHER_COLS, "v")
        ),
        params![limit],
    )
}

/// Only unused vouchers can be deleted; a used one is part of a session's history.
pub fn delete_unused_voucher(conn: &Connection, id: i64) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM vouchers WHERE id = ?1 AND is_used = 0",
        params![id],
    )?;
    Ok(deleted > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voucher_codes_use_unambiguous_alphabet() {
        for _ in 0..200 {
            let code = generate_voucher_code();
            assert_eq!(code.len(), VOUCHER_CODE_LEN);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)), "bad code {}", code);
            assert!(!code.contains(['I', 'O', '0', '1']));
        }
    }

    #[test]
    fn normalize_uppercases_and_trims() {
        assert_eq!(normalize_voucher_code("  abcd2345 "), "ABCD2345");
    }
}
