//! Row mapping for the ledger tables.
//!
//! Each `*_COLS` constant lists columns in exactly the order the matching
//! `FromRow` impl reads them, so queries select with
//! `format!("SELECT {} FROM ...", PAYMENT_COLS)`.

use rusqlite::{Connection, OptionalExtension, Params, Row, types::Type};

use crate::error::Result;
use crate::models::{
    Package, Payment, PaymentStatus, PaymentWithPackage, Session, Voucher, VoucherWithPackage,
};

pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

pub const PACKAGE_COLS: &str =
    "id, name, description, duration_hours, price, is_active, created_at";

pub const PAYMENT_COLS: &str = "id, tx_ref, provider_ref, phone, amount, package_id, status, \
     mac_address, ip_address, created_at, paid_at, expires_at";

pub const SESSION_COLS: &str = "id, payment_id, voucher_id, mac_address, ip_address, username, \
     password, package_name, started_at, expires_at, is_active, provisioned";

pub const VOUCHER_COLS: &str = "id, code, package_id, is_used, used_by, used_at, created_at";

/// Prefix every column in a list with a table alias (`p.id, p.tx_ref, ...`).
pub fn aliased(cols: &str, alias: &str) -> String {
    cols.split(',')
        .map(|c| format!("{}.{}", alias, c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

impl FromRow for Package {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Package {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            duration_hours: row.get(3)?,
            price: row.get(4)?,
            is_active: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

impl FromRow for Payment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let status: String = row.get(6)?;
        let status = status.parse::<PaymentStatus>().map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                6,
                Type::Text,
                format!("invalid payment status '{}'", status).into(),
            )
        })?;

        Ok(Payment {
            id: row.get(0)?,
            tx_ref: row.get(1)?,
            provider_ref: row.get(2)?,
            phone: row.get(3)?,
            amount: row.get(4)?,
            package_id: row.get(5)?,
            status,
            mac_address: row.get(7)?,
            ip_address: row.get(8)?,
            created_at: row.get(9)?,
            paid_at: row.get(10)?,
            expires_at: row.get(11)?,
        })
    }
}

impl FromRow for Session {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Session {
            id: row.get(0)?,
            payment_id: row.get(1)?,
            voucher_id: row.get(2)?,
            mac_address: row.get(3)?,
            ip_address: row.get(4)?,
            username: row.get(5)?,
            password: row.get(6)?,
            package_name: row.get(7)?,
            started_at: row.get(8)?,
            expires_at: row.get(9)?,
            is_active: row.get(10)?,
            provisioned: row.get(11)?,
        })
    }
}

impl FromRow for Voucher {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Voucher {
            id: row.get(0)?,
            code: row.get(1)?,
            package_id: row.get(2)?,
            is_used: row.get(3)?,
            used_by: row.get(4)?,
            used_at: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

/// Payment columns followed by `package_name` (LEFT JOIN, may be NULL).
impl FromRow for PaymentWithPackage {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(PaymentWithPackage {
            payment: Payment::from_row(row)?,
            package_name: row.get(12)?,
        })
    }
}

/// Voucher columns followed by `package_name, package_price`.
impl FromRow for VoucherWithPackage {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(VoucherWithPackage {
            voucher: Voucher::from_row(row)?,
            package_name: row.get(7)?,
            package_price: row.get(8)?,
        })
    }
}

pub fn query_one<T: FromRow, P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Option<T>> {
    let found = conn.query_row(sql, params, |row| T::from_row(row)).optional()?;
    Ok(found)
}

pub fn query_all<T: FromRow, P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, |row| T::from_row(row))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
