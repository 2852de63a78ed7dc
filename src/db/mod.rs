mod from_row;
pub mod queries;

use std::sync::Arc;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::hotspot::AccessProvisioner;
use crate::payments::PaymentGateway;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub gateway: Arc<dyn PaymentGateway>,
    pub router: Arc<dyn AccessProvisioner>,
    /// Tag prepended to generated hotspot usernames
    pub username_prefix: String,
    /// ISO code sent with every charge
    pub currency: String,
    pub admin_api_key: Option<String>,
}

/// Open a pooled SQLite database at `path`.
///
/// WAL plus a busy timeout lets several process instances share the file;
/// the ledger's conditional updates are what keep them consistent.
pub fn create_pool(path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(path).with_init(|conn| {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        conn.pragma_update(None, "foreign_keys", "ON")
    });
    Pool::builder().max_size(8).build(manager)
}

pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS packages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT,
            duration_hours INTEGER NOT NULL CHECK (duration_hours > 0),
            price INTEGER NOT NULL CHECK (price > 0),
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS payments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tx_ref TEXT NOT NULL UNIQUE,
            provider_ref TEXT,
            phone TEXT NOT NULL,
            amount INTEGER NOT NULL,
            package_id INTEGER NOT NULL REFERENCES packages(id),
            status TEXT NOT NULL DEFAULT 'pending',
            mac_address TEXT,
            ip_address TEXT,
            created_at INTEGER NOT NULL,
            paid_at INTEGER,
            expires_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_payments_status ON payments(status);

        CREATE TABLE IF NOT EXISTS vouchers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            package_id INTEGER NOT NULL REFERENCES packages(id),
            is_used INTEGER NOT NULL DEFAULT 0,
            used_by TEXT,
            used_at INTEGER,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            payment_id INTEGER NOT NULL,
            voucher_id INTEGER REFERENCES vouchers(id),
            mac_address TEXT NOT NULL,
            ip_address TEXT,
            username TEXT NOT NULL,
            password TEXT NOT NULL,
            package_name TEXT NOT NULL,
            started_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            provisioned INTEGER NOT NULL DEFAULT 0
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_payment
            ON sessions(payment_id) WHERE payment_id > 0;
        CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_voucher
            ON sessions(voucher_id) WHERE voucher_id IS NOT NULL;
        CREATE INDEX IF NOT EXISTS idx_sessions_active ON sessions(is_active, expires_at);
        ",
    )
}

/// Insert the stock catalog when no packages exist yet.
pub fn seed_default_packages(conn: &Connection) -> crate::error::Result<usize> {
    if queries::count_packages(conn)? > 0 {
        return Ok(0);
    }

    let defaults = [
        ("1 DAY", "24 Hours unlimited access", 24, 1000),
        ("3 DAYS", "72 Hours unlimited access", 72, 2500),
        ("WEEKLY", "7 Days unlimited access", 168, 6000),
        ("MONTHLY", "30 Days unlimited access", 720, 25000),
    ];

    for (name, description, duration_hours, price) in defaults {
        queries::create_package(
            conn,
            &crate::models::CreatePackage {
                name: name.to_string(),
                description: Some(description.to_string()),
                duration_hours,
                price,
            },
        )?;
    }

    tracing::info!("Seeded {} default packages", defaults.len());
    Ok(defaults.len())
}
