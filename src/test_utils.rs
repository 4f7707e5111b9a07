//! Shared test utilities.
//!
//! Helpers for setting up in-memory stores and ledgers with sensible
//! defaults, so each test only spells out what it is actually about.

use crate::{
    config::{LedgerSettings, database::create_tables},
    core::{ExpenseBalanceCoordinator, WalletLedger},
    errors::Result,
    models::Principal,
    money::Money,
    store::{DocumentStore, MemoryStore, SeaOrmStore},
};
use sea_orm::{ConnectOptions, DatabaseConnection};
use std::sync::Arc;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all `SQLite` tests.
///
/// The pool holds a single connection: every `SQLite` memory connection is
/// its own database.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);
    let db = sea_orm::Database::connect(options).await?;
    create_tables(&db).await?;
    Ok(db)
}

/// A `SeaOrmStore` over a fresh in-memory database.
pub async fn setup_sea_orm_store() -> Result<SeaOrmStore> {
    Ok(SeaOrmStore::new(setup_test_db().await?))
}

/// Retry settings that tolerate heavy contention without slowing tests down.
///
/// # Defaults
/// * `max_write_attempts`: 64
/// * `retry_backoff_ms`: 1
/// * `max_backoff_ms`: 8
pub fn fast_settings() -> LedgerSettings {
    LedgerSettings {
        max_write_attempts: 64,
        retry_backoff_ms: 1,
        max_backoff_ms: 8,
        ..LedgerSettings::default()
    }
}

/// A ledger over a fresh `MemoryStore`.
pub fn memory_ledger() -> WalletLedger<MemoryStore> {
    WalletLedger::new(Arc::new(MemoryStore::new()), fast_settings())
}

/// A coordinator over a fresh `MemoryStore`.
pub fn memory_coordinator() -> ExpenseBalanceCoordinator<MemoryStore> {
    ExpenseBalanceCoordinator::new(Arc::new(MemoryStore::new()), fast_settings())
}

/// A `SeaOrmStore` over a new database file in `dir`, through a regular
/// multi-connection pool.
pub async fn setup_file_store(dir: &tempfile::TempDir) -> Result<SeaOrmStore> {
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("ledger.sqlite").display());
    SeaOrmStore::connect(&url).await
}

/// A coordinator over a fresh in-memory `SQLite` database.
pub async fn sea_orm_coordinator() -> Result<ExpenseBalanceCoordinator<SeaOrmStore>> {
    Ok(ExpenseBalanceCoordinator::new(
        Arc::new(setup_sea_orm_store().await?),
        fast_settings(),
    ))
}

/// Deposits `cents` into the principal's wallet.
pub async fn fund<S: DocumentStore>(
    ledger: &WalletLedger<S>,
    principal: &Principal,
    cents: i64,
) -> Result<()> {
    ledger
        .deposit(principal, Money::from_cents(cents), Some("Opening balance"))
        .await?;
    Ok(())
}

/// Principal used as the main test user.
pub fn alice() -> Principal {
    Principal::new("alice")
}

/// Principal used as the second, unrelated user.
pub fn bob() -> Principal {
    Principal::new("bob")
}

/// Routes log output through the test harness. Safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("expense_ledger=debug")
        .with_test_writer()
        .try_init();
}
