//! Database configuration module.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust
//! structs. The composite index backing the ordered expense query is created
//! here as well; without it the expense list reports a query configuration
//! error instead of silently scanning.

use crate::entities::{Expense, ExpenseColumn, Wallet, WalletTransaction};
use crate::errors::Result;
use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, Schema, Statement,
    sea_query::{Index, IndexOrder},
};
use tracing::{debug, info, instrument};

/// Name of the `(user_id ASC, date DESC)` index on `expenses`.
pub const EXPENSE_INDEX: &str = "idx_expenses_user_date";

const DEFAULT_DATABASE_URL: &str = "sqlite://data/expense_ledger.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable or
/// returns the default local `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the given database URL.
#[instrument]
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    let db = Database::connect(database_url).await?;
    info!("Database connection opened.");
    Ok(db)
}

/// Creates all ledger tables and the expense index if they do not exist yet.
///
/// Safe to call on every start-up.
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    // Wallets first: wallet_transactions references it
    let mut wallet_table = schema.create_table_from_entity(Wallet);
    let mut transaction_table = schema.create_table_from_entity(WalletTransaction);
    let mut expense_table = schema.create_table_from_entity(Expense);

    wallet_table.if_not_exists();
    transaction_table.if_not_exists();
    expense_table.if_not_exists();

    db.execute(builder.build(&wallet_table)).await?;
    db.execute(builder.build(&transaction_table)).await?;
    db.execute(builder.build(&expense_table)).await?;

    let expense_index = Index::create()
        .if_not_exists()
        .name(EXPENSE_INDEX)
        .table(Expense)
        .col(ExpenseColumn::UserId)
        .col((ExpenseColumn::Date, IndexOrder::Desc))
        .to_owned();
    db.execute(builder.build(&expense_index)).await?;

    debug!("Ledger tables and indexes ensured.");
    Ok(())
}

/// Returns `true` when the composite expense index is present.
pub async fn expense_index_exists<C>(db: &C) -> Result<bool>
where
    C: ConnectionTrait,
{
    let backend = db.get_database_backend();
    let row = db
        .query_one(Statement::from_sql_and_values(
            backend,
            "SELECT name FROM sqlite_master WHERE type = 'index' AND name = ?",
            [EXPENSE_INDEX.into()],
        ))
        .await?;
    Ok(row.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{ExpenseModel, WalletModel, WalletTransactionModel};
    use sea_orm::{EntityTrait, QuerySelect};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _: Vec<WalletModel> = Wallet::find().limit(1).all(&db).await?;
        let _: Vec<WalletTransactionModel> = WalletTransaction::find().limit(1).all(&db).await?;
        let _: Vec<ExpenseModel> = Expense::find().limit(1).all(&db).await?;

        assert!(expense_index_exists(&db).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        assert!(expense_index_exists(&db).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_index_missing_on_fresh_database() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        assert!(!expense_index_exists(&db).await?);
        Ok(())
    }
}
