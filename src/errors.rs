//! Unified error type for the ledger core.
//!
//! Every operation surfaces its failure to the caller. The variants separate
//! caller mistakes ([`Error::InvalidInput`]), business-rule rejections
//! ([`Error::InsufficientFunds`]), operator problems
//! ([`Error::QueryConfiguration`]) and transient infrastructure failures
//! ([`Error::StoreUnavailable`]) so the view layer can react to each one
//! differently.

use crate::money::Money;
use sea_orm::DbErr;
use thiserror::Error;

/// Remediation shown when the relational schema has not been created.
pub const SCHEMA_REMEDIATION: &str = "Run `config::database::create_tables` against this \
database before serving requests; it creates the wallets, wallet_transactions and expenses \
tables together with the idx_expenses_user_date index.";

/// Remediation shown when the composite index behind the expense list is missing.
pub const EXPENSE_INDEX_REMEDIATION: &str = "Create the composite index on collection \
\"expenses\" with fields user_id (ascending) and date (descending), then reload. With the \
bundled SQLite store, `config::database::create_tables` provisions it as \
idx_expenses_user_date.";

/// `SQLite` messages for `SQLITE_BUSY` and `SQLITE_LOCKED`.
const SQLITE_CONTENTION: [&str; 3] = [
    "database is locked",
    "database is busy",
    "database table is locked",
];

/// Every failure the ledger core reports.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad amount or description; re-prompting the user fixes it
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// What was wrong with the input
        message: String,
    },

    /// The wallet cannot cover the amount; nothing was written
    #[error("Insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        /// Balance at the time of the check
        available: Money,
        /// Amount the caller asked for
        requested: Money,
    },

    /// The store is not provisioned for this query
    #[error("Query is not provisioned: {message}. {remediation}")]
    QueryConfiguration {
        /// What is missing
        message: String,
        /// Operator instructions for fixing it
        remediation: String,
    },

    /// No such record, or it belongs to someone else
    #[error("{entity} \"{id}\" not found")]
    NotFound {
        /// Kind of record, e.g. `"expense"`
        entity: &'static str,
        /// Id that was looked up
        id: String,
    },

    /// Transient infrastructure failure; safe to retry later
    #[error("Store unavailable: {message}")]
    StoreUnavailable {
        /// Driver or retry-loop detail
        message: String,
    },

    /// Any other database failure
    #[error("Database error: {0}")]
    Database(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {message}")]
    Config {
        /// What was wrong with the configuration
        message: String,
    },
}

impl Error {
    /// Shorthand for [`Error::InvalidInput`].
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Returns `true` when retrying the same call later may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }
}

impl From<DbErr> for Error {
    fn from(err: DbErr) -> Self {
        match err {
            DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => Self::StoreUnavailable {
                message: err.to_string(),
            },
            other => {
                let message = other.to_string();
                if message.contains("no such table") || message.contains("no such column") {
                    Self::QueryConfiguration {
                        message,
                        remediation: SCHEMA_REMEDIATION.to_string(),
                    }
                } else if SQLITE_CONTENTION.iter().any(|text| message.contains(text)) {
                    Self::StoreUnavailable { message }
                } else {
                    Self::Database(message)
                }
            }
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
