//! Entity module - SeaORM entity definitions for the ledger tables.
//! Each entity has a Model struct for data and an Entity struct for operations;
//! the store converts them into the domain records in [`crate::models`].

/// Expense records
pub mod expense;
/// One wallet row per user
pub mod wallet;
/// Deposit and withdrawal log
pub mod wallet_transaction;

// Re-export specific types to avoid conflicts
pub use expense::{Column as ExpenseColumn, Entity as Expense, Model as ExpenseModel};
pub use wallet::{Column as WalletColumn, Entity as Wallet, Model as WalletModel};
pub use wallet_transaction::{
    Column as WalletTransactionColumn, Entity as WalletTransaction,
    Model as WalletTransactionModel,
};
