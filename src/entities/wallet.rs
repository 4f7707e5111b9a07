//! Wallet entity - One row per user holding the current cash balance.
//!
//! `version` is the optimistic-concurrency token: every committed mutation
//! bumps it, and writers only update the row when it still holds the version
//! they read.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Wallet database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "wallets")]
pub struct Model {
    /// Owner key from the authentication provider
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    /// Current balance in cents
    pub balance_cents: i64,
    /// Incremented on every committed write
    pub version: i64,
    /// When the wallet was last written
    pub updated_at: DateTimeUtc,
}

/// A wallet owns its deposit/withdrawal log
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Log entries of this wallet
    #[sea_orm(has_many = "super::wallet_transaction::Entity")]
    Transactions,
}

impl Related<super::wallet_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
