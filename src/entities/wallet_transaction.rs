//! Wallet transaction entity - The deposit/withdrawal log of a wallet.
//!
//! Rows are append-only. Expense debits are not recorded here.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Wallet transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "wallet_transactions")]
pub struct Model {
    /// Time-ordered identifier (UUID v7)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Wallet owner
    pub user_id: String,
    /// Positive amount in cents
    pub amount_cents: i64,
    /// `"deposit"` or `"withdrawal"`
    pub kind: String,
    /// Free text, defaulted when the user left it blank
    pub description: String,
    /// When the transaction was recorded
    pub occurred_at: DateTimeUtc,
}

/// Each transaction belongs to one wallet
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::wallet::Entity",
        from = "Column::UserId",
        to = "super::wallet::Column::UserId"
    )]
    /// Wallet the entry belongs to
    Wallet,
}

impl Related<super::wallet::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wallet.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
