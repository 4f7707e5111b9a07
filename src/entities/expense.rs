//! Expense entity - Categorized spending records.
//!
//! Expenses reference their owner by `user_id` only; they are not linked to
//! wallet transactions.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Expense database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    /// Store-assigned identifier (UUID v7)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Owner of the expense
    pub user_id: String,
    /// What the money was spent on
    pub description: String,
    /// Positive amount in cents
    pub amount_cents: i64,
    /// Lowercase category name, e.g. `"food"`
    pub category: String,
    /// Creation timestamp
    pub date: DateTimeUtc,
}

/// Expenses have no foreign-key relationships
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
