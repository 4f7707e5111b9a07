//! Domain records shared by the ledger, the registry and the stores.
//!
//! These are storage-agnostic: the SeaORM entities in [`crate::entities`] are
//! converted into them at the store boundary.

use crate::{
    errors::{Error, Result},
    money::Money,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Store-assigned expense identifier.
pub type ExpenseId = Uuid;

/// Opaque owner key handed out by the authentication provider.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wraps an opaque id from the authentication provider.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The authenticated caller of a core operation.
///
/// Passed explicitly into every operation; the core never reads an ambient
/// "current user".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    user_id: UserId,
}

impl Principal {
    /// Context for the session of `user_id`.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: UserId::new(user_id),
        }
    }

    /// The caller's owner key.
    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.user_id
    }
}

/// Expense categories offered to the user.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Groceries and eating out
    Food,
    /// Fares, fuel and parking
    Transport,
    /// Rent and bills
    Utilities,
    /// Outings and subscriptions
    Entertainment,
    /// Clothes and goods
    Shopping,
    /// Medicine and care
    Health,
    /// Courses and books
    Education,
    #[default]
    /// Anything else
    Other,
}

impl Category {
    /// Every category, in display order.
    pub const ALL: [Self; 8] = [
        Self::Food,
        Self::Transport,
        Self::Utilities,
        Self::Entertainment,
        Self::Shopping,
        Self::Health,
        Self::Education,
        Self::Other,
    ];

    /// Lowercase name used in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Food => "food",
            Self::Transport => "transport",
            Self::Utilities => "utilities",
            Self::Entertainment => "entertainment",
            Self::Shopping => "shopping",
            Self::Health => "health",
            Self::Education => "education",
            Self::Other => "other",
        }
    }

    /// Capitalised name for display.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Food => "Food",
            Self::Transport => "Transport",
            Self::Utilities => "Utilities",
            Self::Entertainment => "Entertainment",
            Self::Shopping => "Shopping",
            Self::Health => "Health",
            Self::Education => "Education",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| Error::invalid_input(format!("unknown category \"{s}\"")))
    }
}

/// Direction of a user-initiated wallet transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money added to the wallet
    Deposit,
    /// Money taken out of the wallet
    Withdrawal,
}

impl TransactionKind {
    /// Lowercase name stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "deposit" => Ok(Self::Deposit),
            "withdrawal" => Ok(Self::Withdrawal),
            other => Err(Error::Database(format!(
                "unknown wallet transaction type \"{other}\""
            ))),
        }
    }
}

/// One entry of a wallet's deposit/withdrawal log. Immutable once recorded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Time-ordered unique id (UUID v7)
    pub id: Uuid,
    /// Always positive; the direction comes from `kind`
    pub amount: Money,
    /// Deposit or withdrawal
    pub kind: TransactionKind,
    /// When it was recorded
    pub date: DateTime<Utc>,
    /// Free text shown in the log
    pub description: String,
}

impl Transaction {
    /// Records a new entry stamped with the current time.
    #[must_use]
    pub fn record(kind: TransactionKind, amount: Money, description: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            amount,
            kind,
            date: Utc::now(),
            description,
        }
    }

    /// Effect of this entry on the wallet balance.
    #[must_use]
    pub fn signed_amount(&self) -> Money {
        match self.kind {
            TransactionKind::Deposit => self.amount,
            TransactionKind::Withdrawal => -self.amount,
        }
    }
}

/// A user's cash wallet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAccount {
    /// Wallet owner
    pub owner: UserId,
    /// Current balance
    pub balance: Money,
    /// Most recent first
    pub transactions: Vec<Transaction>,
}

impl WalletAccount {
    /// The implicit account of a user who never touched their wallet.
    #[must_use]
    pub const fn empty(owner: UserId) -> Self {
        Self {
            owner,
            balance: Money::ZERO,
            transactions: Vec::new(),
        }
    }
}

/// A categorized spending record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    /// Store-assigned id
    pub id: ExpenseId,
    /// Owner of the expense
    pub user_id: UserId,
    /// Trimmed, non-empty
    pub description: String,
    /// Always positive
    pub amount: Money,
    /// Spending category
    pub category: Category,
    /// When it was recorded
    pub date: DateTime<Utc>,
}

/// An expense that has not been persisted yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpenseDraft {
    /// Owner of the expense
    pub user_id: UserId,
    /// Trimmed, non-empty
    pub description: String,
    /// Always positive
    pub amount: Money,
    /// Spending category
    pub category: Category,
    /// Creation time
    pub date: DateTime<Utc>,
}

impl ExpenseDraft {
    /// Validates the input and stamps the draft with the current time.
    ///
    /// The description is trimmed; it must not be empty and the amount must be
    /// positive.
    pub fn new(
        principal: &Principal,
        description: &str,
        amount: Money,
        category: Category,
    ) -> Result<Self> {
        let description = description.trim();
        if description.is_empty() {
            return Err(Error::invalid_input("expense description cannot be empty"));
        }
        if !amount.is_positive() {
            return Err(Error::invalid_input(format!(
                "expense amount must be positive, got {amount}"
            )));
        }

        Ok(Self {
            user_id: principal.user_id().clone(),
            description: description.to_string(),
            amount,
            category,
            date: Utc::now(),
        })
    }

    /// Turns the draft into a stored record under the given id.
    #[must_use]
    pub fn into_expense(self, id: ExpenseId) -> Expense {
        Expense {
            id,
            user_id: self.user_id,
            description: self.description,
            amount: self.amount,
            category: self.category,
            date: self.date,
        }
    }
}
