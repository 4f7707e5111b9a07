//! Document store abstraction.
//!
//! The ledger core does not talk to a database directly. It needs a store
//! that offers keyed reads and deletes, an atomic *conditional* write on the
//! wallet document, an owner-filtered expense query ordered newest first, and
//! a change feed for live queries. [`DocumentStore`] captures exactly that.
//!
//! Two implementations ship with the crate: [`SeaOrmStore`] (`SQLite` through
//! `SeaORM`) and [`MemoryStore`] (in-process, used by tests and previews).

mod memory;
mod sea_orm_store;

pub use memory::MemoryStore;
pub use sea_orm_store::SeaOrmStore;

use crate::{
    errors::Result,
    models::{Expense, ExpenseDraft, ExpenseId, Transaction, UserId, WalletAccount},
    money::Money,
};
use std::future::Future;
use tokio::sync::broadcast;

/// Optimistic-concurrency token of a wallet document.
pub type Version = i64;

/// Capacity of the change feed before slow subscribers start lagging.
pub(crate) const CHANGE_FEED_CAPACITY: usize = 256;

/// A document together with the version it was read at.
///
/// `version` is `None` when the document does not exist yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Versioned<T> {
    /// The document
    pub value: T,
    /// Version it was read at, `None` when absent
    pub version: Option<Version>,
}

/// Everything written by one conditional commit on a wallet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletCommit {
    /// Balance the wallet holds after the commit
    pub balance: Money,
    /// Deposit or withdrawal appended to the wallet log
    pub ledger_entry: Option<Transaction>,
    /// Expense inserted in the same atomic write
    pub expense: Option<ExpenseDraft>,
}

/// Result of a successful conditional commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Committed {
    /// Version the wallet document holds now
    pub version: Version,
    /// The stored expense, when the commit carried one
    pub expense: Option<Expense>,
}

/// Outcome of a conditional write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The write landed
    Committed(Committed),
    /// The wallet changed since it was read; nothing was written
    Conflict,
}

/// Notification published after a successful write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreChange {
    /// Balance or transaction log of this owner changed
    WalletChanged(UserId),
    /// Expense list of this owner changed
    ExpensesChanged(UserId),
}

impl StoreChange {
    /// Owner whose data changed.
    #[must_use]
    pub const fn owner(&self) -> &UserId {
        match self {
            Self::WalletChanged(owner) | Self::ExpensesChanged(owner) => owner,
        }
    }
}

/// Capabilities the ledger core requires from its backing store.
pub trait DocumentStore: Send + Sync + 'static {
    /// Reads the wallet of `owner`; a missing wallet reads as the empty
    /// account with no version.
    fn load_wallet(
        &self,
        owner: &UserId,
    ) -> impl Future<Output = Result<Versioned<WalletAccount>>> + Send;

    /// Atomically applies `commit` if the wallet is still at `expected`.
    ///
    /// `expected = None` means "create the wallet; it must not exist yet".
    /// Either every part of the commit becomes visible or none does.
    fn commit_if(
        &self,
        owner: &UserId,
        expected: Option<Version>,
        commit: WalletCommit,
    ) -> impl Future<Output = Result<WriteOutcome>> + Send;

    /// Persists an expense without touching any wallet.
    fn insert_expense(&self, draft: ExpenseDraft) -> impl Future<Output = Result<Expense>> + Send;

    /// Deletes an expense of `owner`; fails with `NotFound` otherwise.
    fn delete_expense(
        &self,
        owner: &UserId,
        id: ExpenseId,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Expenses of `owner`, newest first.
    fn query_expenses(&self, owner: &UserId)
    -> impl Future<Output = Result<Vec<Expense>>> + Send;

    /// Subscribes to change notifications.
    fn changes(&self) -> broadcast::Receiver<StoreChange>;
}

/// Orders expenses newest first, breaking ties on the time-ordered id.
pub(crate) fn sort_newest_first(expenses: &mut [Expense]) {
    expenses.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));
}
