//! In-process document store.
//!
//! Holds every document behind one async mutex, so each call is atomic. It can
//! also pretend to be a badly provisioned or unreachable backend, which lets
//! tests drive the error paths of the core.

use super::{
    CHANGE_FEED_CAPACITY, Committed, DocumentStore, StoreChange, Version, Versioned, WalletCommit,
    WriteOutcome, sort_newest_first,
};
use crate::{
    errors::{EXPENSE_INDEX_REMEDIATION, Error, Result},
    models::{Expense, ExpenseDraft, ExpenseId, Transaction, UserId, WalletAccount},
    money::Money,
};
use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};
use tokio::sync::{Mutex, broadcast};
use tracing::trace;
use uuid::Uuid;

#[derive(Debug, Default)]
struct WalletDoc {
    balance: Money,
    version: Version,
    transactions: Vec<Transaction>,
}

#[derive(Debug, Default)]
struct State {
    wallets: HashMap<UserId, WalletDoc>,
    expenses: HashMap<ExpenseId, Expense>,
}

/// Document store kept entirely in memory.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
    changes: broadcast::Sender<StoreChange>,
    expense_index: bool,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// An empty store with the expense index provisioned.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            state: Mutex::new(State::default()),
            changes,
            expense_index: true,
            available: AtomicBool::new(true),
        }
    }

    /// A store whose ordered expense query has no backing index, so listing
    /// expenses fails with a query configuration error.
    #[must_use]
    pub fn without_expense_index() -> Self {
        Self {
            expense_index: false,
            ..Self::new()
        }
    }

    /// Simulates the backend going away (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::StoreUnavailable {
                message: "in-memory store is offline".to_string(),
            })
        }
    }

    fn publish(&self, change: StoreChange) {
        // No subscribers is fine
        let _ = self.changes.send(change);
    }
}

impl DocumentStore for MemoryStore {
    async fn load_wallet(&self, owner: &UserId) -> Result<Versioned<WalletAccount>> {
        self.ensure_available()?;
        let state = self.state.lock().await;
        Ok(state.wallets.get(owner).map_or_else(
            || Versioned {
                value: WalletAccount::empty(owner.clone()),
                version: None,
            },
            |doc| Versioned {
                value: WalletAccount {
                    owner: owner.clone(),
                    balance: doc.balance,
                    transactions: doc.transactions.clone(),
                },
                version: Some(doc.version),
            },
        ))
    }

    async fn commit_if(
        &self,
        owner: &UserId,
        expected: Option<Version>,
        commit: WalletCommit,
    ) -> Result<WriteOutcome> {
        self.ensure_available()?;
        let mut state = self.state.lock().await;

        let current = state.wallets.get(owner).map(|doc| doc.version);
        if current != expected {
            trace!(%owner, ?expected, ?current, "Wallet version mismatch");
            return Ok(WriteOutcome::Conflict);
        }

        let doc = state.wallets.entry(owner.clone()).or_default();
        doc.balance = commit.balance;
        doc.version += 1;
        if let Some(entry) = commit.ledger_entry {
            doc.transactions.insert(0, entry);
        }
        let version = doc.version;

        let expense = commit
            .expense
            .map(|draft| draft.into_expense(Uuid::now_v7()));
        if let Some(expense) = &expense {
            state.expenses.insert(expense.id, expense.clone());
        }
        drop(state);

        self.publish(StoreChange::WalletChanged(owner.clone()));
        if expense.is_some() {
            self.publish(StoreChange::ExpensesChanged(owner.clone()));
        }
        Ok(WriteOutcome::Committed(Committed { version, expense }))
    }

    async fn insert_expense(&self, draft: ExpenseDraft) -> Result<Expense> {
        self.ensure_available()?;
        let expense = draft.into_expense(Uuid::now_v7());
        self.state
            .lock()
            .await
            .expenses
            .insert(expense.id, expense.clone());
        self.publish(StoreChange::ExpensesChanged(expense.user_id.clone()));
        Ok(expense)
    }

    async fn delete_expense(&self, owner: &UserId, id: ExpenseId) -> Result<()> {
        self.ensure_available()?;
        let mut state = self.state.lock().await;
        match state.expenses.get(&id) {
            Some(expense) if &expense.user_id == owner => {
                state.expenses.remove(&id);
            }
            _ => {
                return Err(Error::NotFound {
                    entity: "expense",
                    id: id.to_string(),
                });
            }
        }
        drop(state);

        self.publish(StoreChange::ExpensesChanged(owner.clone()));
        Ok(())
    }

    async fn query_expenses(&self, owner: &UserId) -> Result<Vec<Expense>> {
        self.ensure_available()?;
        if !self.expense_index {
            return Err(Error::QueryConfiguration {
                message: "the ordered expense query requires a composite index".to_string(),
                remediation: EXPENSE_INDEX_REMEDIATION.to_string(),
            });
        }

        let mut expenses: Vec<Expense> = self
            .state
            .lock()
            .await
            .expenses
            .values()
            .filter(|expense| &expense.user_id == owner)
            .cloned()
            .collect();
        sort_newest_first(&mut expenses);
        Ok(expenses)
    }

    fn changes(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
