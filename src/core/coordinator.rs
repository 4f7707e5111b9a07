//! Expense creation paid from the wallet.
//!
//! This module provides the only operation that touches two records at once:
//! recording an expense and debiting the owner's wallet by the same amount.
//! Both writes travel in one conditional commit keyed on the wallet version
//! that the sufficiency check was made against, so a concurrent spend from
//! another session either sees the debit or forces a retry. An expense
//! without its debit, or a debit without its expense, cannot be observed.

use crate::{
    config::LedgerSettings,
    core::{ledger::WalletLedger, ledger::remaining_after, registry::ExpenseRegistry},
    errors::{Error, Result},
    models::{Category, Expense, ExpenseDraft, ExpenseId, Principal},
    money::Money,
    store::{DocumentStore, WalletCommit},
};
use std::sync::Arc;
use tracing::{info, instrument};

/// Keeps expenses and wallet balances consistent with each other.
#[derive(Debug)]
pub struct ExpenseBalanceCoordinator<S> {
    ledger: WalletLedger<S>,
    registry: ExpenseRegistry<S>,
}

impl<S> Clone for ExpenseBalanceCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl<S: DocumentStore> ExpenseBalanceCoordinator<S> {
    /// Builds the ledger and the registry over one shared store.
    pub fn new(store: Arc<S>, settings: LedgerSettings) -> Self {
        Self {
            ledger: WalletLedger::new(Arc::clone(&store), settings),
            registry: ExpenseRegistry::new(store),
        }
    }

    /// The wallet side, for deposits, withdrawals and balance views.
    #[must_use]
    pub const fn ledger(&self) -> &WalletLedger<S> {
        &self.ledger
    }

    /// The expense side, for listing and deleting.
    #[must_use]
    pub const fn registry(&self) -> &ExpenseRegistry<S> {
        &self.registry
    }

    /// Records an expense and debits the wallet by its amount, atomically.
    ///
    /// # Errors
    /// - `InvalidInput` for a blank description or a non-positive amount
    /// - `InsufficientFunds` when the wallet cannot cover the amount; nothing
    ///   is written
    /// - `StoreUnavailable` when the store is down or the wallet stayed
    ///   contended for every attempt
    #[instrument(skip(self, principal), fields(user = %principal.user_id()))]
    pub async fn create_expense(
        &self,
        principal: &Principal,
        description: &str,
        amount: Money,
        category: Category,
    ) -> Result<Expense> {
        let draft = ExpenseDraft::new(principal, description, amount, category)?;

        let applied = self
            .ledger
            .apply(principal.user_id(), |account| {
                Ok(WalletCommit {
                    balance: remaining_after(account, draft.amount)?,
                    ledger_entry: None,
                    expense: Some(draft.clone()),
                })
            })
            .await?;

        let expense = applied.committed.expense.ok_or_else(|| {
            Error::Database("store committed the debit without returning the expense".to_string())
        })?;
        info!(
            id = %expense.id,
            %amount,
            balance = %applied.account.balance,
            "Expense recorded"
        );
        Ok(expense)
    }

    /// Deletes one of the caller's expenses.
    ///
    /// The wallet is not refunded: an expense is a one-way spend.
    pub async fn delete_expense(&self, principal: &Principal, id: ExpenseId) -> Result<()> {
        self.registry.remove(principal, id).await
    }
}
