//! Wallet ledger - owns a user's cash balance and deposit/withdrawal log.
//!
//! Every balance mutation (deposit, withdrawal, expense debit) goes through
//! the ledger's `apply` path: read the versioned wallet, plan the write against
//! that exact state, then commit it conditionally on the version that was
//! read. When another writer got there first the commit is rejected as a
//! conflict and the whole read-plan-commit cycle runs again after a short
//! backoff. A plain read-then-write would lose updates between sessions of
//! the same user and is never used.

use crate::{
    config::LedgerSettings,
    core::subscription::{Subscription, WalletQuery},
    errors::{Error, Result},
    models::{Principal, Transaction, TransactionKind, UserId, WalletAccount},
    money::Money,
    store::{Committed, DocumentStore, WalletCommit, WriteOutcome},
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Balance-keeping service for user wallets.
#[derive(Debug)]
pub struct WalletLedger<S> {
    store: Arc<S>,
    settings: LedgerSettings,
}

impl<S> Clone for WalletLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            settings: self.settings.clone(),
        }
    }
}

/// The state a ledger mutation was planned against, and what it committed.
#[derive(Debug)]
pub(crate) struct Applied {
    /// Account as committed
    pub account: WalletAccount,
    /// Version and stored expense reported by the store
    pub committed: Committed,
}

impl<S: DocumentStore> WalletLedger<S> {
    /// Creates a ledger over `store`.
    ///
    /// A `max_write_attempts` of zero is raised to one so every mutation
    /// reaches the store at least once.
    pub fn new(store: Arc<S>, mut settings: LedgerSettings) -> Self {
        if settings.max_write_attempts == 0 {
            warn!("max_write_attempts is 0, using 1");
            settings.max_write_attempts = 1;
        }
        Self { store, settings }
    }

    /// Active retry and description settings.
    #[must_use]
    pub const fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    /// Current wallet of the caller; a never-used wallet is empty. Read-only.
    pub async fn get_account(&self, principal: &Principal) -> Result<WalletAccount> {
        Ok(self.store.load_wallet(principal.user_id()).await?.value)
    }

    /// Adds funds and records a `deposit` transaction.
    ///
    /// A missing or blank description falls back to the configured default.
    #[instrument(skip(self, principal), fields(user = %principal.user_id()))]
    pub async fn deposit(
        &self,
        principal: &Principal,
        amount: Money,
        description: Option<&str>,
    ) -> Result<WalletAccount> {
        require_positive(amount)?;
        let description = self.describe(TransactionKind::Deposit, description);

        let applied = self
            .apply(principal.user_id(), |account| {
                let balance = account
                    .balance
                    .checked_add(amount)
                    .ok_or_else(|| Error::invalid_input("deposit would overflow the balance"))?;
                Ok(WalletCommit {
                    balance,
                    ledger_entry: Some(Transaction::record(
                        TransactionKind::Deposit,
                        amount,
                        description.clone(),
                    )),
                    expense: None,
                })
            })
            .await?;

        info!(%amount, "Deposit recorded");
        Ok(applied.account)
    }

    /// Takes funds out and records a `withdrawal` transaction.
    ///
    /// Fails with `InsufficientFunds` (and writes nothing) when the amount
    /// exceeds the balance.
    #[instrument(skip(self, principal), fields(user = %principal.user_id()))]
    pub async fn withdraw(
        &self,
        principal: &Principal,
        amount: Money,
        description: Option<&str>,
    ) -> Result<WalletAccount> {
        require_positive(amount)?;
        let description = self.describe(TransactionKind::Withdrawal, description);

        let applied = self
            .apply(principal.user_id(), |account| {
                Ok(WalletCommit {
                    balance: remaining_after(account, amount)?,
                    ledger_entry: Some(Transaction::record(
                        TransactionKind::Withdrawal,
                        amount,
                        description.clone(),
                    )),
                    expense: None,
                })
            })
            .await?;

        info!(%amount, "Withdrawal recorded");
        Ok(applied.account)
    }

    /// Reduces the balance without a log entry.
    ///
    /// Expense creation debits through [`ExpenseBalanceCoordinator`], which
    /// stores the expense in the same commit; this standalone form exists for
    /// spends recorded elsewhere. Same sufficiency rule as `withdraw`.
    ///
    /// [`ExpenseBalanceCoordinator`]: crate::core::ExpenseBalanceCoordinator
    #[instrument(skip(self, principal), fields(user = %principal.user_id()))]
    pub async fn debit(&self, principal: &Principal, amount: Money) -> Result<WalletAccount> {
        require_positive(amount)?;

        let applied = self
            .apply(principal.user_id(), |account| {
                Ok(WalletCommit {
                    balance: remaining_after(account, amount)?,
                    ledger_entry: None,
                    expense: None,
                })
            })
            .await?;

        info!(%amount, "Debit applied");
        Ok(applied.account)
    }

    /// Live wallet snapshots for the caller.
    pub fn subscribe(&self, principal: &Principal) -> Subscription<WalletQuery<S>> {
        Subscription::new(
            WalletQuery::new(Arc::clone(&self.store), principal.user_id().clone()),
            self.store.changes(),
        )
    }

    /// The single atomic update path for a wallet.
    ///
    /// `plan` sees the freshly read account and either describes the write or
    /// rejects it; a rejection returns immediately without writing. The
    /// returned account is the planned state that was committed.
    pub(crate) async fn apply<F>(&self, owner: &UserId, mut plan: F) -> Result<Applied>
    where
        F: FnMut(&WalletAccount) -> Result<WalletCommit> + Send,
    {
        let attempts = self.settings.max_write_attempts;
        for attempt in 1..=attempts {
            let current = self.store.load_wallet(owner).await?;
            let commit = plan(&current.value)?;
            let planned = planned_account(current.value, &commit);

            match self.store.commit_if(owner, current.version, commit).await? {
                WriteOutcome::Committed(committed) => {
                    return Ok(Applied {
                        account: planned,
                        committed,
                    });
                }
                WriteOutcome::Conflict => {
                    debug!(%owner, attempt, "Wallet changed concurrently, retrying");
                    if attempt < attempts {
                        let entropy = Uuid::now_v7().as_u64_pair().1;
                        tokio::time::sleep(self.settings.backoff(attempt, entropy)).await;
                    }
                }
            }
        }

        warn!(%owner, attempts, "Wallet stayed contended, giving up");
        Err(Error::StoreUnavailable {
            message: format!("wallet of {owner} kept changing during {attempts} write attempts"),
        })
    }

    fn describe(&self, kind: TransactionKind, description: Option<&str>) -> String {
        match description.map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => match kind {
                TransactionKind::Deposit => self.settings.deposit_description.clone(),
                TransactionKind::Withdrawal => self.settings.withdrawal_description.clone(),
            },
        }
    }
}

fn require_positive(amount: Money) -> Result<()> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(Error::invalid_input(format!(
            "amount must be positive, got {amount}"
        )))
    }
}

/// Balance left after taking `amount`, or `InsufficientFunds`.
pub(crate) fn remaining_after(account: &WalletAccount, amount: Money) -> Result<Money> {
    if amount > account.balance {
        return Err(Error::InsufficientFunds {
            available: account.balance,
            requested: amount,
        });
    }
    Ok(account.balance - amount)
}

fn planned_account(mut account: WalletAccount, commit: &WalletCommit) -> WalletAccount {
    account.balance = commit.balance;
    if let Some(entry) = &commit.ledger_entry {
        account.transactions.insert(0, entry.clone());
    }
    account
}
