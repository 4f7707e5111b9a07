//! Expense registry - per-user expense records.
//!
//! The registry stores, lists and deletes expenses. It never looks at the
//! wallet: creating an expense that is paid from the wallet is the
//! coordinator's job.

use crate::{
    core::subscription::{ExpenseQuery, Subscription},
    errors::Result,
    models::{Expense, ExpenseDraft, ExpenseId, Principal},
    store::DocumentStore,
};
use std::sync::Arc;
use tracing::{info, instrument};

/// Storage and retrieval of expense records.
#[derive(Debug)]
pub struct ExpenseRegistry<S> {
    store: Arc<S>,
}

impl<S> Clone for ExpenseRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: DocumentStore> ExpenseRegistry<S> {
    /// Creates a registry over `store`.
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Live list of the caller's expenses, newest first.
    ///
    /// A missing index on the backing store is delivered as a
    /// `QueryConfiguration` error snapshot.
    pub fn list_for_user(&self, principal: &Principal) -> Subscription<ExpenseQuery<S>> {
        Subscription::new(
            ExpenseQuery::new(Arc::clone(&self.store), principal.user_id().clone()),
            self.store.changes(),
        )
    }

    /// One-shot read of the caller's expenses, newest first.
    pub async fn snapshot(&self, principal: &Principal) -> Result<Vec<Expense>> {
        self.store.query_expenses(principal.user_id()).await
    }

    /// Assigns an id and persists the draft. Does not debit any wallet.
    #[instrument(skip(self, draft), fields(user = %draft.user_id))]
    pub async fn insert(&self, draft: ExpenseDraft) -> Result<Expense> {
        let expense = self.store.insert_expense(draft).await?;
        info!(id = %expense.id, "Expense stored");
        Ok(expense)
    }

    /// Deletes one of the caller's expenses.
    ///
    /// Unknown ids and ids owned by someone else fail with `NotFound`.
    #[instrument(skip(self, principal), fields(user = %principal.user_id()))]
    pub async fn remove(&self, principal: &Principal, id: ExpenseId) -> Result<()> {
        self.store.delete_expense(principal.user_id(), id).await?;
        info!("Expense deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        errors::Error,
        models::Category,
        money::Money,
        store::{MemoryStore, SeaOrmStore},
        test_utils::*,
    };

    fn draft(principal: &Principal, description: &str) -> ExpenseDraft {
        ExpenseDraft::new(principal, description, Money::from_cents(450), Category::Transport)
            .unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_snapshot() -> Result<()> {
        let registry = ExpenseRegistry::new(Arc::new(MemoryStore::new()));
        let user = alice();

        let first = registry.insert(draft(&user, "Bus")).await?;
        let second = registry.insert(draft(&user, "Train")).await?;
        assert_ne!(first.id, second.id);

        let listed = registry.snapshot(&user).await?;
        assert_eq!(listed.len(), 2);
        assert!(listed[0].date >= listed[1].date);
        assert!(registry.snapshot(&bob()).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_removed_expense_disappears_from_live_list() -> Result<()> {
        let registry = ExpenseRegistry::new(Arc::new(setup_sea_orm_store().await?));
        let user = alice();
        let keep = registry.insert(draft(&user, "Bus")).await?;
        let gone = registry.insert(draft(&user, "Taxi")).await?;

        let mut live = registry.list_for_user(&user);
        assert_eq!(live.next().await.unwrap()?.len(), 2);

        registry.remove(&user, gone.id).await?;
        let after = live.next().await.unwrap()?;
        assert_eq!(after, vec![keep]);

        // Re-listing never brings it back
        live.restart();
        let relisted = live.next().await.unwrap()?;
        assert!(relisted.iter().all(|e| e.id != gone.id));
        assert!(registry.snapshot(&user).await?.iter().all(|e| e.id != gone.id));
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_unknown_or_foreign_is_not_found() -> Result<()> {
        let registry = ExpenseRegistry::new(Arc::new(MemoryStore::new()));
        let expense = registry.insert(draft(&alice(), "Bus")).await?;

        let foreign = registry.remove(&bob(), expense.id).await;
        assert!(matches!(foreign, Err(Error::NotFound { .. })));

        let unknown = registry.remove(&alice(), uuid::Uuid::now_v7()).await;
        assert!(matches!(unknown, Err(Error::NotFound { .. })));

        assert_eq!(registry.snapshot(&alice()).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_unprovisioned_index_is_distinguishable() -> Result<()> {
        let registry = ExpenseRegistry::new(Arc::new(MemoryStore::without_expense_index()));
        let result = registry.snapshot(&alice()).await;
        let Err(err) = result else {
            panic!("listing should fail without the index");
        };
        assert!(matches!(err, Error::QueryConfiguration { .. }));
        assert!(!err.is_transient());
        Ok(())
    }

    #[tokio::test]
    async fn test_registry_on_unprovisioned_sqlite() -> Result<()> {
        let db = sea_orm::Database::connect("sqlite::memory:").await?;
        let registry = ExpenseRegistry::new(Arc::new(SeaOrmStore::new(db)));

        let mut live = registry.list_for_user(&alice());
        let first = live.next().await.unwrap();
        assert!(matches!(first, Err(Error::QueryConfiguration { .. })));
        Ok(())
    }
}
