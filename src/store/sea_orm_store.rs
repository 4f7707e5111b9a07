//! `SQLite` document store built on `SeaORM`.
//!
//! Wallet documents live in `wallets` (one row per user, with a `version`
//! column), their logs in `wallet_transactions`, expenses in `expenses`.
//! A conditional commit is a database transaction that first runs
//! `UPDATE wallets ... WHERE user_id = ? AND version = ?` and only performs the
//! inserts when exactly one row matched. Nothing is read and then written
//! back outside that guarded update.

use super::{
    CHANGE_FEED_CAPACITY, Committed, DocumentStore, StoreChange, Version, Versioned, WalletCommit,
    WriteOutcome,
};
use crate::{
    config::database,
    entities::{expense, wallet, wallet_transaction},
    errors::{EXPENSE_INDEX_REMEDIATION, Error, Result},
    models::{Expense, ExpenseDraft, ExpenseId, Transaction, UserId, WalletAccount},
    money::Money,
};
use chrono::Utc;
use sea_orm::{
    DatabaseConnection, QueryOrder, Set, TransactionTrait,
    prelude::*,
    sea_query::{Expr, OnConflict},
};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Document store backed by a `SeaORM` connection.
#[derive(Debug)]
pub struct SeaOrmStore {
    db: DatabaseConnection,
    changes: broadcast::Sender<StoreChange>,
}

impl SeaOrmStore {
    /// Wraps an existing connection. The schema is expected to exist; see
    /// [`SeaOrmStore::connect`] for a provisioning constructor.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { db, changes }
    }

    /// Connects to `database_url` and creates any missing tables and indexes.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let db = database::create_connection(database_url).await?;
        database::create_tables(&db).await?;
        Ok(Self::new(db))
    }

    /// The underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    fn publish(&self, change: StoreChange) {
        // No subscribers is fine
        let _ = self.changes.send(change);
    }

    /// Refuses to run the ordered expense query without its index.
    ///
    /// Checked on every listing: `SQLite` would otherwise answer the query
    /// with a full scan after the index is dropped.
    async fn ensure_expense_index(&self) -> Result<()> {
        if database::expense_index_exists(&self.db).await? {
            return Ok(());
        }
        Err(Error::QueryConfiguration {
            message: format!("index {} is missing", database::EXPENSE_INDEX),
            remediation: EXPENSE_INDEX_REMEDIATION.to_string(),
        })
    }
}

fn to_transaction(model: wallet_transaction::Model) -> Result<Transaction> {
    Ok(Transaction {
        id: model.id,
        amount: Money::from_cents(model.amount_cents),
        kind: model.kind.parse()?,
        date: model.occurred_at,
        description: model.description,
    })
}

fn to_expense(model: expense::Model) -> Result<Expense> {
    let category = model
        .category
        .parse()
        .map_err(|_| Error::Database(format!("expense {} has unknown category {}", model.id, model.category)))?;
    Ok(Expense {
        id: model.id,
        user_id: UserId::new(model.user_id),
        description: model.description,
        amount: Money::from_cents(model.amount_cents),
        category,
        date: model.date,
    })
}

fn expense_row(draft: ExpenseDraft, id: ExpenseId) -> expense::ActiveModel {
    expense::ActiveModel {
        id: Set(id),
        user_id: Set(draft.user_id.as_str().to_string()),
        description: Set(draft.description),
        amount_cents: Set(draft.amount.cents()),
        category: Set(draft.category.as_str().to_string()),
        date: Set(draft.date),
    }
}

impl DocumentStore for SeaOrmStore {
    async fn load_wallet(&self, owner: &UserId) -> Result<Versioned<WalletAccount>> {
        // Read balance and log in one transaction so they describe the same version
        let txn = self.db.begin().await?;

        let Some(row) = wallet::Entity::find_by_id(owner.as_str().to_string())
            .one(&txn)
            .await?
        else {
            txn.commit().await?;
            return Ok(Versioned {
                value: WalletAccount::empty(owner.clone()),
                version: None,
            });
        };

        let transactions = wallet_transaction::Entity::find()
            .filter(wallet_transaction::Column::UserId.eq(owner.as_str()))
            .order_by_desc(wallet_transaction::Column::OccurredAt)
            .order_by_desc(wallet_transaction::Column::Id)
            .all(&txn)
            .await?
            .into_iter()
            .map(to_transaction)
            .collect::<Result<Vec<_>>>()?;
        txn.commit().await?;

        Ok(Versioned {
            value: WalletAccount {
                owner: owner.clone(),
                balance: Money::from_cents(row.balance_cents),
                transactions,
            },
            version: Some(row.version),
        })
    }

    #[instrument(skip(self, commit), fields(balance = %commit.balance))]
    async fn commit_if(
        &self,
        owner: &UserId,
        expected: Option<Version>,
        commit: WalletCommit,
    ) -> Result<WriteOutcome> {
        let txn = self.db.begin().await?;
        let now = Utc::now();

        let (applied, version) = match expected {
            None => {
                let row = wallet::ActiveModel {
                    user_id: Set(owner.as_str().to_string()),
                    balance_cents: Set(commit.balance.cents()),
                    version: Set(1),
                    updated_at: Set(now),
                };
                let inserted = wallet::Entity::insert(row)
                    .on_conflict(
                        OnConflict::column(wallet::Column::UserId)
                            .do_nothing()
                            .to_owned(),
                    )
                    .exec_without_returning(&txn)
                    .await?;
                (inserted == 1, 1)
            }
            Some(version) => {
                let updated = wallet::Entity::update_many()
                    .col_expr(wallet::Column::BalanceCents, Expr::value(commit.balance.cents()))
                    .col_expr(wallet::Column::Version, Expr::value(version + 1))
                    .col_expr(wallet::Column::UpdatedAt, Expr::value(now))
                    .filter(wallet::Column::UserId.eq(owner.as_str()))
                    .filter(wallet::Column::Version.eq(version))
                    .exec(&txn)
                    .await?;
                (updated.rows_affected == 1, version + 1)
            }
        };

        if !applied {
            txn.rollback().await?;
            debug!("Wallet version moved, conditional write rejected");
            return Ok(WriteOutcome::Conflict);
        }

        if let Some(entry) = commit.ledger_entry {
            wallet_transaction::ActiveModel {
                id: Set(entry.id),
                user_id: Set(owner.as_str().to_string()),
                amount_cents: Set(entry.amount.cents()),
                kind: Set(entry.kind.as_str().to_string()),
                description: Set(entry.description),
                occurred_at: Set(entry.date),
            }
            .insert(&txn)
            .await?;
        }

        let expense = match commit.expense {
            Some(draft) => Some(to_expense(
                expense_row(draft, Uuid::now_v7()).insert(&txn).await?,
            )?),
            None => None,
        };

        txn.commit().await?;
        info!(version, "Wallet commit applied");

        self.publish(StoreChange::WalletChanged(owner.clone()));
        if expense.is_some() {
            self.publish(StoreChange::ExpensesChanged(owner.clone()));
        }
        Ok(WriteOutcome::Committed(Committed { version, expense }))
    }

    async fn insert_expense(&self, draft: ExpenseDraft) -> Result<Expense> {
        let owner = draft.user_id.clone();
        let expense = to_expense(expense_row(draft, Uuid::now_v7()).insert(&self.db).await?)?;
        self.publish(StoreChange::ExpensesChanged(owner));
        Ok(expense)
    }

    async fn delete_expense(&self, owner: &UserId, id: ExpenseId) -> Result<()> {
        let deleted = expense::Entity::delete_many()
            .filter(expense::Column::Id.eq(id))
            .filter(expense::Column::UserId.eq(owner.as_str()))
            .exec(&self.db)
            .await?;
        if deleted.rows_affected == 0 {
            return Err(Error::NotFound {
                entity: "expense",
                id: id.to_string(),
            });
        }

        self.publish(StoreChange::ExpensesChanged(owner.clone()));
        Ok(())
    }

    async fn query_expenses(&self, owner: &UserId) -> Result<Vec<Expense>> {
        self.ensure_expense_index().await?;
        expense::Entity::find()
            .filter(expense::Column::UserId.eq(owner.as_str()))
            .order_by_desc(expense::Column::Date)
            .order_by_desc(expense::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(to_expense)
            .collect()
    }

    fn changes(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::models::{Category, Principal, TransactionKind};
    use crate::test_utils::*;
    use sea_orm::{ConnectionTrait, Database};

    fn lunch() -> ExpenseDraft {
        ExpenseDraft::new(
            &Principal::new("alice"),
            "Lunch",
            Money::from_cents(1250),
            Category::Food,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_wallet_created_then_versioned() -> Result<()> {
        let store = setup_sea_orm_store().await?;
        let alice = UserId::new("alice");

        let missing = store.load_wallet(&alice).await?;
        assert_eq!(missing.version, None);

        let deposit = Transaction::record(
            TransactionKind::Deposit,
            Money::from_cents(10_000),
            "Added funds".to_string(),
        );
        let outcome = store
            .commit_if(
                &alice,
                None,
                WalletCommit {
                    balance: Money::from_cents(10_000),
                    ledger_entry: Some(deposit.clone()),
                    expense: None,
                },
            )
            .await?;
        assert!(matches!(outcome, WriteOutcome::Committed(Committed { version: 1, .. })));

        let wallet = store.load_wallet(&alice).await?;
        assert_eq!(wallet.version, Some(1));
        assert_eq!(wallet.value.balance, Money::from_cents(10_000));
        assert_eq!(wallet.value.transactions, vec![deposit]);
        Ok(())
    }

    #[tokio::test]
    async fn test_conflicting_commit_writes_nothing() -> Result<()> {
        let store = setup_sea_orm_store().await?;
        let alice = UserId::new("alice");
        let opening = WalletCommit {
            balance: Money::from_cents(5_000),
            ledger_entry: None,
            expense: None,
        };
        store.commit_if(&alice, None, opening.clone()).await?;

        // A second "create" loses against the existing document
        assert_eq!(store.commit_if(&alice, None, opening).await?, WriteOutcome::Conflict);

        // A stale version neither debits nor inserts the expense
        let stale = WalletCommit {
            balance: Money::from_cents(3_750),
            ledger_entry: None,
            expense: Some(lunch()),
        };
        assert_eq!(
            store.commit_if(&alice, Some(7), stale.clone()).await?,
            WriteOutcome::Conflict
        );
        assert_eq!(store.load_wallet(&alice).await?.value.balance, Money::from_cents(5_000));
        assert!(store.query_expenses(&alice).await?.is_empty());

        // The current version goes through with both writes
        let outcome = store.commit_if(&alice, Some(1), stale).await?;
        let WriteOutcome::Committed(committed) = outcome else {
            panic!("expected commit");
        };
        assert_eq!(committed.version, 2);
        let expense = committed.expense.unwrap();
        assert_eq!(store.query_expenses(&alice).await?, vec![expense]);
        assert_eq!(store.load_wallet(&alice).await?.value.balance, Money::from_cents(3_750));
        Ok(())
    }

    #[tokio::test]
    async fn test_query_orders_newest_first_and_filters_owner() -> Result<()> {
        let store = setup_sea_orm_store().await?;
        let first = store.insert_expense(lunch()).await?;
        let second = store.insert_expense(lunch()).await?;
        let bob = ExpenseDraft::new(
            &Principal::new("bob"),
            "Bus",
            Money::from_cents(300),
            Category::Transport,
        )?;
        store.insert_expense(bob).await?;

        let listed = store.query_expenses(&UserId::new("alice")).await?;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_expense() -> Result<()> {
        let store = setup_sea_orm_store().await?;
        let alice = UserId::new("alice");
        let expense = store.insert_expense(lunch()).await?;

        let foreign = store.delete_expense(&UserId::new("bob"), expense.id).await;
        assert!(matches!(foreign, Err(Error::NotFound { .. })));

        store.delete_expense(&alice, expense.id).await?;
        assert!(store.query_expenses(&alice).await?.is_empty());

        let again = store.delete_expense(&alice, expense.id).await;
        assert!(matches!(again, Err(Error::NotFound { entity: "expense", .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_index_is_query_configuration_error() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        database::create_tables(&db).await?;
        db.execute_unprepared(&format!("DROP INDEX {}", database::EXPENSE_INDEX))
            .await?;
        let store = SeaOrmStore::new(db);

        let result = store.query_expenses(&UserId::new("alice")).await;
        let Err(Error::QueryConfiguration { remediation, .. }) = result else {
            panic!("expected a query configuration error, got {result:?}");
        };
        assert!(remediation.contains("user_id"));
        Ok(())
    }

    #[tokio::test]
    async fn test_index_dropped_after_listing_is_reported() -> Result<()> {
        let store = setup_sea_orm_store().await?;
        let alice = UserId::new("alice");
        assert!(store.query_expenses(&alice).await?.is_empty());

        store
            .connection()
            .execute_unprepared(&format!("DROP INDEX {}", database::EXPENSE_INDEX))
            .await?;
        let result = store.query_expenses(&alice).await;
        assert!(matches!(result, Err(Error::QueryConfiguration { .. })));

        database::create_tables(store.connection()).await?;
        assert!(store.query_expenses(&alice).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_tables_are_query_configuration_errors() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        let store = SeaOrmStore::new(db);

        let result = store.load_wallet(&UserId::new("alice")).await;
        assert!(matches!(result, Err(Error::QueryConfiguration { .. })));
        Ok(())
    }
}
