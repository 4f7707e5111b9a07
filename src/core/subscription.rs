//! Live queries.
//!
//! A [`Subscription`] turns the store's change feed into a lazy sequence of
//! snapshots: the first [`Subscription::next`] yields the current state, each
//! later call waits for a relevant change and yields a fresh snapshot.
//! Cancelling (from the subscription itself or from any cloned
//! [`SubscriptionHandle`]) ends delivery; the store is never touched by it.

use crate::{
    errors::Result,
    models::{Expense, UserId, WalletAccount},
    store::{DocumentStore, StoreChange},
};
use std::{future::Future, sync::Arc};
use tokio::sync::{
    broadcast::{self, error::RecvError, error::TryRecvError},
    watch,
};
use tracing::{debug, trace};

/// A query whose result can be watched.
pub trait SnapshotQuery: Send + Sync {
    /// What one delivery contains
    type Snapshot: Send;

    /// Whether `change` may alter the query result.
    fn is_affected_by(&self, change: &StoreChange) -> bool;

    /// Runs the query against the store.
    fn fetch(&self) -> impl Future<Output = Result<Self::Snapshot>> + Send;
}

/// Expenses of one owner, newest first.
#[derive(Debug)]
pub struct ExpenseQuery<S> {
    store: Arc<S>,
    owner: UserId,
}

impl<S> ExpenseQuery<S> {
    /// Expenses of `owner` in `store`.
    pub const fn new(store: Arc<S>, owner: UserId) -> Self {
        Self { store, owner }
    }
}

impl<S: DocumentStore> SnapshotQuery for ExpenseQuery<S> {
    type Snapshot = Vec<Expense>;

    fn is_affected_by(&self, change: &StoreChange) -> bool {
        matches!(change, StoreChange::ExpensesChanged(owner) if *owner == self.owner)
    }

    async fn fetch(&self) -> Result<Vec<Expense>> {
        self.store.query_expenses(&self.owner).await
    }
}

/// The wallet account of one owner.
#[derive(Debug)]
pub struct WalletQuery<S> {
    store: Arc<S>,
    owner: UserId,
}

impl<S> WalletQuery<S> {
    /// Wallet of `owner` in `store`.
    pub const fn new(store: Arc<S>, owner: UserId) -> Self {
        Self { store, owner }
    }
}

impl<S: DocumentStore> SnapshotQuery for WalletQuery<S> {
    type Snapshot = WalletAccount;

    fn is_affected_by(&self, change: &StoreChange) -> bool {
        matches!(change, StoreChange::WalletChanged(owner) if *owner == self.owner)
    }

    async fn fetch(&self) -> Result<WalletAccount> {
        Ok(self.store.load_wallet(&self.owner).await?.value)
    }
}

/// Cancels a [`Subscription`] from anywhere, including another task.
#[derive(Clone, Debug)]
pub struct SubscriptionHandle {
    cancel: Arc<watch::Sender<bool>>,
}

impl SubscriptionHandle {
    /// Stops delivery. Idempotent.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Whether cancel has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }
}

/// A live, cancellable sequence of query snapshots.
pub struct Subscription<Q> {
    query: Q,
    changes: broadcast::Receiver<StoreChange>,
    handle: SubscriptionHandle,
    cancelled: watch::Receiver<bool>,
    primed: bool,
}

impl<Q: SnapshotQuery> Subscription<Q> {
    /// Starts watching `query`. Nothing is fetched until the first `next`.
    pub fn new(query: Q, changes: broadcast::Receiver<StoreChange>) -> Self {
        let (cancel, cancelled) = watch::channel(false);
        Self {
            query,
            changes,
            handle: SubscriptionHandle {
                cancel: Arc::new(cancel),
            },
            cancelled,
            primed: false,
        }
    }

    /// A handle that can cancel this subscription.
    #[must_use]
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    /// Stops delivery; every later `next` returns `None`.
    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Whether this subscription was cancelled, by itself or a handle.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Makes the next call deliver the current snapshot again, dropping
    /// queued notifications. Has no effect once cancelled.
    pub fn restart(&mut self) {
        if self.is_cancelled() {
            return;
        }
        self.changes = self.changes.resubscribe();
        self.primed = false;
    }

    /// Waits for the next snapshot.
    ///
    /// Returns `None` once the subscription is cancelled or the store's feed
    /// has closed. A failing query is delivered as `Some(Err(_))` and the
    /// subscription stays usable.
    pub async fn next(&mut self) -> Option<Result<Q::Snapshot>> {
        if self.is_cancelled() {
            return None;
        }

        if self.primed {
            if !self.wait_for_change().await {
                return None;
            }
        } else {
            // The fetch below already reflects anything queued so far
            self.coalesce_pending();
            self.primed = true;
        }

        let snapshot = self.query.fetch().await;
        if self.is_cancelled() {
            return None;
        }
        Some(snapshot)
    }

    /// Blocks until a relevant change arrives; `false` means stop.
    async fn wait_for_change(&mut self) -> bool {
        loop {
            tokio::select! {
                biased;
                _ = self.cancelled.changed() => {
                    if *self.cancelled.borrow() {
                        return false;
                    }
                }
                received = self.changes.recv() => match received {
                    Ok(change) if self.query.is_affected_by(&change) => break,
                    Ok(change) => trace!(?change, "Ignoring unrelated change"),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Change feed lagged, refreshing snapshot");
                        break;
                    }
                    Err(RecvError::Closed) => return false,
                },
            }
        }
        self.coalesce_pending();
        true
    }

    /// One fresh fetch covers every notification already queued.
    fn coalesce_pending(&mut self) {
        loop {
            match self.changes.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => {}
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }
}
