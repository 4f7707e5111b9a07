/// Atomic expense creation paid from the wallet
pub mod coordinator;
/// Expense storage, listing and deletion
pub mod registry;
/// Wallet balance and transaction log
pub mod ledger;
/// Calendar grouping and spending totals
pub mod report;
/// Live, cancellable query snapshots
pub mod subscription;

pub use coordinator::ExpenseBalanceCoordinator;
pub use ledger::WalletLedger;
pub use registry::ExpenseRegistry;
pub use report::MonthSummary;
pub use subscription::{Subscription, SubscriptionHandle};
