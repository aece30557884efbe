//! Accounting (C8): netted positions with weighted-average entry price,
//! realized PnL on closes/flips, mark-to-market snapshots, and the daily
//! equity baseline the risk gate reads. Pure logic in [`ledger`] and
//! [`snapshot`]; persistence in [`store`].

pub mod ledger;
pub mod snapshot;
pub mod store;

pub use ledger::{apply_fill, notional, unrealized_pnl};
pub use snapshot::{advance_daily_baseline, mark_to_market};
pub use store::AccountingStore;
