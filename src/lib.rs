//! Per-day time ledger core for a daily time tracker: the document model
//! and its 1440-minute capacity invariant, the read/write/subscribe
//! protocol against a shared per-day document store, and the live sync
//! session that keeps a client's view equal to the last state the store
//! confirmed.
//!

pub mod ledger;
pub mod store;
pub mod sync;
pub mod utils;
