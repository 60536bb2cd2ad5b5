//!  Read/write/subscribe protocol against the per-`(user, day)` document
//!  resource at the logical path `users/{userId}/days/{dayKey}`.
//!  [LedgerStore] keeps the core independent of the actual backend;
//!  [local::LocalLedgerStore] is the file-backed realization.

pub mod local;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;

use crate::ledger::entities::{DayLedger, UserId};
use crate::utils::time::DayKey;

/// Failures crossing the store boundary. Both are recoverable at the
/// operation that hit them: the caller surfaces a message and the user
/// re-triggers the action, nothing is retried automatically.
#[derive(Debug, thiserror::Error, Clone)]
pub enum StoreError {
    #[error("write rejected for {user}/{day}")]
    WriteRejected { user: UserId, day: DayKey },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// A live, unbounded sequence of ledger snapshots for one `(user, day)`
/// resource. The first snapshot arrives immediately; later ones arrive
/// whenever any writer replaces the document, this client included.
/// Dropping the subscription cancels it; resubscribing starts over with a
/// fresh initial snapshot.
pub struct LedgerSubscription {
    snapshots: WatchStream<DayLedger>,
}

impl LedgerSubscription {
    pub(crate) fn new(receiver: watch::Receiver<DayLedger>) -> Self {
        Self {
            snapshots: WatchStream::new(receiver),
        }
    }

    /// Waits for the next snapshot. `None` means the backend dropped the
    /// resource channel and no further snapshots will ever arrive.
    pub async fn next_snapshot(&mut self) -> Option<DayLedger> {
        self.snapshots.next().await
    }
}

/// Contract every ledger backend must implement. Whole documents only:
/// there is deliberately no field-level patch, which keeps the derived
/// total trivially consistent and makes reconciliation last-write-wins at
/// document granularity.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    /// Produces the current state of the resource (an empty ledger when no
    /// document exists yet) followed by every subsequent persisted change.
    async fn read_and_subscribe(
        &self,
        user: &UserId,
        day: DayKey,
    ) -> Result<LedgerSubscription, StoreError>;

    /// Atomically overwrites the entire resource with `ledger` and stamps
    /// the store-assigned write timestamp. The store is capacity-agnostic
    /// and accepts whatever ledger it is given.
    async fn replace(
        &self,
        user: &UserId,
        day: DayKey,
        ledger: DayLedger,
    ) -> Result<(), StoreError>;
}
