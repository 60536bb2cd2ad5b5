use std::sync::Arc;

use tracing::debug;

use crate::{
    ledger::{
        entities::{ActivityDraft, ActivityId, DayLedger, IdSource, UserId},
        summary::DaySummary,
        validate::{self, ValidationError},
    },
    store::{LedgerStore, LedgerSubscription, StoreError},
    utils::{clock::Clock, time::DayKey},
};

/// Errors surfaced from a controller operation. All of them are recovered
/// at the operation boundary: the view keeps showing the last confirmed
/// snapshot and the user re-triggers the action if they want to.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no live subscription for the active day")]
    NotLive,
}

enum SyncState {
    Unsubscribed,
    Subscribing,
    Live {
        view: DayLedger,
        subscription: LedgerSubscription,
    },
}

/// Live sync state machine for one `(user, day)` pair. Both are fixed at
/// construction; switching either means deactivating this controller and
/// creating a fresh one, so no ambient session state survives a transition.
///
/// The view is never mutated optimistically. A mutation goes through
/// validation and a full-document `replace`, and the displayed state only
/// changes when the store's own snapshot comes back through the
/// subscription, so the view always equals the last value the store
/// accepted.
pub struct DayController<S: LedgerStore> {
    store: Arc<S>,
    user: UserId,
    day: DayKey,
    clock: Arc<dyn Clock>,
    ids: IdSource,
    state: SyncState,
}

impl<S: LedgerStore> DayController<S> {
    pub fn new(store: Arc<S>, user: UserId, day: DayKey, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            user,
            day,
            clock,
            ids: IdSource::new(),
            state: SyncState::Unsubscribed,
        }
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn day(&self) -> DayKey {
        self.day
    }

    pub fn is_live(&self) -> bool {
        matches!(self.state, SyncState::Live { .. })
    }

    /// Last confirmed snapshot, present while the controller is live.
    pub fn ledger(&self) -> Option<&DayLedger> {
        match &self.state {
            SyncState::Live { view, .. } => Some(view),
            _ => None,
        }
    }

    pub fn summary(&self) -> Option<DaySummary> {
        self.ledger().map(|ledger| DaySummary::of(&ledger.activities))
    }

    /// Subscribes to the day's resource and waits for the initial
    /// snapshot. On success the controller is live with that snapshot as
    /// its view.
    pub async fn activate(&mut self) -> Result<(), SyncError> {
        self.state = SyncState::Subscribing;

        let mut subscription = match self.store.read_and_subscribe(&self.user, self.day).await {
            Ok(subscription) => subscription,
            Err(e) => {
                self.state = SyncState::Unsubscribed;
                return Err(e.into());
            }
        };

        let Some(view) = subscription.next_snapshot().await else {
            self.state = SyncState::Unsubscribed;
            return Err(SyncError::Store(StoreError::Unavailable(
                "subscription closed before the initial snapshot".into(),
            )));
        };

        debug!(
            "Live for {}/{} with {} activities",
            self.user,
            self.day,
            view.activities.len()
        );
        self.state = SyncState::Live { view, subscription };
        Ok(())
    }

    /// Waits for the next authoritative snapshot and replaces the view
    /// wholesale. The snapshot is the sole source of truth; nothing is
    /// merged with pending local edits.
    pub async fn next_snapshot(&mut self) -> Result<DayLedger, SyncError> {
        let SyncState::Live { view, subscription } = &mut self.state else {
            return Err(SyncError::NotLive);
        };

        let Some(next) = subscription.next_snapshot().await else {
            self.state = SyncState::Unsubscribed;
            return Err(SyncError::Store(StoreError::Unavailable(
                "subscription closed".into(),
            )));
        };

        *view = next.clone();
        Ok(next)
    }

    /// Validates and appends the draft, then issues the full-document
    /// replace. The local view is left untouched; the add only becomes
    /// visible when its snapshot arrives back.
    pub async fn add_activity(&mut self, draft: ActivityDraft) -> Result<(), SyncError> {
        let SyncState::Live { view, .. } = &self.state else {
            return Err(SyncError::NotLive);
        };

        let id = self.ids.mint(self.clock.time());
        let activities = validate::admit(&view.activities, draft, id)?;
        let ledger = DayLedger::from_activities(activities);
        self.store.replace(&self.user, self.day, ledger).await?;
        Ok(())
    }

    /// Filters the activity out and issues the replace. An unknown id
    /// still results in a content-identical full write, matching the
    /// replace-only protocol; there is nothing to report in that case.
    pub async fn delete_activity(&mut self, id: &ActivityId) -> Result<(), SyncError> {
        let SyncState::Live { view, .. } = &self.state else {
            return Err(SyncError::NotLive);
        };

        let activities = validate::remove(&view.activities, id);
        let ledger = DayLedger::from_activities(activities);
        self.store.replace(&self.user, self.day, ledger).await?;
        Ok(())
    }

    /// Cancels the subscription and drops the view. Called when the
    /// observed day or the signed-in identity changes; a write already in
    /// flight is deliberately not cancelled.
    pub fn deactivate(&mut self) {
        self.state = SyncState::Unsubscribed;
    }
}
