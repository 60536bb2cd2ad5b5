use std::sync::Arc;

use anyhow::Result;
use futures::future;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    ledger::{
        entities::{ActivityDraft, ActivityId, DayLedger, UserId},
        summary::DaySummary,
    },
    store::LedgerStore,
    utils::{clock::Clock, time::DayKey},
};

use super::controller::{DayController, SyncError};

/// UI intents accepted by a running session.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    SelectDay(DayKey),
    PreviousDay,
    NextDay,
    Today,
    AddActivity(ActivityDraft),
    DeleteActivity(ActivityId),
}

/// Everything a front end needs to render the active day: the last
/// confirmed ledger and the roll-up derived from it.
#[derive(Debug, Clone)]
pub struct DayView {
    pub user: UserId,
    pub day: DayKey,
    pub ledger: DayLedger,
    pub summary: DaySummary,
}

/// Outcomes the session reports back. `Rejected` carries the user-facing
/// message for a validation or store failure; the view it relates to is
/// unchanged and no retry happens on the session's own initiative.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    View(DayView),
    Rejected(String),
    SignedOut,
}

enum Wake {
    Shutdown,
    AuthChanged { collaborator_alive: bool },
    Command(Option<SessionCommand>),
    Snapshot(Result<DayLedger, SyncError>),
}

/// Owns the live-sync lifecycle for whichever `(user, day)` is active.
/// At most one controller exists at a time; it is dropped and rebuilt
/// whenever the signed-in identity or the selected day changes.
pub struct LedgerSession<S: LedgerStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    auth: watch::Receiver<Option<UserId>>,
    commands: mpsc::Receiver<SessionCommand>,
    events: mpsc::Sender<SessionEvent>,
    shutdown: CancellationToken,
    day: DayKey,
    controller: Option<DayController<S>>,
}

impl<S: LedgerStore> LedgerSession<S> {
    pub fn new(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        auth: watch::Receiver<Option<UserId>>,
        commands: mpsc::Receiver<SessionCommand>,
        events: mpsc::Sender<SessionEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        let day = DayKey::today(clock.as_ref());
        Self {
            store,
            clock,
            auth,
            commands,
            events,
            shutdown,
            day,
            controller: None,
        }
    }

    /// Executes the session event loop until cancellation, the auth
    /// collaborator going away, or the command channel closing.
    pub async fn run(mut self) -> Result<()> {
        self.apply_identity().await?;

        loop {
            let wake = tokio::select! {
                _ = self.shutdown.cancelled() => Wake::Shutdown,
                changed = self.auth.changed() => Wake::AuthChanged {
                    collaborator_alive: changed.is_ok(),
                },
                command = self.commands.recv() => Wake::Command(command),
                snapshot = Self::watch_snapshots(&mut self.controller) => {
                    Wake::Snapshot(snapshot)
                }
            };

            match wake {
                Wake::Shutdown => {
                    debug!("Session cancelled");
                    return Ok(());
                }
                Wake::AuthChanged {
                    collaborator_alive: false,
                } => {
                    debug!("Auth collaborator dropped, stopping session");
                    return Ok(());
                }
                Wake::AuthChanged { .. } => self.apply_identity().await?,
                Wake::Command(None) => return Ok(()),
                Wake::Command(Some(command)) => self.handle_command(command).await?,
                Wake::Snapshot(snapshot) => self.apply_snapshot(snapshot).await?,
            }
        }
    }

    /// Pends forever while no controller is live, so the event loop only
    /// wakes for real snapshots.
    async fn watch_snapshots(
        controller: &mut Option<DayController<S>>,
    ) -> Result<DayLedger, SyncError> {
        match controller {
            Some(active) if active.is_live() => active.next_snapshot().await,
            _ => future::pending().await,
        }
    }

    /// Reacts to the auth collaborator's current value: tears the active
    /// controller down and, when somebody is signed in, brings a fresh one
    /// up for the selected day.
    async fn apply_identity(&mut self) -> Result<()> {
        // Dropping the controller cancels its subscription.
        self.controller = None;

        let identity = self.auth.borrow_and_update().clone();
        match identity {
            Some(user) => {
                info!("Signed in as {user}, observing {}", self.day);
                self.activate_day(user).await
            }
            None => {
                info!("Signed out");
                self.events.send(SessionEvent::SignedOut).await?;
                Ok(())
            }
        }
    }

    async fn activate_day(&mut self, user: UserId) -> Result<()> {
        let mut controller = DayController::new(
            Arc::clone(&self.store),
            user,
            self.day,
            Arc::clone(&self.clock),
        );

        match controller.activate().await {
            Ok(()) => {
                self.emit_view(&controller).await?;
                self.controller = Some(controller);
            }
            Err(e) => {
                warn!("Could not subscribe to {}: {e}", self.day);
                self.events.send(SessionEvent::Rejected(e.to_string())).await?;
            }
        }
        Ok(())
    }

    async fn handle_command(&mut self, command: SessionCommand) -> Result<()> {
        debug!("Handling command {command:?}");
        match command {
            SessionCommand::SelectDay(day) => self.switch_day(day).await,
            SessionCommand::PreviousDay => self.switch_day(self.day.previous()).await,
            SessionCommand::NextDay => self.switch_day(self.day.next()).await,
            SessionCommand::Today => {
                self.switch_day(DayKey::today(self.clock.as_ref())).await
            }
            SessionCommand::AddActivity(draft) => {
                let outcome = match self.controller.as_mut() {
                    Some(controller) => controller.add_activity(draft).await,
                    None => Err(SyncError::NotLive),
                };
                self.report(outcome).await
            }
            SessionCommand::DeleteActivity(id) => {
                let outcome = match self.controller.as_mut() {
                    Some(controller) => controller.delete_activity(&id).await,
                    None => Err(SyncError::NotLive),
                };
                self.report(outcome).await
            }
        }
    }

    async fn switch_day(&mut self, day: DayKey) -> Result<()> {
        if day == self.day && self.controller.as_ref().is_some_and(|c| c.is_live()) {
            return Ok(());
        }

        self.day = day;
        // Only the subscription is cancelled here; a replace already in
        // flight for the previous day completes on its own.
        self.controller = None;

        let identity = self.auth.borrow().clone();
        if let Some(user) = identity {
            self.activate_day(user).await?;
        }
        Ok(())
    }

    async fn report(&mut self, outcome: Result<(), SyncError>) -> Result<()> {
        if let Err(e) = outcome {
            info!("Mutation rejected: {e}");
            self.events.send(SessionEvent::Rejected(e.to_string())).await?;
        }
        Ok(())
    }

    async fn apply_snapshot(&mut self, snapshot: Result<DayLedger, SyncError>) -> Result<()> {
        match snapshot {
            Ok(_) => {
                if let Some(controller) = self.controller.as_ref() {
                    self.emit_view(controller).await?;
                }
                Ok(())
            }
            Err(e) => {
                warn!("Subscription for {} ended: {e}", self.day);
                self.events.send(SessionEvent::Rejected(e.to_string())).await?;
                Ok(())
            }
        }
    }

    async fn emit_view(&self, controller: &DayController<S>) -> Result<()> {
        if let Some(ledger) = controller.ledger() {
            let view = DayView {
                user: controller.user().clone(),
                day: controller.day(),
                ledger: ledger.clone(),
                summary: DaySummary::of(&ledger.activities),
            };
            self.events.send(SessionEvent::View(view)).await?;
        }
        Ok(())
    }
}
