use std::{future::Future, path::PathBuf, sync::Arc};

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::{
    ledger::entities::UserId,
    store::local::LocalLedgerStore,
    utils::clock::{Clock, DefaultClock},
};

pub mod controller;
pub mod session;

use session::{LedgerSession, SessionCommand, SessionEvent};

const COMMAND_BUFFER: usize = 16;
const EVENT_BUFFER: usize = 16;

/// Handles the caller keeps after starting a session: the command sender
/// for UI intents, the event receiver for confirmed views and rejection
/// messages, and the token that stops the loop.
pub struct SessionHandles {
    pub commands: mpsc::Sender<SessionCommand>,
    pub events: mpsc::Receiver<SessionEvent>,
    pub shutdown: CancellationToken,
}

/// Wires a session over the file-backed store for the given signed-in
/// identity signal. The returned future is the session event loop; the
/// caller drives it (usually with `tokio::spawn`) and talks to it through
/// the handles.
pub fn start_session(
    root: PathBuf,
    authorized: UserId,
    auth: watch::Receiver<Option<UserId>>,
) -> Result<(impl Future<Output = Result<()>>, SessionHandles)> {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let store = Arc::new(LocalLedgerStore::new(root, authorized, Arc::clone(&clock))?);

    let (command_sender, command_receiver) = mpsc::channel(COMMAND_BUFFER);
    let (event_sender, event_receiver) = mpsc::channel(EVENT_BUFFER);
    let shutdown = CancellationToken::new();

    let session = LedgerSession::new(
        store,
        clock,
        auth,
        command_receiver,
        event_sender,
        shutdown.clone(),
    );

    Ok((
        session.run(),
        SessionHandles {
            commands: command_sender,
            events: event_receiver,
            shutdown,
        },
    ))
}
