//! Session runtime
//!
//! Owns one intake session: a single task holds the flow state and the
//! conversation store, processes events in arrival order, and runs backend
//! calls as cancellable background tasks that report back as events.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

use executor::FlowRuntime;
pub use traits::*;

use crate::backend::Document;
use crate::catalog::Subtype;
use crate::prompts;
use crate::state_machine::{ControlFlags, Event, FlowContext, FlowState};
use crate::store::{ConversationStore, ConversationTurn, DisplayMessage, SelectionState};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};

/// Events sent to the presentation layer
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// A line was appended to the transcript
    Message { message: DisplayMessage },
    StateChange {
        state: FlowState,
        flags: ControlFlags,
    },
    /// The letter can be offered for download
    DocumentReady { document: Arc<Document> },
}

/// Everything the presentation layer needs to render the session
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub state: FlowState,
    pub flags: ControlFlags,
    pub transcript: Vec<DisplayMessage>,
    pub turns: Vec<ConversationTurn>,
    pub selection: SelectionState,
    pub document: Option<Arc<Document>>,
}

impl SessionSnapshot {
    pub fn capture(state: &FlowState, store: &ConversationStore) -> Self {
        Self {
            state: state.clone(),
            flags: state.flags(store),
            transcript: store.transcript().to_vec(),
            turns: store.turns().to_vec(),
            selection: store.selection().clone(),
            document: store.document().cloned(),
        }
    }
}

#[derive(Debug, Error)]
#[error("Session has stopped")]
pub struct SessionClosed;

/// Handle to interact with a running session
#[derive(Clone)]
pub struct SessionHandle {
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<UiEvent>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    pub async fn send(&self, event: Event) -> Result<(), SessionClosed> {
        self.event_tx.send(event).await.map_err(|_| SessionClosed)
    }

    pub async fn select_category(
        &self,
        category: impl Into<String>,
        label: impl Into<String>,
    ) -> Result<(), SessionClosed> {
        self.send(Event::CategorySelected {
            category: category.into(),
            label: label.into(),
        })
        .await
    }

    pub async fn select_subtype(&self, subtype: Subtype) -> Result<(), SessionClosed> {
        self.send(Event::SubtypeSelected { subtype }).await
    }

    pub async fn submit_text(&self, text: impl Into<String>) -> Result<(), SessionClosed> {
        self.send(Event::TextSubmitted { text: text.into() }).await
    }

    pub async fn request_document(&self) -> Result<(), SessionClosed> {
        self.send(Event::DocumentRequested).await
    }

    pub async fn cancel(&self) -> Result<(), SessionClosed> {
        self.send(Event::UserCancel).await
    }

    /// Subscribe to transcript, state and download notifications
    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.broadcast_tx.subscribe()
    }

    /// Latest authoritative view of the session
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Receiver that wakes on every processed event
    #[cfg(test)]
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }
}

/// Start a session task and return its handle.
///
/// The task stops once every handle has been dropped and no backend call
/// is still in flight.
pub fn spawn_session<B: DraftingBackend + 'static>(
    context: FlowContext,
    backend: B,
    request_timeout: Duration,
) -> SessionHandle {
    let (event_tx, event_rx) = mpsc::channel(32);
    let (broadcast_tx, _) = broadcast::channel(128);

    let store = ConversationStore::with_greeting(prompts::GREETING);
    let (snapshot_tx, snapshot_rx) =
        watch::channel(SessionSnapshot::capture(&FlowState::default(), &store));

    let runtime = FlowRuntime::new(
        context,
        store,
        backend,
        request_timeout,
        event_rx,
        event_tx.downgrade(),
        broadcast_tx.clone(),
        snapshot_tx,
    );
    tokio::spawn(runtime.run());

    SessionHandle {
        event_tx,
        broadcast_tx,
        snapshot_rx,
    }
}
