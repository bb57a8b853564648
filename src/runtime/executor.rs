//! Session executor
//!
//! Runs the pure transition function and applies the effects it returns.

use super::{DraftingBackend, SessionSnapshot, UiEvent};
use crate::backend::BackendError;
use crate::state_machine::{transition, Effect, Event, FlowContext, FlowState};
use crate::store::{ConversationStore, StoreUpdate};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Drives one intake session
pub struct FlowRuntime<B: DraftingBackend + 'static> {
    context: FlowContext,
    state: FlowState,
    store: ConversationStore,
    backend: Arc<B>,
    request_timeout: Duration,
    event_rx: mpsc::Receiver<Event>,
    /// Weak so the loop ends once every handle is gone
    event_tx: mpsc::WeakSender<Event>,
    broadcast_tx: broadcast::Sender<UiEvent>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    call_cancel_token: Option<CancellationToken>,
}

impl<B: DraftingBackend + 'static> FlowRuntime<B> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: FlowContext,
        store: ConversationStore,
        backend: B,
        request_timeout: Duration,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::WeakSender<Event>,
        broadcast_tx: broadcast::Sender<UiEvent>,
        snapshot_tx: watch::Sender<SessionSnapshot>,
    ) -> Self {
        Self {
            context,
            state: FlowState::default(),
            store,
            backend: Arc::new(backend),
            request_timeout,
            event_rx,
            event_tx,
            broadcast_tx,
            snapshot_tx,
            call_cancel_token: None,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.context.session_id, "Starting intake session");
        self.publish_snapshot();

        while let Some(event) = self.event_rx.recv().await {
            self.process_event(event);
        }

        if let Some(token) = self.call_cancel_token.take() {
            token.cancel();
        }
        tracing::info!(session_id = %self.context.session_id, "Intake session stopped");
    }

    fn process_event(&mut self, event: Event) {
        let call_id = event.call_id();
        let result = match transition(&self.state, &self.store, &self.context, event) {
            Ok(result) => result,
            Err(e) => {
                // Rejections are silent to the person; inputs are gated by the flags
                tracing::debug!(
                    session_id = %self.context.session_id,
                    state = self.state.name(),
                    call_id,
                    in_flight = self.state.in_flight_call(),
                    error = %e,
                    "Event rejected"
                );
                return;
            }
        };

        let previous = std::mem::replace(&mut self.state, result.new_state);
        if previous.name() != self.state.name() {
            tracing::info!(
                session_id = %self.context.session_id,
                from = previous.name(),
                to = self.state.name(),
                "State changed"
            );
        }

        for effect in result.effects {
            self.execute_effect(effect);
        }

        let _ = self.broadcast_tx.send(UiEvent::StateChange {
            state: self.state.clone(),
            flags: self.state.flags(&self.store),
        });
        self.publish_snapshot();
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Update(update) => self.apply_update(update),

            Effect::SelectTemplate { call_id, request } => {
                self.spawn_call(call_id, "select_template", move |backend| async move {
                    backend
                        .select_template(&request)
                        .await
                        .map(|response| Event::TemplateSelected {
                            call_id,
                            filename: response.filename,
                            question: response.question,
                        })
                });
            }

            Effect::NextStep { call_id, request } => {
                self.spawn_call(call_id, "next_step", move |backend| async move {
                    backend
                        .next_step(&request)
                        .await
                        .map(|response| Event::StepReplied {
                            call_id,
                            reply: response.reply,
                        })
                });
            }

            Effect::Complete { call_id, request } => {
                self.spawn_call(call_id, "complete", move |backend| async move {
                    backend
                        .complete(&request)
                        .await
                        .map(|document| Event::DocumentGenerated { call_id, document })
                });
            }

            Effect::AbortCall => {
                tracing::info!(session_id = %self.context.session_id, "Aborting backend call");
                if let Some(token) = self.call_cancel_token.take() {
                    token.cancel();
                }
            }
        }
    }

    fn apply_update(&mut self, update: StoreUpdate) {
        let notification = match &update {
            StoreUpdate::AppendMessage(message) => Some(UiEvent::Message {
                message: message.clone(),
            }),
            StoreUpdate::ExposeDocument(document) => Some(UiEvent::DocumentReady {
                document: Arc::clone(document),
            }),
            _ => None,
        };

        if let Err(e) = self.store.apply(update) {
            tracing::error!(session_id = %self.context.session_id, error = %e, "Store update rejected");
            return;
        }

        if let Some(notification) = notification {
            let _ = self.broadcast_tx.send(notification);
        }
    }

    /// Run a backend call in the background, raced against cancellation and
    /// the request timeout. The outcome comes back as an event tagged with
    /// `call_id`.
    fn spawn_call<F, Fut>(&mut self, call_id: u64, operation: &'static str, call: F)
    where
        F: FnOnce(Arc<B>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Event, BackendError>> + Send + 'static,
    {
        let Some(event_tx) = self.event_tx.upgrade() else {
            tracing::warn!(call_id, operation, "Session closing, backend call dropped");
            return;
        };

        let cancel_token = CancellationToken::new();
        if let Some(previous) = self.call_cancel_token.replace(cancel_token.clone()) {
            previous.cancel();
        }

        let backend = Arc::clone(&self.backend);
        let request_timeout = self.request_timeout;
        let session_id = self.context.session_id.clone();

        tokio::spawn(async move {
            tracing::info!(%session_id, call_id, operation, "Calling backend (background)");

            let event = tokio::select! {
                biased;

                () = cancel_token.cancelled() => {
                    tracing::info!(%session_id, call_id, operation, "Backend call cancelled");
                    return;
                }

                result = tokio::time::timeout(request_timeout, call(backend)) => match result {
                    Ok(Ok(event)) => event,
                    Ok(Err(error)) => Event::CallFailed { call_id, error },
                    Err(_) => {
                        tracing::warn!(
                            %session_id,
                            call_id,
                            operation,
                            timeout_secs = request_timeout.as_secs(),
                            "Backend call timed out"
                        );
                        Event::CallFailed {
                            call_id,
                            error: BackendError::timeout(request_timeout),
                        }
                    }
                },
            };

            let _ = event_tx.send(event).await;
        });
    }

    fn publish_snapshot(&self) {
        self.snapshot_tx
            .send_replace(SessionSnapshot::capture(&self.state, &self.store));
    }
}
