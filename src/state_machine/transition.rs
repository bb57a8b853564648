//! Pure state transition function
//!
//! Given the current state, a read-only view of the store and an event,
//! computes the next state plus the store updates and backend calls to
//! perform. No I/O happens here.

use super::state::PendingCall;
use super::{Effect, Event, FlowContext, FlowState};
use crate::backend::{BackendErrorKind, DialogueRequest, SelectTemplateRequest};
use crate::catalog::{Category, Subtype};
use crate::prompts;
use crate::store::{ConversationStore, ConversationTurn, StoreUpdate};
use std::sync::Arc;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: FlowState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: FlowState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Rejected events. None of these change state or reach the person.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Empty input")]
    EmptyInput,
    #[error("A request is already in flight")]
    Busy,
    #[error("Category and subtype must be selected first")]
    SelectionIncomplete,
    #[error("Unknown category: {0}")]
    UnknownCategory(String),
    #[error("Category already selected")]
    CategoryAlreadySelected,
    #[error("Not a selectable subtype: {0}")]
    InvalidSubtype(Subtype),
    #[error("No letter is waiting to be generated")]
    NoDocumentPending,
    #[error("Nothing to cancel")]
    NothingToCancel,
    #[error("Response to call {call_id} is no longer awaited")]
    StaleResponse { call_id: u64 },
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
pub fn transition(
    state: &FlowState,
    store: &ConversationStore,
    context: &FlowContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Selection
        // ============================================================
        (FlowState::SelectingCategory, Event::CategorySelected { category, label }) => {
            let Some(entry) = context.catalog.get(&category) else {
                return Err(TransitionError::UnknownCategory(category));
            };
            let label = if label.trim().is_empty() {
                entry.label.clone()
            } else {
                label
            };
            let category = entry.category.clone();
            let requires_subtype = category.requires_subtype();

            let result = TransitionResult::new(FlowState::SelectingSubtype).with_effects([
                Effect::Update(StoreUpdate::SelectCategory {
                    category,
                    label: label.clone(),
                }),
                Effect::echo(label),
            ]);

            if requires_subtype {
                Ok(result.with_effect(Effect::say(prompts::SUBTYPE_PROMPT)))
            } else {
                let mut result = result.with_effects([
                    Effect::Update(StoreUpdate::SelectSubtype(Subtype::Root)),
                    Effect::say(prompts::DESCRIBE_PROMPT),
                ]);
                result.new_state = FlowState::AwaitingDescription;
                Ok(result)
            }
        }

        (_, Event::CategorySelected { .. }) => Err(TransitionError::CategoryAlreadySelected),

        (FlowState::SelectingSubtype, Event::SubtypeSelected { subtype }) => {
            let offered = store
                .selection()
                .category
                .as_ref()
                .and_then(|category| context.catalog.get(category.as_str()))
                .is_none_or(|entry| entry.offers(subtype));
            if !Subtype::CHOICES.contains(&subtype) || !offered {
                return Err(TransitionError::InvalidSubtype(subtype));
            }
            Ok(TransitionResult::new(FlowState::AwaitingDescription).with_effects([
                Effect::Update(StoreUpdate::SelectSubtype(subtype)),
                Effect::echo(subtype.label()),
                Effect::say(prompts::DESCRIBE_PROMPT),
            ]))
        }

        (state, Event::SubtypeSelected { subtype }) => Err(TransitionError::InvalidTransition(
            format!("subtype {subtype} chosen while {}", state.name()),
        )),

        // ============================================================
        // Free-text input
        // ============================================================
        (state, Event::TextSubmitted { text }) => submit_text(state, store, &text),

        (state, Event::DocumentRequested) => {
            if state.is_busy() {
                return Err(TransitionError::Busy);
            }
            if store.document().is_some() || !store.completion_signalled() {
                return Err(TransitionError::NoDocumentPending);
            }
            begin_completion(store, store.turns().to_vec(), vec![])
        }

        // ============================================================
        // Backend responses
        // ============================================================
        (
            FlowState::Processing {
                call_id,
                call: PendingCall::SelectTemplate { user_text },
            },
            Event::TemplateSelected {
                call_id: answered,
                filename,
                question,
            },
        ) if answered == *call_id => {
            let selection = store.selection();
            let label = selection
                .category_label
                .clone()
                .or_else(|| selection.category.as_ref().map(|c| c.to_string()))
                .unwrap_or_default();

            // The select-template exchange becomes the dialogue's opening,
            // replacing whatever turns were recorded before it.
            let seed = vec![
                ConversationTurn::user(label),
                ConversationTurn::user(user_text.clone()),
                ConversationTurn::assistant(question.clone()),
            ];

            Ok(TransitionResult::new(FlowState::AwaitingFollowUp).with_effects([
                Effect::Update(StoreUpdate::AssignTemplate(filename)),
                Effect::Update(StoreUpdate::SeedTurns(seed)),
                Effect::say(prompts::TEMPLATE_SELECTED),
                Effect::say(question),
            ]))
        }

        (
            FlowState::Processing {
                call_id,
                call: PendingCall::NextStep,
            },
            Event::StepReplied {
                call_id: answered,
                reply,
            },
        ) if answered == *call_id => {
            let recorded = vec![
                Effect::say(reply.clone()),
                Effect::append_turn(ConversationTurn::assistant(reply.clone())),
            ];

            if is_completion_signal(&reply, &context.completion_sentinel) {
                if store.document().is_some() {
                    // The letter exists already; keep the dialogue open
                    return Ok(
                        TransitionResult::new(FlowState::AwaitingFollowUp).with_effects(recorded)
                    );
                }
                let mut messages = store.turns().to_vec();
                messages.push(ConversationTurn::assistant(reply));
                let mut leading = recorded;
                leading.push(Effect::Update(StoreUpdate::MarkCompletionSignalled));
                begin_completion(store, messages, leading)
            } else if solicits_more_input(&reply) {
                Ok(TransitionResult::new(FlowState::AwaitingFollowUp).with_effects(recorded))
            } else {
                Ok(TransitionResult::new(FlowState::Done).with_effects(recorded))
            }
        }

        (
            FlowState::Completing { call_id },
            Event::DocumentGenerated {
                call_id: answered,
                document,
            },
        ) if answered == *call_id => {
            Ok(TransitionResult::new(FlowState::AwaitingFollowUp).with_effects([
                Effect::Update(StoreUpdate::ExposeDocument(Arc::new(document))),
                Effect::say(prompts::LETTER_READY),
            ]))
        }

        (
            FlowState::Processing { call_id, .. },
            Event::CallFailed {
                call_id: answered,
                error,
            },
        ) if answered == *call_id => Ok(TransitionResult::new(FlowState::Error {
            message: error.message,
            error_kind: error.kind,
        })
        .with_effect(Effect::say(prompts::TRANSPORT_FAILURE))),

        (
            FlowState::Completing { call_id },
            Event::CallFailed {
                call_id: answered,
                ..
            },
        ) if answered == *call_id => Ok(TransitionResult::new(FlowState::AwaitingFollowUp)
            .with_effect(Effect::say(prompts::LETTER_FAILED))),

        // ============================================================
        // Cancellation
        // ============================================================
        (FlowState::Processing { .. }, Event::UserCancel) => Ok(TransitionResult::new(
            FlowState::Error {
                message: prompts::REQUEST_CANCELLED.to_string(),
                error_kind: BackendErrorKind::Cancelled,
            },
        )
        .with_effect(Effect::AbortCall)
        .with_effect(Effect::say(prompts::REQUEST_CANCELLED))),

        (FlowState::Completing { .. }, Event::UserCancel) => {
            Ok(TransitionResult::new(FlowState::AwaitingFollowUp)
                .with_effect(Effect::AbortCall)
                .with_effect(Effect::say(prompts::LETTER_CANCELLED)))
        }

        (_, Event::UserCancel) => Err(TransitionError::NothingToCancel),

        // ============================================================
        // Responses nobody is waiting for
        // ============================================================
        (_, event) => Err(TransitionError::StaleResponse {
            call_id: event.call_id().unwrap_or_default(),
        }),
    }
}

fn submit_text(
    state: &FlowState,
    store: &ConversationStore,
    text: &str,
) -> Result<TransitionResult, TransitionError> {
    if state.is_busy() {
        return Err(TransitionError::Busy);
    }
    if matches!(
        state,
        FlowState::SelectingCategory | FlowState::SelectingSubtype
    ) {
        return Err(TransitionError::SelectionIncomplete);
    }
    let selection = store.selection();
    let (Some(category), Some(subtype)) = (&selection.category, selection.subtype) else {
        return Err(TransitionError::SelectionIncomplete);
    };
    let text = text.trim();
    if text.is_empty() {
        return Err(TransitionError::EmptyInput);
    }

    let call_id = store.calls_issued() + 1;
    let recorded = [
        Effect::echo(text),
        Effect::append_turn(ConversationTurn::user(text)),
        Effect::call_issued(),
    ];

    match &selection.template_id {
        None => Ok(TransitionResult::new(FlowState::Processing {
            call_id,
            call: PendingCall::SelectTemplate {
                user_text: text.to_string(),
            },
        })
        .with_effects(recorded)
        .with_effect(Effect::SelectTemplate {
            call_id,
            request: SelectTemplateRequest {
                category: category.clone(),
                subtype,
                user_input: text.to_string(),
            },
        })),
        Some(template_id) => {
            let mut messages = store.turns().to_vec();
            messages.push(ConversationTurn::user(text));
            Ok(TransitionResult::new(FlowState::Processing {
                call_id,
                call: PendingCall::NextStep,
            })
            .with_effects(recorded)
            .with_effect(Effect::NextStep {
                call_id,
                request: dialogue_request(category, template_id, messages),
            }))
        }
    }
}

/// Move to `Completing` and issue the complete call with `messages`
fn begin_completion(
    store: &ConversationStore,
    messages: Vec<ConversationTurn>,
    leading: Vec<Effect>,
) -> Result<TransitionResult, TransitionError> {
    let selection = store.selection();
    let (Some(category), Some(template_id)) = (&selection.category, &selection.template_id) else {
        return Err(TransitionError::InvalidTransition(
            "completion requested before a template was assigned".to_string(),
        ));
    };

    let call_id = store.calls_issued() + 1;
    Ok(TransitionResult::new(FlowState::Completing { call_id })
        .with_effects(leading)
        .with_effect(Effect::say(prompts::LETTER_GENERATING))
        .with_effect(Effect::call_issued())
        .with_effect(Effect::Complete {
            call_id,
            request: dialogue_request(category, template_id, messages),
        }))
}

fn dialogue_request(
    category: &Category,
    template_id: &str,
    messages: Vec<ConversationTurn>,
) -> DialogueRequest {
    DialogueRequest {
        category: category.clone(),
        filename: template_id.to_string(),
        messages,
    }
}

/// The sentinel may be wrapped in explanatory text, so containment decides
pub fn is_completion_signal(reply: &str, sentinel: &str) -> bool {
    reply.contains(sentinel)
}

/// Whether a reply without the sentinel still asks the person for something
pub fn solicits_more_input(reply: &str) -> bool {
    let trimmed = reply.trim();
    trimmed.ends_with('?') || trimmed.to_lowercase().contains("please provide")
}
