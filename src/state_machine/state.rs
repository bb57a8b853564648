//! Flow state types

use crate::backend::BackendErrorKind;
use crate::catalog::CategoryCatalog;
use crate::store::ConversationStore;
use serde::{Deserialize, Serialize};

/// Marker the backend puts in a reply once it has every answer it needs
pub const COMPLETION_SENTINEL: &str = "__COMPLETE__";

/// Backend call a `Processing` state is waiting on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingCall {
    /// First description sent; the reply seeds the turn history with this text
    SelectTemplate { user_text: String },
    NextStep,
}

/// Phase of the intake dialogue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowState {
    /// Waiting for the person to pick a letter category
    #[default]
    SelectingCategory,

    /// `possession` chosen, waiting for the tenancy type
    SelectingSubtype,

    /// Waiting for the free-text description of the situation
    AwaitingDescription,

    /// A select-template or next-step call is in flight
    Processing { call_id: u64, call: PendingCall },

    /// Waiting for the answer to the backend's latest question
    AwaitingFollowUp,

    /// The complete call is in flight
    Completing { call_id: u64 },

    /// The backend's last reply asked nothing; input is not solicited
    Done,

    /// A backend call failed; the person can resubmit
    Error {
        message: String,
        error_kind: BackendErrorKind,
    },
}

impl FlowState {
    /// Waiting on the network
    pub fn is_busy(&self) -> bool {
        matches!(self, FlowState::Processing { .. } | FlowState::Completing { .. })
    }

    /// Waiting on the person to type something
    pub fn is_awaiting_input(&self) -> bool {
        matches!(
            self,
            FlowState::AwaitingDescription | FlowState::AwaitingFollowUp | FlowState::Error { .. }
        )
    }

    /// Id of the backend call this state is waiting on, if any
    pub fn in_flight_call(&self) -> Option<u64> {
        match self {
            FlowState::Processing { call_id, .. } | FlowState::Completing { call_id } => {
                Some(*call_id)
            }
            _ => None,
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            FlowState::SelectingCategory => "selecting_category",
            FlowState::SelectingSubtype => "selecting_subtype",
            FlowState::AwaitingDescription => "awaiting_description",
            FlowState::Processing { .. } => "processing",
            FlowState::AwaitingFollowUp => "awaiting_follow_up",
            FlowState::Completing { .. } => "completing",
            FlowState::Done => "done",
            FlowState::Error { .. } => "error",
        }
    }

    pub fn flags(&self, store: &ConversationStore) -> ControlFlags {
        ControlFlags {
            awaiting_input: self.is_awaiting_input(),
            busy: self.is_busy(),
            document_ready: store.document().is_some(),
        }
    }
}

/// Flags the presentation layer uses to enable input and offer the download.
///
/// Derived from [`FlowState`], so `awaiting_input && busy` cannot occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ControlFlags {
    pub awaiting_input: bool,
    pub busy: bool,
    pub document_ready: bool,
}

/// Per-session configuration (immutable)
#[derive(Debug, Clone)]
pub struct FlowContext {
    pub session_id: String,
    /// Categories the person may choose from
    pub catalog: CategoryCatalog,
    pub completion_sentinel: String,
}

impl FlowContext {
    pub fn new(session_id: impl Into<String>, catalog: CategoryCatalog) -> Self {
        Self {
            session_id: session_id.into(),
            catalog,
            completion_sentinel: COMPLETION_SENTINEL.to_string(),
        }
    }
}
