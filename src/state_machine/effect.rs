//! Effects produced by state transitions

use crate::backend::{DialogueRequest, SelectTemplateRequest};
use crate::store::{ConversationTurn, DisplayMessage, StoreUpdate};

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Apply a named mutation to the conversation store
    Update(StoreUpdate),

    /// Call select-template
    SelectTemplate {
        call_id: u64,
        request: SelectTemplateRequest,
    },

    /// Call next-step
    NextStep {
        call_id: u64,
        request: DialogueRequest,
    },

    /// Call complete
    Complete {
        call_id: u64,
        request: DialogueRequest,
    },

    /// Abort the call currently in flight
    AbortCall,
}

impl Effect {
    /// Bot line in the transcript
    pub fn say(text: impl Into<String>) -> Self {
        Effect::Update(StoreUpdate::AppendMessage(DisplayMessage::bot(text)))
    }

    /// Echo of the person's input in the transcript
    pub fn echo(text: impl Into<String>) -> Self {
        Effect::Update(StoreUpdate::AppendMessage(DisplayMessage::user(text)))
    }

    pub fn append_turn(turn: ConversationTurn) -> Self {
        Effect::Update(StoreUpdate::AppendTurn(turn))
    }

    pub fn call_issued() -> Self {
        Effect::Update(StoreUpdate::CallIssued)
    }

    /// Whether this effect starts a backend call
    #[cfg(test)]
    pub fn is_backend_call(&self) -> bool {
        matches!(
            self,
            Effect::SelectTemplate { .. } | Effect::NextStep { .. } | Effect::Complete { .. }
        )
    }
}
