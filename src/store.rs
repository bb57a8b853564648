//! Conversation store
//!
//! In-memory aggregate for one session: the display transcript, the
//! role-tagged turn history the backend sees, and the selection state.
//! Only the flow runtime writes to it, and only through [`StoreUpdate`].

use crate::backend::Document;
use crate::catalog::{Category, Subtype};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Who a transcript line belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Bot,
}

/// One line of the rendered transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMessage {
    pub sender: Sender,
    pub text: String,
}

impl DisplayMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Bot,
            text: text.into(),
        }
    }
}

/// Role of a backend-facing turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One role-tagged message of the dialogue history sent to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// What the person picked and which template the backend chose
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    pub category: Option<Category>,
    pub category_label: Option<String>,
    pub subtype: Option<Subtype>,
    pub template_id: Option<String>,
}

/// Named mutations of the store
#[derive(Debug, Clone, PartialEq)]
pub enum StoreUpdate {
    AppendMessage(DisplayMessage),
    AppendTurn(ConversationTurn),
    /// Replace the whole turn history (used once, after template selection)
    SeedTurns(Vec<ConversationTurn>),
    SelectCategory { category: Category, label: String },
    SelectSubtype(Subtype),
    AssignTemplate(String),
    /// The backend signalled that it has everything it needs
    MarkCompletionSignalled,
    ExposeDocument(Arc<Document>),
    /// A backend call was issued; bumps the call counter
    CallIssued,
}

/// Invariant violations rejected by [`ConversationStore::apply`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("category already selected")]
    CategoryAlreadySelected,
    #[error("subtype already selected")]
    SubtypeAlreadySelected,
    #[error("template already assigned: {0}")]
    TemplateAlreadyAssigned(String),
    #[error("document already exposed")]
    DocumentAlreadyReady,
}

/// Authoritative session state read by the presentation layer
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    transcript: Vec<DisplayMessage>,
    turns: Vec<ConversationTurn>,
    selection: SelectionState,
    document: Option<Arc<Document>>,
    completion_signalled: bool,
    calls_issued: u64,
}

impl ConversationStore {
    /// Fresh store whose transcript opens with the given bot lines
    pub fn with_greeting<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            transcript: lines.into_iter().map(DisplayMessage::bot).collect(),
            ..Self::default()
        }
    }

    pub fn apply(&mut self, update: StoreUpdate) -> Result<(), StoreError> {
        match update {
            StoreUpdate::AppendMessage(message) => self.transcript.push(message),
            StoreUpdate::AppendTurn(turn) => self.turns.push(turn),
            StoreUpdate::SeedTurns(turns) => self.turns = turns,
            StoreUpdate::SelectCategory { category, label } => {
                if self.selection.category.is_some() {
                    return Err(StoreError::CategoryAlreadySelected);
                }
                self.selection.category = Some(category);
                self.selection.category_label = Some(label);
            }
            StoreUpdate::SelectSubtype(subtype) => {
                if self.selection.subtype.is_some() {
                    return Err(StoreError::SubtypeAlreadySelected);
                }
                self.selection.subtype = Some(subtype);
            }
            StoreUpdate::AssignTemplate(template_id) => {
                if let Some(existing) = &self.selection.template_id {
                    return Err(StoreError::TemplateAlreadyAssigned(existing.clone()));
                }
                self.selection.template_id = Some(template_id);
            }
            StoreUpdate::MarkCompletionSignalled => self.completion_signalled = true,
            StoreUpdate::ExposeDocument(document) => {
                if self.document.is_some() {
                    return Err(StoreError::DocumentAlreadyReady);
                }
                self.document = Some(document);
            }
            StoreUpdate::CallIssued => self.calls_issued += 1,
        }
        Ok(())
    }

    pub fn transcript(&self) -> &[DisplayMessage] {
        &self.transcript
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn document(&self) -> Option<&Arc<Document>> {
        self.document.as_ref()
    }

    pub fn completion_signalled(&self) -> bool {
        self.completion_signalled
    }

    /// Number of backend calls issued so far; the next call gets this plus one
    pub fn calls_issued(&self) -> u64 {
        self.calls_issued
    }
}
