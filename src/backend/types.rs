//! Wire types for the drafting backend

use crate::catalog::{Category, Subtype};
use crate::store::ConversationTurn;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Content type the complete operation answers with
pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Body of `POST /api/ai/start`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectTemplateRequest {
    pub category: Category,
    pub subtype: Subtype,
    pub user_input: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SelectTemplateResponse {
    /// Template identifier; governs every later turn
    pub filename: String,
    /// First question to put to the person
    pub question: String,
}

/// Body of `POST /api/ai/next` and `POST /api/ai/complete`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DialogueRequest {
    pub category: Category,
    pub filename: String,
    pub messages: Vec<ConversationTurn>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NextStepResponse {
    pub reply: String,
}

/// Generated letter returned by the complete operation
#[derive(Clone, PartialEq, Eq)]
pub struct Document {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    /// Name to offer when saving
    pub file_name: String,
}

impl Document {
    /// Name used when the backend does not suggest one
    pub fn default_file_name(template_id: &str) -> String {
        format!("filled_{template_id}")
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("len", &self.bytes.len())
            .field("content_type", &self.content_type)
            .field("file_name", &self.file_name)
            .finish()
    }
}

/// Pull `filename="..."` out of a `Content-Disposition` header value
pub fn disposition_file_name(header: &str) -> Option<String> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}
