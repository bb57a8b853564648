//! Events that drive the intake flow

use crate::backend::{BackendError, Document};
use crate::catalog::Subtype;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // Presentation events
    CategorySelected {
        category: String,
        label: String,
    },
    SubtypeSelected {
        subtype: Subtype,
    },
    TextSubmitted {
        text: String,
    },
    /// Ask for the letter again after a failed or cancelled completion
    DocumentRequested,
    UserCancel,

    // Backend events, tagged with the call they answer
    TemplateSelected {
        call_id: u64,
        filename: String,
        question: String,
    },
    StepReplied {
        call_id: u64,
        reply: String,
    },
    DocumentGenerated {
        call_id: u64,
        document: Document,
    },
    CallFailed {
        call_id: u64,
        error: BackendError,
    },
}

impl Event {
    /// Call id for backend events, `None` for presentation events
    pub fn call_id(&self) -> Option<u64> {
        match self {
            Event::TemplateSelected { call_id, .. }
            | Event::StepReplied { call_id, .. }
            | Event::DocumentGenerated { call_id, .. }
            | Event::CallFailed { call_id, .. } => Some(*call_id),
            _ => None,
        }
    }
}
