//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the runtime with mock implementations.

use crate::backend::{
    BackendError, DialogueRequest, Document, NextStepResponse, SelectTemplateRequest,
    SelectTemplateResponse,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Client for the remote drafting backend
#[async_trait]
pub trait DraftingBackend: Send + Sync {
    /// List categories and the subtype directories each one holds
    async fn categories(&self) -> Result<BTreeMap<String, Vec<String>>, BackendError>;

    /// Pick a template from the person's description and get the first question
    async fn select_template(
        &self,
        request: &SelectTemplateRequest,
    ) -> Result<SelectTemplateResponse, BackendError>;

    /// Send the dialogue so far and get the next question (or the sentinel)
    async fn next_step(&self, request: &DialogueRequest) -> Result<NextStepResponse, BackendError>;

    /// Fill the template from the dialogue
    async fn complete(&self, request: &DialogueRequest) -> Result<Document, BackendError>;
}

// ============================================================================
// Arc implementation for trait objects
// ============================================================================

#[async_trait]
impl<T: DraftingBackend + ?Sized> DraftingBackend for Arc<T> {
    async fn categories(&self) -> Result<BTreeMap<String, Vec<String>>, BackendError> {
        (**self).categories().await
    }

    async fn select_template(
        &self,
        request: &SelectTemplateRequest,
    ) -> Result<SelectTemplateResponse, BackendError> {
        (**self).select_template(request).await
    }

    async fn next_step(&self, request: &DialogueRequest) -> Result<NextStepResponse, BackendError> {
        (**self).next_step(request).await
    }

    async fn complete(&self, request: &DialogueRequest) -> Result<Document, BackendError> {
        (**self).complete(request).await
    }
}
