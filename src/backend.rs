//! Drafting backend client
//!
//! Talks to the remote service that selects letter templates, asks the
//! follow-up questions and fills in the finished document.

mod error;
mod http;
mod types;

pub use error::{BackendError, BackendErrorKind};
pub use http::HttpBackend;
pub use types::*;

use crate::runtime::DraftingBackend;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Logging wrapper for drafting backends
pub struct LoggingBackend {
    inner: Arc<dyn DraftingBackend>,
}

impl LoggingBackend {
    pub fn new(inner: Arc<dyn DraftingBackend>) -> Self {
        Self { inner }
    }

    fn record<T>(operation: &'static str, started: Instant, result: &Result<T, BackendError>) {
        let duration_ms = started.elapsed().as_millis();
        match result {
            Ok(_) => {
                tracing::info!(operation, duration_ms = %duration_ms, "Backend request completed");
            }
            Err(e) => {
                tracing::error!(
                    operation,
                    duration_ms = %duration_ms,
                    kind = ?e.kind,
                    error = %e.message,
                    "Backend request failed"
                );
            }
        }
    }
}

#[async_trait]
impl DraftingBackend for LoggingBackend {
    async fn categories(&self) -> Result<BTreeMap<String, Vec<String>>, BackendError> {
        let started = Instant::now();
        let result = self.inner.categories().await;
        Self::record("categories", started, &result);
        result
    }

    async fn select_template(
        &self,
        request: &SelectTemplateRequest,
    ) -> Result<SelectTemplateResponse, BackendError> {
        let started = Instant::now();
        let result = self.inner.select_template(request).await;
        Self::record("select_template", started, &result);
        if let Ok(response) = &result {
            tracing::info!(template = %response.filename, "Template selected");
        }
        result
    }

    async fn next_step(&self, request: &DialogueRequest) -> Result<NextStepResponse, BackendError> {
        let started = Instant::now();
        let result = self.inner.next_step(request).await;
        Self::record("next_step", started, &result);
        result
    }

    async fn complete(&self, request: &DialogueRequest) -> Result<Document, BackendError> {
        let started = Instant::now();
        let result = self.inner.complete(request).await;
        Self::record("complete", started, &result);
        if let Ok(document) = &result {
            tracing::info!(bytes = document.len(), file = %document.file_name, "Letter generated");
        }
        result
    }
}
