//! HTTP implementation of the drafting backend

use super::types::{
    disposition_file_name, DialogueRequest, Document, NextStepResponse, SelectTemplateRequest,
    SelectTemplateResponse, DOCX_CONTENT_TYPE,
};
use super::{BackendError, BackendErrorKind};
use crate::runtime::DraftingBackend;
use async_trait::async_trait;
use reqwest::{header, Client, Response};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;

const CATEGORIES_PATH: &str = "/api/categories";
const START_PATH: &str = "/api/ai/start";
const NEXT_PATH: &str = "/api/ai/next";
const COMPLETE_PATH: &str = "/api/ai/complete";

/// reqwest-backed client for the drafting service
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    /// Build a client for `base_url` (e.g. `http://localhost:8000`).
    ///
    /// `timeout` bounds each request at the transport level; the runtime
    /// applies its own per-call timeout on top.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send_error(e: &reqwest::Error) -> BackendError {
        if e.is_timeout() {
            BackendError::new(BackendErrorKind::Timeout, format!("Request timeout: {e}"))
        } else if e.is_connect() {
            BackendError::network(format!("Connection failed: {e}"))
        } else {
            BackendError::unknown(format!("Request failed: {e}"))
        }
    }

    /// Turn non-success statuses into classified errors
    async fn check_status(response: Response) -> Result<Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::from_status(status.as_u16(), &body))
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
        let response = Self::check_status(response).await?;
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::network(format!("Failed to read response: {e}")))?;
        serde_json::from_str(&body).map_err(|e| {
            BackendError::decode(format!("Failed to parse response: {e} - body: {body}"))
        })
    }
}

#[async_trait]
impl DraftingBackend for HttpBackend {
    async fn categories(&self) -> Result<BTreeMap<String, Vec<String>>, BackendError> {
        let response = self
            .client
            .get(self.url(CATEGORIES_PATH))
            .send()
            .await
            .map_err(|e| Self::send_error(&e))?;
        Self::read_json(response).await
    }

    async fn select_template(
        &self,
        request: &SelectTemplateRequest,
    ) -> Result<SelectTemplateResponse, BackendError> {
        let response = self
            .client
            .post(self.url(START_PATH))
            .json(request)
            .send()
            .await
            .map_err(|e| Self::send_error(&e))?;
        Self::read_json(response).await
    }

    async fn next_step(&self, request: &DialogueRequest) -> Result<NextStepResponse, BackendError> {
        let response = self
            .client
            .post(self.url(NEXT_PATH))
            .json(request)
            .send()
            .await
            .map_err(|e| Self::send_error(&e))?;
        Self::read_json(response).await
    }

    async fn complete(&self, request: &DialogueRequest) -> Result<Document, BackendError> {
        let response = self
            .client
            .post(self.url(COMPLETE_PATH))
            .header(header::ACCEPT, DOCX_CONTENT_TYPE)
            .json(request)
            .send()
            .await
            .map_err(|e| Self::send_error(&e))?;
        let response = Self::check_status(response).await?;

        let headers = response.headers();
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let file_name = headers
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(disposition_file_name)
            .unwrap_or_else(|| Document::default_file_name(&request.filename));

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BackendError::network(format!("Failed to read document: {e}")))?;
        let document = Document {
            bytes: bytes.to_vec(),
            content_type,
            file_name,
        };
        if document.is_empty() {
            return Err(BackendError::decode("Backend returned an empty document"));
        }
        Ok(document)
    }
}
