//! Mock implementations for testing
//!
//! These mocks drive a real session task without network I/O.

use super::{spawn_session, DraftingBackend, SessionHandle, SessionSnapshot, UiEvent};
use crate::backend::{
    BackendError, DialogueRequest, Document, NextStepResponse, SelectTemplateRequest,
    SelectTemplateResponse, DOCX_CONTENT_TYPE,
};
use crate::catalog::CategoryCatalog;
use crate::state_machine::FlowContext;
use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};

// ============================================================================
// Mock Drafting Backend
// ============================================================================

/// Backend that answers from queued results and records every request
#[derive(Default)]
pub struct MockBackend {
    listing: BTreeMap<String, Vec<String>>,
    categories_error: Option<BackendError>,
    templates: Mutex<VecDeque<Result<SelectTemplateResponse, BackendError>>>,
    replies: Mutex<VecDeque<Result<NextStepResponse, BackendError>>>,
    documents: Mutex<VecDeque<Result<Document, BackendError>>>,
    /// Applied before every answer
    delay: Option<Duration>,
    /// Signalled whenever a call starts
    pub call_started: Arc<Notify>,
    pub template_requests: Mutex<Vec<SelectTemplateRequest>>,
    pub step_requests: Mutex<Vec<DialogueRequest>>,
    pub complete_requests: Mutex<Vec<DialogueRequest>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            listing: test_listing(),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_categories_error(mut self, error: BackendError) -> Self {
        self.categories_error = Some(error);
        self
    }

    pub fn queue_template(&self, filename: &str, question: &str) {
        self.templates
            .lock()
            .unwrap()
            .push_back(Ok(SelectTemplateResponse {
                filename: filename.to_string(),
                question: question.to_string(),
            }));
    }

    pub fn queue_template_error(&self, error: BackendError) {
        self.templates.lock().unwrap().push_back(Err(error));
    }

    pub fn queue_reply(&self, reply: &str) {
        self.replies.lock().unwrap().push_back(Ok(NextStepResponse {
            reply: reply.to_string(),
        }));
    }

    pub fn queue_reply_error(&self, error: BackendError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    pub fn queue_document(&self, bytes: &[u8], file_name: &str) {
        self.documents.lock().unwrap().push_back(Ok(Document {
            bytes: bytes.to_vec(),
            content_type: Some(DOCX_CONTENT_TYPE.to_string()),
            file_name: file_name.to_string(),
        }));
    }

    pub fn queue_document_error(&self, error: BackendError) {
        self.documents.lock().unwrap().push_back(Err(error));
    }

    /// Total number of template, next-step and complete calls received
    pub fn call_count(&self) -> usize {
        self.template_requests.lock().unwrap().len()
            + self.step_requests.lock().unwrap().len()
            + self.complete_requests.lock().unwrap().len()
    }

    async fn answer<T>(&self, queue: &Mutex<VecDeque<Result<T, BackendError>>>) -> Result<T, BackendError> {
        self.call_started.notify_one();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::network("No mock response queued")))
    }
}

#[async_trait]
impl DraftingBackend for MockBackend {
    async fn categories(&self) -> Result<BTreeMap<String, Vec<String>>, BackendError> {
        match &self.categories_error {
            Some(error) => Err(error.clone()),
            None => Ok(self.listing.clone()),
        }
    }

    async fn select_template(
        &self,
        request: &SelectTemplateRequest,
    ) -> Result<SelectTemplateResponse, BackendError> {
        self.template_requests.lock().unwrap().push(request.clone());
        self.answer(&self.templates).await
    }

    async fn next_step(&self, request: &DialogueRequest) -> Result<NextStepResponse, BackendError> {
        self.step_requests.lock().unwrap().push(request.clone());
        self.answer(&self.replies).await
    }

    async fn complete(&self, request: &DialogueRequest) -> Result<Document, BackendError> {
        self.complete_requests.lock().unwrap().push(request.clone());
        self.answer(&self.documents).await
    }
}

pub fn test_listing() -> BTreeMap<String, Vec<String>> {
    let mut listing = BTreeMap::new();
    listing.insert(
        "possession".to_string(),
        vec!["private".to_string(), "local".to_string()],
    );
    listing.insert("disrepair".to_string(), vec![]);
    listing.insert("deposit_protection".to_string(), vec![]);
    listing
}

// ============================================================================
// Test Session
// ============================================================================

/// A running session wired to a [`MockBackend`]
pub struct TestSession {
    pub handle: SessionHandle,
    pub backend: Arc<MockBackend>,
    pub events: broadcast::Receiver<UiEvent>,
}

impl TestSession {
    pub fn start(backend: MockBackend) -> Self {
        Self::start_with_timeout(backend, Duration::from_secs(5))
    }

    pub fn start_with_timeout(backend: MockBackend, request_timeout: Duration) -> Self {
        let backend = Arc::new(backend);
        let context = FlowContext::new(
            "test-session",
            CategoryCatalog::from_listing(backend.listing.clone()),
        );
        let handle = spawn_session(context, Arc::clone(&backend), request_timeout);
        let events = handle.subscribe();
        Self {
            handle,
            backend,
            events,
        }
    }

    /// Wait until a snapshot satisfies `pred`
    pub async fn wait_for(
        &self,
        timeout: Duration,
        pred: impl Fn(&SessionSnapshot) -> bool,
    ) -> Option<SessionSnapshot> {
        let mut rx = self.handle.watch();
        let wait = async {
            loop {
                {
                    let snapshot = rx.borrow_and_update();
                    if pred(&snapshot) {
                        return Some(snapshot.clone());
                    }
                }
                if rx.changed().await.is_err() {
                    return None;
                }
            }
        };
        tokio::time::timeout(timeout, wait).await.ok().flatten()
    }

    /// Wait for a state by its short name
    pub async fn wait_for_state(&self, expected: &str, timeout: Duration) -> bool {
        self.wait_for(timeout, |s| s.state.name() == expected)
            .await
            .is_some()
    }

    /// Wait for the download notification
    pub async fn wait_for_document(&mut self, timeout: Duration) -> Option<Arc<Document>> {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), self.events.recv()).await {
                Ok(Ok(UiEvent::DocumentReady { document })) => return Some(document),
                _ => continue,
            }
        }
        None
    }

    /// Pick a category that needs no subtype and describe the situation
    pub async fn describe(&self, category: &str, label: &str, text: &str) {
        self.handle
            .select_category(category, label)
            .await
            .expect("Failed to select category");
        self.handle
            .submit_text(text)
            .await
            .expect("Failed to submit description");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendErrorKind;
    use crate::catalog::Subtype;
    use crate::prompts;
    use crate::state_machine::FlowState;
    use crate::store::{ConversationTurn, Role, Sender};

    const WAIT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn test_mock_backend_records_requests() {
        let mock = MockBackend::new();
        mock.queue_reply("Anything else?");
        let request = DialogueRequest {
            category: crate::catalog::Category::new("disrepair"),
            filename: "damp.docx".to_string(),
            messages: vec![ConversationTurn::user("hi")],
        };

        let reply = mock.next_step(&request).await.unwrap();
        assert_eq!(reply.reply, "Anything else?");
        assert_eq!(mock.step_requests.lock().unwrap().len(), 1);

        let err = mock.next_step(&request).await.unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::Network);
    }

    #[tokio::test]
    async fn test_session_opens_with_greeting() {
        let session = TestSession::start(MockBackend::new());
        let snapshot = session.handle.snapshot();

        assert_eq!(snapshot.state, FlowState::SelectingCategory);
        assert_eq!(snapshot.transcript.len(), prompts::GREETING.len());
        assert!(snapshot.transcript.iter().all(|m| m.sender == Sender::Bot));
        assert!(!snapshot.flags.awaiting_input);
        assert!(!snapshot.flags.busy);
    }

    #[tokio::test]
    async fn test_full_intake_produces_document() {
        let backend = MockBackend::new();
        backend.queue_template("damp.docx", "When did the damp start?");
        backend.queue_reply("Have you told your landlord?");
        backend.queue_reply("Thanks, that is everything. __COMPLETE__");
        backend.queue_document(b"PK\x03\x04letter", "filled_damp.docx");
        let mut session = TestSession::start(backend);

        session
            .describe("disrepair", "Disrepair", "Damp in the bedroom")
            .await;
        let snapshot = session
            .wait_for(WAIT, |s| s.selection.template_id.is_some() && !s.flags.busy)
            .await
            .expect("template never assigned");
        assert_eq!(snapshot.state, FlowState::AwaitingFollowUp);
        assert_eq!(
            snapshot.turns,
            vec![
                ConversationTurn::user("Disrepair"),
                ConversationTurn::user("Damp in the bedroom"),
                ConversationTurn::assistant("When did the damp start?"),
            ]
        );
        let request = session.backend.template_requests.lock().unwrap()[0].clone();
        assert_eq!(request.subtype, Subtype::Root);
        assert_eq!(request.user_input, "Damp in the bedroom");

        session.handle.submit_text("Last winter").await.unwrap();
        session
            .wait_for(WAIT, |s| s.turns.len() == 5 && !s.flags.busy)
            .await
            .expect("second question never arrived");

        session.handle.submit_text("Yes, in March").await.unwrap();
        let document = session
            .wait_for_document(WAIT)
            .await
            .expect("document never delivered");
        assert_eq!(document.file_name, "filled_damp.docx");

        let snapshot = session
            .wait_for(WAIT, |s| s.flags.document_ready)
            .await
            .unwrap();
        assert_eq!(snapshot.state, FlowState::AwaitingFollowUp);
        assert_eq!(
            snapshot.transcript.last().map(|m| m.text.as_str()),
            Some(prompts::LETTER_READY)
        );

        // The complete call sees the whole dialogue, sentinel reply included
        let complete = session.backend.complete_requests.lock().unwrap()[0].clone();
        assert_eq!(complete.filename, "damp.docx");
        assert_eq!(complete.messages.len(), 7);
        assert_eq!(complete.messages[5], ConversationTurn::user("Yes, in March"));
        assert!(complete.messages[6].content.contains("__COMPLETE__"));
        assert_eq!(session.backend.call_count(), 4);
    }

    #[tokio::test]
    async fn test_possession_sends_chosen_subtype() {
        let backend = MockBackend::new();
        backend.queue_template("s21.docx", "What is your landlord's name?");
        let session = TestSession::start(backend);

        session
            .handle
            .select_category("possession", "Possession")
            .await
            .unwrap();
        assert!(session.wait_for_state("selecting_subtype", WAIT).await);

        // Free text is refused until the tenancy type is known
        session.handle.submit_text("Too early").await.unwrap();
        session
            .handle
            .select_subtype(Subtype::LocalAuthority)
            .await
            .unwrap();
        assert!(session.wait_for_state("awaiting_description", WAIT).await);

        session
            .handle
            .submit_text("Notice received yesterday")
            .await
            .unwrap();
        session
            .wait_for(WAIT, |s| s.selection.template_id.is_some())
            .await
            .expect("template never assigned");

        let requests = session.backend.template_requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].subtype, Subtype::LocalAuthority);
        assert_eq!(requests[0].user_input, "Notice received yesterday");
    }

    #[tokio::test]
    async fn test_next_step_failure_keeps_user_turn() {
        let backend = MockBackend::new();
        backend.queue_template("damp.docx", "When did the damp start?");
        backend.queue_reply_error(BackendError::server_error("boom"));
        let session = TestSession::start(backend);

        session
            .describe("disrepair", "Disrepair", "Damp in the bedroom")
            .await;
        session
            .wait_for(WAIT, |s| s.selection.template_id.is_some() && !s.flags.busy)
            .await
            .unwrap();

        session.handle.submit_text("Last winter").await.unwrap();
        let snapshot = session
            .wait_for(WAIT, |s| matches!(s.state, FlowState::Error { .. }))
            .await
            .expect("failure never surfaced");

        assert!(snapshot.flags.awaiting_input);
        assert_eq!(snapshot.turns.len(), 4);
        assert_eq!(snapshot.turns[3], ConversationTurn::user("Last winter"));
        assert_eq!(
            snapshot.transcript.last().map(|m| m.text.as_str()),
            Some(prompts::TRANSPORT_FAILURE)
        );
    }

    #[tokio::test]
    async fn test_template_retry_after_failure() {
        let backend = MockBackend::new();
        backend.queue_template_error(BackendError::network("connection refused"));
        backend.queue_template("damp.docx", "When did the damp start?");
        let session = TestSession::start(backend);

        session
            .describe("disrepair", "Disrepair", "Damp in the bedroom")
            .await;
        assert!(session.wait_for_state("error", WAIT).await);

        session
            .handle
            .submit_text("Mould on the bedroom wall")
            .await
            .unwrap();
        let snapshot = session
            .wait_for(WAIT, |s| s.selection.template_id.is_some())
            .await
            .expect("retry never selected a template");

        // The failed attempt does not leak into the seeded dialogue
        assert_eq!(snapshot.turns.len(), 3);
        assert_eq!(snapshot.turns[1].content, "Mould on the bedroom wall");
        assert_eq!(snapshot.turns[2].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_empty_submission_makes_no_call() {
        let session = TestSession::start(MockBackend::new());
        session.describe("disrepair", "Disrepair", "   ").await;
        assert!(session.wait_for_state("awaiting_description", WAIT).await);

        // A later valid event proves the blank one was processed and dropped
        session.handle.cancel().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let snapshot = session.handle.snapshot();
        assert_eq!(snapshot.state, FlowState::AwaitingDescription);
        assert!(snapshot.turns.is_empty());
        assert!(snapshot
            .transcript
            .iter()
            .all(|m| m.sender == Sender::Bot || m.text == "Disrepair"));
        assert_eq!(session.backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_submit_while_busy_is_ignored() {
        let backend = MockBackend::new().with_delay(Duration::from_millis(200));
        backend.queue_template("damp.docx", "When did the damp start?");
        let session = TestSession::start(backend);

        session
            .describe("disrepair", "Disrepair", "Damp in the bedroom")
            .await;
        session.handle.submit_text("Second thought").await.unwrap();

        let snapshot = session
            .wait_for(WAIT, |s| s.selection.template_id.is_some() && !s.flags.busy)
            .await
            .unwrap();
        assert_eq!(session.backend.call_count(), 1);
        assert!(!snapshot
            .transcript
            .iter()
            .any(|m| m.text == "Second thought"));
    }

    #[tokio::test]
    async fn test_cancel_during_call() {
        let backend = MockBackend::new().with_delay(Duration::from_millis(300));
        backend.queue_template("damp.docx", "When did the damp start?");
        let started = Arc::clone(&backend.call_started);
        let session = TestSession::start(backend);

        session
            .describe("disrepair", "Disrepair", "Damp in the bedroom")
            .await;
        tokio::time::timeout(WAIT, started.notified())
            .await
            .expect("call never started");

        session.handle.cancel().await.unwrap();
        let snapshot = session
            .wait_for(WAIT, |s| matches!(s.state, FlowState::Error { .. }))
            .await
            .unwrap();
        assert_eq!(
            snapshot.state,
            FlowState::Error {
                message: prompts::REQUEST_CANCELLED.to_string(),
                error_kind: BackendErrorKind::Cancelled,
            }
        );
        assert!(snapshot.flags.awaiting_input);

        // The aborted call never lands
        tokio::time::sleep(Duration::from_millis(500)).await;
        let snapshot = session.handle.snapshot();
        assert!(snapshot.selection.template_id.is_none());
        assert!(matches!(snapshot.state, FlowState::Error { .. }));
    }

    #[tokio::test]
    async fn test_call_times_out() {
        let backend = MockBackend::new().with_delay(Duration::from_secs(5));
        backend.queue_template("damp.docx", "When did the damp start?");
        let session = TestSession::start_with_timeout(backend, Duration::from_millis(100));

        session
            .describe("disrepair", "Disrepair", "Damp in the bedroom")
            .await;
        let snapshot = session
            .wait_for(WAIT, |s| matches!(s.state, FlowState::Error { .. }))
            .await
            .expect("timeout never surfaced");

        let FlowState::Error { error_kind, .. } = snapshot.state else {
            unreachable!()
        };
        assert_eq!(error_kind, BackendErrorKind::Timeout);
        assert!(snapshot.selection.template_id.is_none());
    }

    #[tokio::test]
    async fn test_completion_failure_allows_retry() {
        let backend = MockBackend::new();
        backend.queue_template("damp.docx", "Anything else we should know?");
        backend.queue_reply("__COMPLETE__");
        backend.queue_document_error(BackendError::server_error("render failed"));
        backend.queue_document(b"PK\x03\x04", "filled_damp.docx");
        let mut session = TestSession::start(backend);

        session
            .describe("disrepair", "Disrepair", "Damp in the bedroom")
            .await;
        session
            .wait_for(WAIT, |s| s.selection.template_id.is_some() && !s.flags.busy)
            .await
            .unwrap();
        session.handle.submit_text("No").await.unwrap();

        let snapshot = session
            .wait_for(WAIT, |s| {
                s.transcript
                    .last()
                    .is_some_and(|m| m.text == prompts::LETTER_FAILED)
            })
            .await
            .expect("failure never surfaced");
        assert_eq!(snapshot.state, FlowState::AwaitingFollowUp);
        assert!(!snapshot.flags.document_ready);

        session.handle.request_document().await.unwrap();
        let document = session.wait_for_document(WAIT).await.unwrap();
        assert_eq!(document.bytes, b"PK\x03\x04");

        let requests = session.backend.complete_requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].messages, requests[1].messages);
    }

    #[tokio::test]
    async fn test_session_stops_when_handles_dropped() {
        let session = TestSession::start(MockBackend::new());
        let mut watch = session.handle.watch();
        drop(session);

        // The snapshot sender goes away with the session task
        let closed = tokio::time::timeout(WAIT, async {
            while watch.changed().await.is_ok() {}
        })
        .await;
        assert!(closed.is_ok());
    }
}
