//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use super::SessionEvent;
use crate::llm::{LlmError, LlmRequest, LlmResponse};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Notify, Semaphore};

// ============================================================================
// Mock LLM Client
// ============================================================================

/// Mock LLM client that returns queued responses
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    model_id: String,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn queue_text(&self, text: impl Into<String>) {
        self.queue_response(LlmResponse::from_text(text));
    }

    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_response(&self) -> Result<LlmResponse, LlmError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.next_response()
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Gated Mock LLM Client (for in-flight testing)
// ============================================================================

/// Mock LLM client that holds every reply until the test releases it
pub struct GatedMockLlmClient {
    inner: MockLlmClient,
    /// One permit per released reply
    gate: Semaphore,
    /// Notified when a request starts
    pub request_started: Arc<Notify>,
}

impl GatedMockLlmClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            inner: MockLlmClient::new(model_id),
            gate: Semaphore::new(0),
            request_started: Arc::new(Notify::new()),
        }
    }

    pub fn queue_text(&self, text: impl Into<String>) {
        self.inner.queue_text(text);
    }

    /// Let one held request finish
    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.inner.recorded_requests()
    }
}

#[async_trait]
impl LlmClient for GatedMockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.inner.requests.lock().unwrap().push(request.clone());
        self.request_started.notify_one();
        self.gate
            .acquire()
            .await
            .map_err(|_| LlmError::network("Gate closed"))?
            .forget();
        self.inner.next_response()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

// ============================================================================
// Event helpers
// ============================================================================

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Wait for the next event matching `pred`, skipping others
pub async fn wait_for(
    rx: &mut broadcast::Receiver<SessionEvent>,
    pred: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    tokio::time::timeout(WAIT_TIMEOUT, async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) => {}
                Err(e) => panic!("Session event stream failed: {e}"),
            }
        }
    })
    .await
    .expect("Timed out waiting for session event")
}

pub async fn wait_for_reply(rx: &mut broadcast::Receiver<SessionEvent>) {
    wait_for(rx, |e| matches!(e, SessionEvent::ReplyDone)).await;
}

pub async fn wait_for_pending(rx: &mut broadcast::Receiver<SessionEvent>) {
    wait_for(rx, |e| matches!(e, SessionEvent::StateChange { pending: true })).await;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{ConversationSnapshot, Role};
    use crate::llm::LlmErrorKind;
    use crate::prompt::Persona;
    use crate::runtime::{SessionError, SessionManager};

    const IDLE_TTL: Duration = Duration::from_secs(60);

    fn manager_with(client: Arc<dyn LlmClient>) -> SessionManager {
        SessionManager::new(client, Persona::default(), IDLE_TTL)
    }

    fn tail(snapshot: &ConversationSnapshot) -> Vec<(Role, String)> {
        snapshot.history[1..]
            .iter()
            .map(|m| (m.role(), m.text().to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_mock_llm_client() {
        let mock = MockLlmClient::new("test-model");
        mock.queue_text("Hello");

        let request = LlmRequest::single_turn("hi");
        let response = mock.complete(&request).await.unwrap();
        assert_eq!(response.text(), Some("Hello"));

        // Second call should fail (no more responses)
        assert!(mock.complete(&request).await.is_err());
        assert_eq!(mock.recorded_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_new_session_has_greeting() {
        let manager = manager_with(Arc::new(MockLlmClient::new("test-model")));
        let session = manager.create().await;

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.id, session.id());
        assert_eq!(snapshot.history.len(), 1);
        assert_eq!(snapshot.history[0].role(), Role::Model);
        assert_eq!(snapshot.history[0].text(), Persona::default().greeting);
        assert!(!snapshot.pending);
    }

    #[tokio::test]
    async fn test_successful_reply() {
        let llm = Arc::new(MockLlmClient::new("test-model"));
        llm.queue_text("Примерно 1500 руб/м².");
        let manager = manager_with(llm.clone());
        let session = manager.create().await;
        let mut rx = session.subscribe();

        session.submit("Сколько стоит ремонт?").await.unwrap();
        wait_for_reply(&mut rx).await;

        let snapshot = session.snapshot().await;
        assert!(!snapshot.pending);
        assert_eq!(
            tail(&snapshot),
            vec![
                (Role::User, "Сколько стоит ремонт?".to_string()),
                (Role::Model, "Примерно 1500 руб/м².".to_string()),
            ]
        );

        // Single-turn prompt: instruction plus the question, nothing else
        let requests = llm.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages.len(), 1);
        assert_eq!(
            requests[0].messages[0].text,
            Persona::default().build_prompt("Сколько стоит ремонт?")
        );
    }

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let llm = Arc::new(MockLlmClient::new("test-model"));
        llm.queue_text("ok");
        let manager = manager_with(llm);
        let session = manager.create().await;
        let mut rx = session.subscribe();

        session.submit("вопрос").await.unwrap();

        let mut seen = Vec::new();
        loop {
            let event = wait_for(&mut rx, |_| true).await;
            let done = matches!(event, SessionEvent::ReplyDone);
            seen.push(match event {
                SessionEvent::Message { index, message } => {
                    format!("{index}:{:?}:{}", message.role(), message.text())
                }
                SessionEvent::StateChange { pending } => format!("pending:{pending}"),
                SessionEvent::ReplyDone => "done".to_string(),
            });
            if done {
                break;
            }
        }

        assert_eq!(
            seen,
            vec!["1:User:вопрос", "pending:true", "2:Model:ok", "pending:false", "done"]
        );
    }

    #[tokio::test]
    async fn test_blank_submit_is_ignored() {
        let llm = Arc::new(MockLlmClient::new("test-model"));
        llm.queue_text("reply");
        let manager = manager_with(llm.clone());
        let session = manager.create().await;
        let mut rx = session.subscribe();

        session.submit("  ").await.unwrap();
        // A real question afterwards proves the blank one was consumed
        session.submit("real").await.unwrap();
        wait_for_reply(&mut rx).await;

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.history.len(), 3);
        assert_eq!(snapshot.history[1].text(), "real");
        assert_eq!(llm.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_while_pending_is_dropped() {
        let llm = Arc::new(GatedMockLlmClient::new("test-model"));
        llm.queue_text("Примерно 1500 руб/м².");
        let manager = manager_with(llm.clone());
        let session = manager.create().await;
        let mut rx = session.subscribe();

        session.submit("Сколько стоит ремонт?").await.unwrap();
        wait_for_pending(&mut rx).await;
        llm.request_started.notified().await;

        // Readable while suspended
        let during = session.snapshot().await;
        assert!(during.pending);
        assert_eq!(during.history.len(), 2);

        // Queued ahead of the completion, so it is seen while pending
        session.submit("Привет").await.unwrap();
        llm.release();
        wait_for_reply(&mut rx).await;

        let after = session.snapshot().await;
        assert!(!after.pending);
        assert_eq!(
            tail(&after),
            vec![
                (Role::User, "Сколько стоит ремонт?".to_string()),
                (Role::Model, "Примерно 1500 руб/м².".to_string()),
            ]
        );
        assert_eq!(llm.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_becomes_error_notice() {
        let llm = Arc::new(MockLlmClient::new("test-model"));
        llm.queue_error(LlmError::network("Connection failed"));
        let manager = manager_with(llm);
        let session = manager.create().await;
        let mut rx = session.subscribe();

        session.submit("тест").await.unwrap();
        wait_for_reply(&mut rx).await;

        let snapshot = session.snapshot().await;
        assert!(!snapshot.pending);
        assert_eq!(
            tail(&snapshot),
            vec![
                (Role::User, "тест".to_string()),
                (Role::Model, Persona::default().service_error_notice),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_reply_becomes_fallback() {
        let llm = Arc::new(MockLlmClient::new("test-model"));
        llm.queue_response(LlmResponse::default());
        let manager = manager_with(llm);
        let session = manager.create().await;
        let mut rx = session.subscribe();

        session.submit("вопрос").await.unwrap();
        wait_for_reply(&mut rx).await;

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.history[2].text(), Persona::default().empty_reply_notice);
    }

    #[tokio::test]
    async fn test_session_recovers_after_failure() {
        let llm = Arc::new(MockLlmClient::new("test-model"));
        llm.queue_error(LlmError::new(LlmErrorKind::ServerError, "HTTP 503"));
        llm.queue_text("Теперь работает.");
        let manager = manager_with(llm);
        let session = manager.create().await;
        let mut rx = session.subscribe();

        session.submit("первый").await.unwrap();
        wait_for_reply(&mut rx).await;
        session.submit("второй").await.unwrap();
        wait_for_reply(&mut rx).await;

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.history.len(), 5);
        assert_eq!(snapshot.history[4].text(), "Теперь работает.");
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let llm = Arc::new(GatedMockLlmClient::new("test-model"));
        llm.queue_text("первому");
        llm.queue_text("второму");
        let manager = manager_with(llm.clone());
        let first = manager.create().await;
        let second = manager.create().await;
        let mut first_rx = first.subscribe();
        let mut second_rx = second.subscribe();

        first.submit("a").await.unwrap();
        wait_for_pending(&mut first_rx).await;

        // A pending first session does not block the second
        second.submit("b").await.unwrap();
        wait_for_pending(&mut second_rx).await;
        assert_eq!(manager.session_count().await, 2);

        llm.release();
        llm.release();
        wait_for_reply(&mut first_rx).await;
        wait_for_reply(&mut second_rx).await;

        assert_eq!(first.snapshot().await.history.len(), 3);
        assert_eq!(second.snapshot().await.history.len(), 3);
        assert_eq!(llm.recorded_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_discard_removes_session() {
        let manager = manager_with(Arc::new(MockLlmClient::new("test-model")));
        let session = manager.create().await;
        let id = session.id().to_string();

        manager.discard(&id).await.unwrap();

        assert_eq!(manager.session_count().await, 0);
        assert_eq!(
            manager.snapshot(&id).await.unwrap_err(),
            SessionError::NotFound(id.clone())
        );
        assert_eq!(
            manager.discard(&id).await.unwrap_err(),
            SessionError::NotFound(id)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_sessions_are_evicted() {
        let manager = manager_with(Arc::new(MockLlmClient::new("test-model")));
        for _ in 0..5 {
            manager.create().await;
        }
        assert_eq!(manager.session_count().await, 5);

        tokio::time::sleep(IDLE_TTL * 2).await;

        assert_eq!(manager.session_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_used_or_watched_sessions_survive_sweep() {
        let manager = manager_with(Arc::new(MockLlmClient::new("test-model")));
        let watched = manager.create().await;
        let _events = watched.subscribe();
        let touched = manager.create().await;
        let abandoned = manager.create().await;

        tokio::time::sleep(IDLE_TTL * 3 / 4).await;
        manager.get(touched.id()).await.unwrap();
        tokio::time::sleep(IDLE_TTL / 2).await;

        assert_eq!(manager.session_count().await, 2);
        assert!(manager.get(watched.id()).await.is_ok());
        assert!(manager.get(touched.id()).await.is_ok());
        assert_eq!(
            manager.get(abandoned.id()).await.unwrap_err(),
            SessionError::NotFound(abandoned.id().to_string())
        );
    }

    #[tokio::test]
    async fn test_manager_submit_by_id() {
        let llm = Arc::new(MockLlmClient::new("test-model"));
        llm.queue_text("ok");
        let manager = manager_with(llm);
        let session = manager.create().await;
        let mut rx = session.subscribe();

        manager.submit(session.id(), "вопрос").await.unwrap();
        wait_for_reply(&mut rx).await;

        assert_eq!(manager.snapshot(session.id()).await.unwrap().history.len(), 3);
        assert_eq!(
            manager.submit("missing", "вопрос").await.unwrap_err(),
            SessionError::NotFound("missing".to_string())
        );
    }
}
