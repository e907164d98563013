//! Runtime for chat sessions
//!
//! Each mounted widget gets its own session: a conversation, an event queue
//! and a task draining it. Sessions share nothing but the completion client.
//!
//! A widget whose page closes never says goodbye, so sessions nobody has
//! touched or subscribed to for the idle TTL are swept away.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;
pub use traits::*;

use crate::conversation::{Conversation, ConversationSnapshot, Message};
use crate::prompt::Persona;
use crate::state_machine::Event;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const EVENT_QUEUE_CAPACITY: usize = 32;
const BROADCAST_CAPACITY: usize = 128;
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

type SessionMap = Arc<RwLock<HashMap<String, SessionHandle>>>;

/// Events pushed to subscribers of a session
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// `index` is the message's position in the history
    Message { index: usize, message: Message },
    StateChange { pending: bool },
    ReplyDone,
}

/// Errors reaching a session
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),
    #[error("Session closed: {0}")]
    Closed(String),
}

/// Handle to interact with a running session
#[derive(Clone, Debug)]
pub struct SessionHandle {
    id: String,
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    conversation: Arc<RwLock<Conversation>>,
    last_active: Arc<Mutex<Instant>>,
    shutdown: CancellationToken,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Forward a submission to the session.
    ///
    /// Blank text and submissions while a reply is pending are dropped by
    /// the session itself; only a dead session is reported.
    pub async fn submit(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.event_tx
            .send(Event::UserSubmit { text: text.into() })
            .await
            .map_err(|_| SessionError::Closed(self.id.clone()))
    }

    /// Current history and pending flag, readable while a reply is pending
    pub async fn snapshot(&self) -> ConversationSnapshot {
        self.conversation.read().await.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.broadcast_tx.subscribe()
    }

    fn close(&self) {
        self.shutdown.cancel();
    }

    fn touch(&self) {
        *self
            .last_active
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    /// Untouched for `ttl` and nobody streaming its events
    fn is_idle(&self, now: Instant, ttl: Duration) -> bool {
        let last_active = *self
            .last_active
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.broadcast_tx.receiver_count() == 0 && now.duration_since(last_active) >= ttl
    }
}

/// Registry of all live sessions
pub struct SessionManager {
    llm_client: Arc<dyn LlmClient>,
    persona: Persona,
    sessions: SessionMap,
    shutdown: CancellationToken,
}

impl SessionManager {
    /// Create the registry and start sweeping sessions idle for `idle_ttl`.
    /// Must be called inside a tokio runtime.
    pub fn new(llm_client: Arc<dyn LlmClient>, persona: Persona, idle_ttl: Duration) -> Self {
        let sessions = SessionMap::default();
        let shutdown = CancellationToken::new();
        tokio::spawn(sweep_idle_sessions(
            sessions.clone(),
            idle_ttl,
            shutdown.child_token(),
        ));

        Self {
            llm_client,
            persona,
            sessions,
            shutdown,
        }
    }

    /// Create a session seeded with the greeting and start its runtime
    pub async fn create(&self) -> SessionHandle {
        let id = uuid::Uuid::new_v4().to_string();
        let conversation = Arc::new(RwLock::new(Conversation::new(
            id.clone(),
            self.persona.clone(),
        )));
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let shutdown = self.shutdown.child_token();

        let runtime = SessionRuntime::new(
            id.clone(),
            conversation.clone(),
            self.llm_client.clone(),
            event_rx,
            event_tx.clone(),
            broadcast_tx.clone(),
            shutdown.clone(),
        );
        tokio::spawn(runtime.run());

        let handle = SessionHandle {
            id: id.clone(),
            event_tx,
            broadcast_tx,
            conversation,
            last_active: Arc::new(Mutex::new(Instant::now())),
            shutdown,
        };
        self.sessions.write().await.insert(id.clone(), handle.clone());

        tracing::info!(
            session_id = %handle.id(),
            model = %self.llm_client.model_id(),
            "Session created"
        );
        handle
    }

    /// Look up a live session; counts as activity for the idle sweep
    pub async fn get(&self, id: &str) -> Result<SessionHandle, SessionError> {
        let handle = self
            .sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        handle.touch();
        Ok(handle)
    }

    pub async fn submit(&self, id: &str, text: impl Into<String>) -> Result<(), SessionError> {
        self.get(id).await?.submit(text).await
    }

    pub async fn snapshot(&self, id: &str) -> Result<ConversationSnapshot, SessionError> {
        Ok(self.get(id).await?.snapshot().await)
    }

    /// Drop a session and stop its runtime. A reply still in flight is
    /// discarded when it arrives.
    pub async fn discard(&self, id: &str) -> Result<(), SessionError> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        handle.close();
        tracing::info!(session_id = %id, "Session discarded");
        Ok(())
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn sweep_idle_sessions(
    sessions: SessionMap,
    idle_ttl: Duration,
    shutdown: CancellationToken,
) {
    let period = (idle_ttl / 2).clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL);
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }

        let now = Instant::now();
        sessions.write().await.retain(|id, handle| {
            if handle.is_idle(now, idle_ttl) {
                handle.close();
                tracing::info!(session_id = %id, "Idle session evicted");
                false
            } else {
                true
            }
        });
    }
}
