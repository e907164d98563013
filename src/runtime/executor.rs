//! Session runtime executor

use super::traits::LlmClient;
use super::SessionEvent;

use crate::conversation::Conversation;
use crate::llm::LlmRequest;
use crate::state_machine::{Effect, Event, TransitionError};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_util::sync::CancellationToken;

/// Drives one conversation: consumes events in order, applies them, and
/// carries out the resulting effects.
pub struct SessionRuntime<L>
where
    L: LlmClient + 'static,
{
    session_id: String,
    conversation: Arc<RwLock<Conversation>>,
    llm_client: Arc<L>,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    shutdown: CancellationToken,
}

impl<L> SessionRuntime<L>
where
    L: LlmClient + 'static,
{
    pub fn new(
        session_id: String,
        conversation: Arc<RwLock<Conversation>>,
        llm_client: L,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::Sender<Event>,
        broadcast_tx: broadcast::Sender<SessionEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            session_id,
            conversation,
            llm_client: Arc::new(llm_client),
            event_rx,
            event_tx,
            broadcast_tx,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.session_id, "Starting session runtime");

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                Some(event) = self.event_rx.recv() => self.process_event(event).await,
                else => break,
            }
        }

        tracing::info!(session_id = %self.session_id, "Session runtime stopped");
    }

    async fn process_event(&mut self, event: Event) {
        // Apply under the write lock; readers see either the old or the new
        // state, never a half-applied one.
        let (result, mut next_index) = {
            let mut conversation = self.conversation.write().await;
            let next_index = conversation.history().len();
            (conversation.apply(event), next_index)
        };

        let effects = match result {
            Ok(effects) => effects,
            Err(e @ (TransitionError::EmptyMessage | TransitionError::Busy)) => {
                tracing::debug!(session_id = %self.session_id, reason = %e, "Submission ignored");
                return;
            }
            Err(e) => {
                tracing::warn!(session_id = %self.session_id, error = %e, "Event ignored");
                return;
            }
        };

        for effect in effects {
            self.execute_effect(effect, &mut next_index);
        }
    }

    /// `next_index` is the history position the next appended message took
    fn execute_effect(&self, effect: Effect, next_index: &mut usize) {
        match effect {
            Effect::AppendMessage { message } => {
                let index = *next_index;
                *next_index += 1;
                tracing::debug!(
                    session_id = %self.session_id,
                    index,
                    role = ?message.role(),
                    chars = message.text().chars().count(),
                    "Message appended"
                );
                self.notify(SessionEvent::Message { index, message });
            }
            Effect::NotifyStateChange { pending } => {
                self.notify(SessionEvent::StateChange { pending });
            }
            Effect::NotifyReplyDone => {
                self.notify(SessionEvent::ReplyDone);
            }
            Effect::RequestCompletion { prompt } => {
                self.spawn_completion(prompt);
            }
        }
    }

    fn notify(&self, event: SessionEvent) {
        // No subscribers is normal
        let _ = self.broadcast_tx.send(event);
    }

    /// The completion runs in its own task so the loop keeps turning away
    /// submissions while it is outstanding.
    fn spawn_completion(&self, prompt: String) {
        let llm_client = self.llm_client.clone();
        let event_tx = self.event_tx.clone();
        let session_id = self.session_id.clone();

        tokio::spawn(async move {
            let request = LlmRequest::single_turn(prompt);

            let event = match llm_client.complete(&request).await {
                Ok(response) => Event::CompletionReady {
                    text: response.text,
                },
                Err(e) => {
                    tracing::error!(
                        session_id = %session_id,
                        kind = ?e.kind,
                        error = %e.message,
                        "Completion failed, replying with error notice"
                    );
                    Event::CompletionFailed
                }
            };

            if event_tx.send(event).await.is_err() {
                tracing::debug!(session_id = %session_id, "Session gone before completion arrived");
            }
        });
    }
}
