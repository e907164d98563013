//! Pure state transition function

use super::{ChatState, Effect, Event, SessionContext};
use crate::conversation::Message;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ChatState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ChatState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Reasons an event leaves the session untouched
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Message is empty")]
    EmptyMessage,
    #[error("A reply is still pending, message dropped")]
    Busy,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs and performs no
/// I/O. An `Err` means the event is dropped and the state is unchanged.
pub fn transition(
    state: &ChatState,
    context: &SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // Blank input is ignored in every state
        (_, Event::UserSubmit { text }) if text.trim().is_empty() => {
            Err(TransitionError::EmptyMessage)
        }

        (ChatState::Idle, Event::UserSubmit { text }) => {
            let question = text.trim();
            let prompt = context.persona.build_prompt(question);
            Ok(TransitionResult::new(ChatState::AwaitingResponse)
                .with_effect(Effect::append(Message::user(question)))
                .with_effect(Effect::NotifyStateChange { pending: true })
                .with_effect(Effect::RequestCompletion { prompt }))
        }

        // At most one request in flight: drop, don't queue
        (ChatState::AwaitingResponse, Event::UserSubmit { .. }) => Err(TransitionError::Busy),

        (ChatState::AwaitingResponse, Event::CompletionReady { text }) => {
            let reply = text
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| context.persona.empty_reply_notice.clone());
            Ok(finish_exchange(Message::model(reply)))
        }

        (ChatState::AwaitingResponse, Event::CompletionFailed) => Ok(finish_exchange(
            Message::model(context.persona.service_error_notice.clone()),
        )),

        // Only completions are left for Idle
        (ChatState::Idle, event) => Err(TransitionError::InvalidTransition(format!(
            "{event:?} while no request is pending"
        ))),
    }
}

fn finish_exchange(reply: Message) -> TransitionResult {
    TransitionResult::new(ChatState::Idle)
        .with_effect(Effect::append(reply))
        .with_effect(Effect::NotifyStateChange { pending: false })
        .with_effect(Effect::NotifyReplyDone)
}
