//! Conversation log of one chat widget
//!
//! `Conversation` owns the message history and the request state. All
//! mutation goes through [`Conversation::apply`], which runs the pure
//! transition and appends the messages it produces.

use crate::prompt::Persona;
use crate::state_machine::{transition, ChatState, Effect, Event, SessionContext, TransitionError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Model,
}

/// One turn of the conversation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    role: Role,
    text: String,
    created_at: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Role::Model, text)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    #[allow(dead_code)] // Exposed through serialization
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Read-only view handed to the presentation layer
///
/// `last_index` is the position of the newest message in `history`. Streamed
/// messages carry the same position, so anything at or below it is already
/// part of the snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSnapshot {
    pub id: String,
    pub history: Vec<Message>,
    pub last_index: usize,
    pub pending: bool,
}

/// Message history plus request state
#[derive(Debug)]
pub struct Conversation {
    context: SessionContext,
    state: ChatState,
    history: Vec<Message>,
}

impl Conversation {
    /// Start a conversation seeded with the persona's greeting
    pub fn new(session_id: impl Into<String>, persona: Persona) -> Self {
        let history = vec![Message::model(persona.greeting.clone())];
        Self {
            context: SessionContext::new(session_id, persona),
            state: ChatState::Idle,
            history,
        }
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    #[allow(dead_code)] // Inspected by tests; the view only needs `is_pending`
    pub fn state(&self) -> ChatState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state.is_pending()
    }

    /// Position of the newest message; the greeting is 0
    pub fn last_index(&self) -> usize {
        self.history.len() - 1
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            id: self.context.session_id.clone(),
            history: self.history().to_vec(),
            last_index: self.last_index(),
            pending: self.is_pending(),
        }
    }

    /// Feed one event through the state machine.
    ///
    /// On success the history and state are already updated; the returned
    /// effects are what the caller still has to carry out or announce.
    /// On error nothing changed.
    pub fn apply(&mut self, event: Event) -> Result<Vec<Effect>, TransitionError> {
        let result = transition(&self.state, &self.context, event)?;

        for effect in &result.effects {
            if let Effect::AppendMessage { message } = effect {
                self.history.push(message.clone());
            }
        }
        self.state = result.new_state;

        Ok(result.effects)
    }
}
