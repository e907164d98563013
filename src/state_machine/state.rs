//! Chat session state types

use crate::prompt::Persona;
use serde::Serialize;

/// Request state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatState {
    /// Ready for the next question
    #[default]
    Idle,
    /// A completion request is outstanding
    AwaitingResponse,
}

impl ChatState {
    pub fn is_pending(self) -> bool {
        matches!(self, ChatState::AwaitingResponse)
    }
}

/// Static context for a session, fixed at creation
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub persona: Persona,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>, persona: Persona) -> Self {
        Self {
            session_id: session_id.into(),
            persona,
        }
    }
}
