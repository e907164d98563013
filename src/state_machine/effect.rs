//! Effects produced by state transitions

use crate::conversation::Message;

/// Effects to be carried out after a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Append to the history. `Conversation::apply` performs the append;
    /// the runtime only announces it.
    AppendMessage { message: Message },

    /// Send the prompt to the completion service
    RequestCompletion { prompt: String },

    /// Tell subscribers whether a reply is pending
    NotifyStateChange { pending: bool },

    /// Tell subscribers the exchange is finished
    NotifyReplyDone,
}

impl Effect {
    pub fn append(message: Message) -> Self {
        Effect::AppendMessage { message }
    }
}
