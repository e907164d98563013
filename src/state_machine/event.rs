//! Events that can occur in a chat session

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    /// Visitor pressed send (button or Enter)
    UserSubmit { text: String },

    /// The completion service answered; `text` is `None` when it had nothing
    CompletionReady { text: Option<String> },

    /// The completion call failed; the runtime has already logged why
    CompletionFailed,
}
