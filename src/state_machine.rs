//! Chat session state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.

mod effect;
mod event;
mod state;
mod transition;


pub use effect::Effect;
pub use event::Event;
pub use state::{ChatState, SessionContext};
pub use transition::{transition, TransitionError};
