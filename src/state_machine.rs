//! Conversation state machine
//!
//! Implements the Elm Architecture pattern with pure step transitions: the
//! guard decides whether an event is accepted, `transition` turns it into a new
//! step plus effects, and the runtime executes those effects.

pub mod effect;
pub mod event;
pub mod guard;
pub mod state;
pub(crate) mod transition;


pub use effect::{Effect, Reply, TextFormat};
pub use event::{Event, Inbound, MessageRef};
pub use state::{Session, SessionData, SessionPatch, Step};
pub use transition::{transition, TransitionResult};
