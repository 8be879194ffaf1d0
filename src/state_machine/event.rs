//! Events that drive a user's session

use crate::keyboards::{Action, RetryAction};

/// Events that trigger step transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // User events
    /// The `/start` command
    Start,
    /// Plain text message, including reply-keyboard labels
    Text { text: String },
    /// Uploaded document
    Document { file_id: String, file_name: String },
    /// Inline button press
    Action(Action),
    /// Anything else the channel delivers (stickers, photos, ...)
    Unsupported,

    // Outcome events, produced by effects
    MessagesExtracted {
        participant: String,
        messages: Vec<String>,
    },
    AnalysisComplete { result: String },
    ActionFailed { action: RetryAction },
}

impl Event {
    pub fn text(text: impl Into<String>) -> Self {
        Event::Text { text: text.into() }
    }

    /// Short label for logs, never includes user content
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Start => "start",
            Event::Text { .. } => "text",
            Event::Document { .. } => "document",
            Event::Action(_) => "action",
            Event::Unsupported => "unsupported",
            Event::MessagesExtracted { .. } => "messages_extracted",
            Event::AnalysisComplete { .. } => "analysis_complete",
            Event::ActionFailed { .. } => "action_failed",
        }
    }
}

/// A delivered message that can later be edited or deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i32,
}

/// One inbound update, addressed to a user's session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub user_id: u64,
    pub chat_id: i64,
    /// Message carrying the pressed button, for action events
    pub origin: Option<MessageRef>,
    pub event: Event,
}

impl Inbound {
    pub fn new(user_id: u64, chat_id: i64, event: Event) -> Self {
        Self {
            user_id,
            chat_id,
            origin: None,
            event,
        }
    }

    pub fn with_origin(mut self, origin: MessageRef) -> Self {
        self.origin = Some(origin);
        self
    }
}
