//! Effects produced by step transitions

use crate::keyboards::Keyboard;
use crate::state_machine::state::{SessionPatch, Step};

/// How the delivery channel should interpret message text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextFormat {
    #[default]
    Plain,
    Html,
}

/// An outbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<Keyboard>,
    pub format: TextFormat,
}

impl Reply {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
            format: TextFormat::Plain,
        }
    }

    pub fn html(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
            format: TextFormat::Html,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// Effects to be executed after a transition, in order.
///
/// Data updates always precede the step write so a crash between the two never
/// leaves a step pointing at data that was not stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send a message to the user's chat
    Reply(Reply),

    /// Send several HTML messages in sequence, paced by the controller
    SendChunks { chunks: Vec<String> },

    /// Replace the text of the message whose button was pressed
    EditOrigin { text: String },

    /// Remove the message whose button was pressed
    DeleteOrigin,

    /// Merge fields into the stored session data
    UpdateData(SessionPatch),

    /// Store the transition's new step
    PersistStep,

    /// Drop all session data and store `step` in a single write
    ResetSession { step: Step },

    /// Download the stored file and extract the participant's messages
    ExtractMessages { file_id: String, participant: String },

    /// Run the personality analysis
    RequestAnalysis {
        text: String,
        hypothesis: Option<String>,
    },

    /// Render the analysis as a PDF and send it as a document
    SendPdf { text: String, participant: String },
}

impl Effect {
    pub fn reply(reply: Reply) -> Self {
        Effect::Reply(reply)
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Effect::Reply(Reply::plain(text))
    }

    pub fn plain_with(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Effect::Reply(Reply::plain(text).with_keyboard(keyboard))
    }

    pub fn html(text: impl Into<String>) -> Self {
        Effect::Reply(Reply::html(text))
    }

    pub fn html_with(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Effect::Reply(Reply::html(text).with_keyboard(keyboard))
    }

    /// Whether executing this effect writes to the session store
    pub fn mutates_store(&self) -> bool {
        matches!(
            self,
            Effect::UpdateData(_) | Effect::PersistStep | Effect::ResetSession { .. }
        )
    }
}
