//! Step guard: which inbound events each step accepts
//!
//! The table is static. Anything it does not admit goes to the fallback
//! responder for the step's group and never touches the session.

use super::effect::Reply;
use super::event::Event;
use super::state::{SessionData, Step};
use crate::keyboards::{Action, Keyboard};
use crate::lexicon;

/// Whether a transition is registered for `event` at `step`
pub fn admits(step: Step, event: &Event) -> bool {
    match event {
        // Accepted everywhere
        Event::Start
        | Event::Action(Action::Restart | Action::ExtractAnother | Action::Retry(_))
        | Event::MessagesExtracted { .. }
        | Event::AnalysisComplete { .. }
        | Event::ActionFailed { .. } => true,

        Event::Text { text } if lexicon::is_restart_phrase(text) => true,
        Event::Text { text } => match step {
            Step::Initial | Step::AwaitingFile => text == lexicon::UPLOAD_BUTTON,
            Step::AwaitingParticipantName | Step::AwaitingHypothesis => true,
            Step::MessagesExtracted | Step::AnalysisDone => false,
        },

        Event::Document { .. } => step.awaits_upload(),

        Event::Action(action) => matches!(
            (step, action),
            (Step::MessagesExtracted, Action::StartTyping)
                | (
                    Step::AwaitingHypothesis,
                    Action::HypothesisYes | Action::HypothesisNo
                )
                | (Step::AnalysisDone, Action::ShowFull | Action::DownloadPdf)
        ),

        Event::Unsupported => false,
    }
}

/// Fallback responder groups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Mid-flow with extracted data: re-offer the extraction actions
    Actions,
    /// Post-analysis: re-offer the result actions
    Analysis,
    /// Initial or unknown position: point back to the upload
    Unknown,
}

impl Fallback {
    pub fn for_step(step: Step) -> Self {
        match step {
            Step::MessagesExtracted => Fallback::Actions,
            Step::AnalysisDone => Fallback::Analysis,
            Step::Initial
            | Step::AwaitingFile
            | Step::AwaitingParticipantName
            | Step::AwaitingHypothesis => Fallback::Unknown,
        }
    }
}

/// Corrective prompt for an event the current step does not accept
pub fn fallback(step: Step, data: &SessionData) -> Reply {
    match Fallback::for_step(step) {
        Fallback::Actions => {
            let participant = data
                .current_user
                .as_deref()
                .unwrap_or(lexicon::CURRENT_PARTICIPANT);
            Reply::plain(lexicon::FALLBACK_ACTIONS).with_keyboard(Keyboard::actions(participant))
        }
        Fallback::Analysis => {
            Reply::plain(lexicon::FALLBACK_ANALYSIS).with_keyboard(Keyboard::analysis())
        }
        Fallback::Unknown => {
            Reply::plain(lexicon::FALLBACK_UNKNOWN).with_keyboard(Keyboard::start())
        }
    }
}
