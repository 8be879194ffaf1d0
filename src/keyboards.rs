//! Action tokens and the keyboards that carry them

use crate::lexicon;

/// Actions whose logic can be re-run from a retry offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryAction {
    ExtractMessages,
    RunAnalysis,
    DownloadPdf,
}

impl RetryAction {
    pub const ALL: [RetryAction; 3] = [
        RetryAction::ExtractMessages,
        RetryAction::RunAnalysis,
        RetryAction::DownloadPdf,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RetryAction::ExtractMessages => "extract_messages",
            RetryAction::RunAnalysis => "run_analysis",
            RetryAction::DownloadPdf => "download_pdf",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == name)
    }
}

/// Named action token attached to an inline button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Restart,
    ExtractAnother,
    StartTyping,
    HypothesisYes,
    HypothesisNo,
    ShowFull,
    DownloadPdf,
    Retry(RetryAction),
}

const RETRY_PREFIX: &str = "retry:";

impl Action {
    /// Wire token sent back by the delivery channel when the button is pressed
    pub fn token(self) -> String {
        match self {
            Action::Restart => "restart".to_string(),
            Action::ExtractAnother => "extract_another".to_string(),
            Action::StartTyping => "start_typing".to_string(),
            Action::HypothesisYes => "hypo_yes".to_string(),
            Action::HypothesisNo => "hypo_no".to_string(),
            Action::ShowFull => "show_full_analysis".to_string(),
            Action::DownloadPdf => "download_pdf".to_string(),
            Action::Retry(action) => format!("{RETRY_PREFIX}{}", action.as_str()),
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        if let Some(name) = token.strip_prefix(RETRY_PREFIX) {
            return RetryAction::parse(name).map(Action::Retry);
        }
        match token {
            "restart" => Some(Action::Restart),
            "extract_another" => Some(Action::ExtractAnother),
            "start_typing" => Some(Action::StartTyping),
            "hypo_yes" => Some(Action::HypothesisYes),
            "hypo_no" => Some(Action::HypothesisNo),
            "show_full_analysis" => Some(Action::ShowFull),
            "download_pdf" => Some(Action::DownloadPdf),
            _ => None,
        }
    }

    /// Short notice shown by the channel when the button press is acknowledged
    pub fn ack_text(self) -> Option<&'static str> {
        match self {
            Action::DownloadPdf | Action::Retry(RetryAction::DownloadPdf) => {
                Some(lexicon::PDF_PREPARING)
            }
            _ => None,
        }
    }
}

/// A button that sends an action token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: Action,
}

impl Button {
    pub fn new(label: impl Into<String>, action: Action) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// Keyboard attached to an outbound prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    /// Buttons under the message, rows of action buttons
    Inline(Vec<Vec<Button>>),
    /// Persistent reply keyboard whose labels are sent back as plain text
    Reply(Vec<Vec<String>>),
    /// Hide a previously shown reply keyboard
    Remove,
}

impl Keyboard {
    /// Reply keyboard offered at the start of the flow
    pub fn start() -> Self {
        Keyboard::Reply(vec![vec![lexicon::UPLOAD_BUTTON.to_string()]])
    }

    /// Choices after messages were extracted
    pub fn actions(participant: &str) -> Self {
        Keyboard::Inline(vec![
            vec![Button::new(
                lexicon::analyze_button(participant),
                Action::StartTyping,
            )],
            vec![Button::new(lexicon::OTHER_PARTICIPANT_BUTTON, Action::ExtractAnother)],
            vec![Button::new(lexicon::RESTART_BUTTON, Action::Restart)],
        ])
    }

    pub fn hypothesis() -> Self {
        Keyboard::Inline(vec![vec![
            Button::new(lexicon::HYPOTHESIS_YES_BUTTON, Action::HypothesisYes),
            Button::new(lexicon::HYPOTHESIS_NO_BUTTON, Action::HypothesisNo),
        ]])
    }

    /// Choices once an analysis result exists
    pub fn analysis() -> Self {
        Keyboard::Inline(vec![
            vec![Button::new(lexicon::SHOW_FULL_BUTTON, Action::ShowFull)],
            vec![Button::new(lexicon::DOWNLOAD_PDF_BUTTON, Action::DownloadPdf)],
            vec![Button::new(lexicon::ANALYZE_OTHER_BUTTON, Action::ExtractAnother)],
            vec![Button::new(lexicon::RESTART_BUTTON, Action::Restart)],
        ])
    }

    pub fn retry(action: RetryAction) -> Self {
        Keyboard::Inline(vec![
            vec![Button::new(lexicon::RETRY_BUTTON, Action::Retry(action))],
            vec![Button::new(lexicon::RESTART_WITH_NEW_FILE_BUTTON, Action::Restart)],
        ])
    }

    /// All action tokens reachable from this keyboard
    pub fn actions_offered(&self) -> Vec<Action> {
        match self {
            Keyboard::Inline(rows) => rows.iter().flatten().map(|b| b.action).collect(),
            Keyboard::Reply(_) | Keyboard::Remove => Vec::new(),
        }
    }
}
