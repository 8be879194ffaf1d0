//! Session state types

use serde::{Deserialize, Serialize};

// ============================================================================
// Step
// ============================================================================

/// Position of a user in the conversation flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Nothing recorded for this user yet; behaves like `AwaitingFile`
    #[default]
    Initial,
    AwaitingFile,
    AwaitingParticipantName,
    MessagesExtracted,
    AwaitingHypothesis,
    AnalysisDone,
}

impl Step {
    /// Every declared step, in flow order
    pub const ALL: [Step; 6] = [
        Step::Initial,
        Step::AwaitingFile,
        Step::AwaitingParticipantName,
        Step::MessagesExtracted,
        Step::AwaitingHypothesis,
        Step::AnalysisDone,
    ];

    /// Whether the step is at or past the point where messages were extracted
    pub fn has_extracted_messages(self) -> bool {
        matches!(
            self,
            Step::MessagesExtracted | Step::AwaitingHypothesis | Step::AnalysisDone
        )
    }

    /// Whether an analysis result exists at this step
    pub fn has_analysis(self) -> bool {
        matches!(self, Step::AnalysisDone)
    }

    /// Whether this step waits for a chat export upload
    pub fn awaits_upload(self) -> bool {
        matches!(self, Step::Initial | Step::AwaitingFile)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Step::Initial => "initial",
            Step::AwaitingFile => "awaiting_file",
            Step::AwaitingParticipantName => "awaiting_participant_name",
            Step::MessagesExtracted => "messages_extracted",
            Step::AwaitingHypothesis => "awaiting_hypothesis",
            Step::AnalysisDone => "analysis_done",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Session data
// ============================================================================

/// Data accumulated while a user walks through the flow
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    /// Delivery-channel handle of the uploaded chat export
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    /// Unique messages of the chosen participant, joined by newlines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
    /// Name of the participant being analyzed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_user: Option<String>,
    /// Full text returned by the analysis edge
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hypothesis: Option<String>,
}

impl SessionData {
    /// Shallow merge: fields present in `patch` overwrite, the rest are kept
    pub fn merge(&mut self, patch: SessionPatch) {
        let SessionPatch {
            file_id,
            extracted_text,
            current_user,
            analysis_result,
            hypothesis,
        } = patch;

        if let Some(file_id) = file_id {
            self.file_id = Some(file_id);
        }
        if let Some(text) = extracted_text {
            self.extracted_text = Some(text);
        }
        if let Some(user) = current_user {
            self.current_user = Some(user);
        }
        if let Some(result) = analysis_result {
            self.analysis_result = Some(result);
        }
        if let Some(hypothesis) = hypothesis {
            self.hypothesis = hypothesis;
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == SessionData::default()
    }
}

/// Partial update applied with [`SessionData::merge`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPatch {
    pub file_id: Option<String>,
    pub extracted_text: Option<String>,
    pub current_user: Option<String>,
    pub analysis_result: Option<String>,
    /// `Some(None)` clears a stored hypothesis
    pub hypothesis: Option<Option<String>>,
}

impl SessionPatch {
    pub fn file(file_id: impl Into<String>) -> Self {
        Self {
            file_id: Some(file_id.into()),
            ..Self::default()
        }
    }

    pub fn extraction(participant: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            current_user: Some(participant.into()),
            extracted_text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn hypothesis(hypothesis: Option<String>) -> Self {
        Self {
            hypothesis: Some(hypothesis),
            ..Self::default()
        }
    }

    pub fn analysis(result: impl Into<String>) -> Self {
        Self {
            analysis_result: Some(result.into()),
            ..Self::default()
        }
    }
}

/// Step and data of one user, as read from the session store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub step: Step,
    pub data: SessionData,
}

impl Session {
    /// Check the step/data coupling the controller maintains
    pub fn is_consistent(&self) -> bool {
        let has_text = self
            .data
            .extracted_text
            .as_deref()
            .is_some_and(|t| !t.is_empty());
        let has_result = self
            .data
            .analysis_result
            .as_deref()
            .is_some_and(|t| !t.is_empty());

        (!self.step.has_extracted_messages() || has_text)
            && (!self.step.has_analysis() || has_result)
    }
}
