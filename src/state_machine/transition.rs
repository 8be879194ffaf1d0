//! Pure step transition function
//!
//! Given the current step, the stored data and one event, decide the next step
//! and the ordered effects the controller must run. No I/O happens here.

use super::effect::{Effect, Reply};
use super::event::Event;
use super::guard;
use super::state::{SessionData, SessionPatch, Step};
use crate::keyboards::{Action, Keyboard, RetryAction};
use crate::lexicon;
use crate::text::{bold_markup_to_html, preview_html, split_text, MAX_MESSAGE_LENGTH, PREVIEW_LENGTH};

/// Participant label used for the PDF when no name is stored
const DEFAULT_PDF_NAME: &str = "analysis";

/// Result of a step transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionResult {
    pub new_step: Step,
    pub effects: Vec<Effect>,
    /// False when the event fell through to the step's fallback responder
    pub matched: bool,
}

impl TransitionResult {
    pub fn new(step: Step) -> Self {
        Self {
            new_step: step,
            effects: vec![],
            matched: true,
        }
    }

    fn unmatched(step: Step, data: &SessionData) -> Self {
        Self {
            new_step: step,
            effects: vec![Effect::Reply(guard::fallback(step, data))],
            matched: false,
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }

    fn with_effect_first(mut self, effect: Effect) -> Self {
        self.effects.insert(0, effect);
        self
    }
}

/// Pure transition function
///
/// Deterministic: the same step, data and event always produce the same result.
pub fn transition(step: Step, data: &SessionData, event: Event) -> TransitionResult {
    if !guard::admits(step, &event) {
        return TransitionResult::unmatched(step, data);
    }

    match event {
        // ============================================================
        // Global events
        // ============================================================
        Event::Start => TransitionResult::new(Step::AwaitingFile)
            .with_effect(Effect::ResetSession {
                step: Step::AwaitingFile,
            })
            .with_effect(Effect::html_with(lexicon::WELCOME, Keyboard::start())),

        Event::Action(Action::Restart) => restart(),
        Event::Text { text } if lexicon::is_restart_phrase(&text) => restart(),

        Event::Action(Action::ExtractAnother) => {
            TransitionResult::new(Step::AwaitingParticipantName)
                .with_effect(Effect::DeleteOrigin)
                .with_effect(Effect::PersistStep)
                .with_effect(Effect::html(lexicon::WAITING_FOR_NAME))
        }

        Event::Action(Action::Retry(action)) => retry(step, data, action),

        // ============================================================
        // Upload
        // ============================================================
        Event::Document { file_id, file_name } => {
            if is_text_export(&file_name) {
                TransitionResult::new(Step::AwaitingParticipantName)
                    .with_effect(Effect::UpdateData(SessionPatch::file(file_id)))
                    .with_effect(Effect::PersistStep)
                    .with_effect(Effect::html(lexicon::FILE_RECEIVED))
            } else {
                TransitionResult::new(step).with_effect(Effect::html(lexicon::WRONG_FILE_FORMAT))
            }
        }

        Event::Text { text } => match step {
            Step::Initial | Step::AwaitingFile => TransitionResult::new(step).with_effect(
                Effect::html_with(lexicon::ASK_FILE_TEXT, Keyboard::Remove),
            ),
            Step::AwaitingParticipantName => participant_named(step, data, &text),
            Step::AwaitingHypothesis => hypothesis_given(step, data, &text),
            Step::MessagesExtracted | Step::AnalysisDone => TransitionResult::unmatched(step, data),
        },

        // ============================================================
        // Extraction
        // ============================================================
        Event::MessagesExtracted {
            participant,
            messages,
        } => {
            let count = messages.len();
            let text = messages.join("\n");
            if text.trim().is_empty() {
                return TransitionResult::new(step)
                    .with_effect(Effect::html(lexicon::messages_not_found(&participant)));
            }

            let summary = lexicon::extraction_summary(count, text.chars().count());
            let keyboard = Keyboard::actions(&participant);
            TransitionResult::new(Step::MessagesExtracted)
                .with_effect(Effect::UpdateData(SessionPatch::extraction(participant, text)))
                .with_effect(Effect::PersistStep)
                .with_effect(Effect::plain_with(summary, keyboard))
        }

        Event::Action(Action::StartTyping) => TransitionResult::new(Step::AwaitingHypothesis)
            .with_effect(Effect::DeleteOrigin)
            .with_effect(Effect::PersistStep)
            .with_effect(Effect::plain_with(lexicon::ASK_HYPOTHESIS, Keyboard::hypothesis())),

        // ============================================================
        // Hypothesis and analysis
        // ============================================================
        Event::Action(Action::HypothesisYes) => {
            TransitionResult::new(step).with_effect(Effect::EditOrigin {
                text: lexicon::WAIT_FOR_HYPOTHESIS_INPUT.to_string(),
            })
        }

        Event::Action(Action::HypothesisNo) => match analysis_request(data, None) {
            Some(request) => TransitionResult::new(step)
                .with_effect(Effect::EditOrigin {
                    text: lexicon::START_ANALYSIS_NO_HYPO.to_string(),
                })
                .with_effect(Effect::UpdateData(SessionPatch::hypothesis(None)))
                .with_effect(request),
            None => nothing_to_analyze(),
        },

        Event::AnalysisComplete { result } => {
            if result.trim().is_empty() {
                return retry_offer(step, RetryAction::RunAnalysis);
            }
            if data.extracted_text.as_deref().is_none_or(str::is_empty) {
                return nothing_to_analyze();
            }

            let preview = format!(
                "{}{}",
                lexicon::ANALYSIS_PREVIEW_HEADER,
                preview_html(&result, PREVIEW_LENGTH)
            );
            TransitionResult::new(Step::AnalysisDone)
                .with_effect(Effect::UpdateData(SessionPatch::analysis(result)))
                .with_effect(Effect::PersistStep)
                .with_effect(Effect::html_with(preview, Keyboard::analysis()))
        }

        // ============================================================
        // Results
        // ============================================================
        Event::Action(Action::ShowFull) => match data.analysis_result.as_deref() {
            Some(result) => TransitionResult::new(step)
                .with_effect(Effect::SendChunks {
                    chunks: split_text(&bold_markup_to_html(result), MAX_MESSAGE_LENGTH),
                })
                .with_effect(Effect::plain_with(
                    lexicon::ANALYSIS_ACTION_PROMPT,
                    Keyboard::analysis(),
                )),
            None => TransitionResult::new(step).with_effect(Effect::plain(lexicon::NO_ANALYSIS_TEXT)),
        },

        Event::Action(Action::DownloadPdf) => send_pdf(step, data),

        // ============================================================
        // Failures
        // ============================================================
        Event::ActionFailed { action } => retry_offer(step, action),

        Event::Unsupported => TransitionResult::unmatched(step, data),
    }
}

fn restart() -> TransitionResult {
    TransitionResult::new(Step::AwaitingFile)
        .with_effect(Effect::DeleteOrigin)
        .with_effect(Effect::ResetSession {
            step: Step::AwaitingFile,
        })
        .with_effect(Effect::plain_with(lexicon::RESTART_MESSAGE, Keyboard::start()))
        .with_effect(Effect::html(lexicon::WELCOME))
}

/// Re-run an action's logic regardless of the current step
fn retry(step: Step, data: &SessionData, action: RetryAction) -> TransitionResult {
    let base = TransitionResult::new(step).with_effect(Effect::DeleteOrigin);
    match action {
        RetryAction::ExtractMessages => TransitionResult {
            new_step: Step::AwaitingParticipantName,
            ..base
        }
        .with_effect(Effect::PersistStep)
        .with_effect(Effect::html(lexicon::WAITING_FOR_NAME)),

        RetryAction::RunAnalysis => match analysis_request(data, data.hypothesis.clone()) {
            Some(request) => base
                .with_effect(Effect::plain(lexicon::RERUNNING_ANALYSIS))
                .with_effect(request),
            None => nothing_to_analyze().with_effect_first(Effect::DeleteOrigin),
        },

        RetryAction::DownloadPdf => {
            let pdf = send_pdf(step, data);
            base.with_effects(pdf.effects)
        }
    }
}

fn participant_named(step: Step, data: &SessionData, text: &str) -> TransitionResult {
    let participant = text.trim();
    if participant.is_empty() {
        return TransitionResult::new(step).with_effect(Effect::html(lexicon::WAITING_FOR_NAME));
    }

    let Some(file_id) = data.file_id.clone() else {
        return TransitionResult::new(Step::AwaitingFile)
            .with_effect(Effect::PersistStep)
            .with_effect(Effect::plain_with(lexicon::FILE_DOWNLOAD_ERROR, Keyboard::start()));
    };

    TransitionResult::new(step)
        .with_effect(Effect::plain(lexicon::searching_for(participant)))
        .with_effect(Effect::ExtractMessages {
            file_id,
            participant: participant.to_string(),
        })
}

fn hypothesis_given(step: Step, data: &SessionData, text: &str) -> TransitionResult {
    let hypothesis = Some(text.trim().to_string()).filter(|h| !h.is_empty());
    let Some(request) = analysis_request(data, hypothesis.clone()) else {
        return nothing_to_analyze();
    };

    let notice = match hypothesis.as_deref() {
        Some(h) => Effect::html(lexicon::hypothesis_accepted(h)),
        None => Effect::plain(lexicon::START_ANALYSIS_NO_HYPO),
    };
    TransitionResult::new(step)
        .with_effect(Effect::UpdateData(SessionPatch::hypothesis(hypothesis)))
        .with_effect(notice)
        .with_effect(request)
}

fn analysis_request(data: &SessionData, hypothesis: Option<String>) -> Option<Effect> {
    let text = data.extracted_text.as_deref().filter(|t| !t.is_empty())?;
    Some(Effect::RequestAnalysis {
        text: text.to_string(),
        hypothesis,
    })
}

fn nothing_to_analyze() -> TransitionResult {
    TransitionResult::new(Step::AwaitingFile)
        .with_effect(Effect::PersistStep)
        .with_effect(Effect::plain_with(lexicon::NOTHING_TO_ANALYZE, Keyboard::start()))
}

fn send_pdf(step: Step, data: &SessionData) -> TransitionResult {
    match data.analysis_result.as_deref() {
        Some(text) => TransitionResult::new(step).with_effect(Effect::SendPdf {
            text: text.to_string(),
            participant: data
                .current_user
                .clone()
                .unwrap_or_else(|| DEFAULT_PDF_NAME.to_string()),
        }),
        None => TransitionResult::new(step).with_effect(Effect::plain(lexicon::NO_ANALYSIS_TEXT)),
    }
}

fn retry_offer(step: Step, action: RetryAction) -> TransitionResult {
    let text = match action {
        RetryAction::ExtractMessages => lexicon::EXTRACTION_FAILED,
        RetryAction::RunAnalysis => lexicon::ANALYSIS_FAILED,
        RetryAction::DownloadPdf => lexicon::PDF_ERROR,
    };
    TransitionResult::new(step).with_effect(Effect::reply(
        Reply::plain(text).with_keyboard(Keyboard::retry(action)),
    ))
}

/// A file is accepted when its name ends in `.txt`, in any letter case
fn is_text_export(file_name: &str) -> bool {
    std::path::Path::new(file_name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
}
