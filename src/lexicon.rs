//! User-facing texts
//!
//! Texts sent with HTML formatting are marked in their doc comment; everything
//! interpolated into them goes through [`escape_html`].

use crate::text::escape_html;

// Buttons

pub const UPLOAD_BUTTON: &str = "📥 Upload chat";
pub const RESTART_BUTTON: &str = "🔄 Start over";
pub const OTHER_PARTICIPANT_BUTTON: &str = "👤 Pick another participant";
pub const HYPOTHESIS_YES_BUTTON: &str = "✅ Yes, I have guesses";
pub const HYPOTHESIS_NO_BUTTON: &str = "❌ No, up to you";
pub const SHOW_FULL_BUTTON: &str = "📄 Show in full";
pub const DOWNLOAD_PDF_BUTTON: &str = "💾 Download PDF";
pub const ANALYZE_OTHER_BUTTON: &str = "👤 Analyze someone else";
pub const RETRY_BUTTON: &str = "🔄 Try again";
pub const RESTART_WITH_NEW_FILE_BUTTON: &str = "🔄 Start over with a new file";

pub fn analyze_button(participant: &str) -> String {
    format!("🧠 Analyze '{participant}'")
}

/// Whether a plain-text message asks to restart the flow
pub fn is_restart_phrase(text: &str) -> bool {
    let text = text.trim();
    text.eq_ignore_ascii_case(RESTART_BUTTON) || text.eq_ignore_ascii_case("restart")
}

// Flow

/// HTML
pub const WELCOME: &str = "👋 Hi! I build a socionics profile of a chat participant.\n\n\
1. Export a chat as a <b>.txt</b> file.\n\
2. Send it to me.\n\
3. Tell me whose messages to analyze.\n\n\
Press <b>📥 Upload chat</b> to begin.";

pub const RESTART_MESSAGE: &str = "Session cleared. Let's start again.";

/// HTML
pub const ASK_FILE_TEXT: &str = "Send the chat export as a <b>.txt</b> document.\n\n\
Each message must look like <code>Name (time): text</code>.";

/// HTML
pub const WRONG_FILE_FORMAT: &str = "❌ Only <b>.txt</b> files are accepted. Please send the export as a text file.";

/// HTML
pub const FILE_RECEIVED: &str = "✅ File received.\n\nNow send the participant's name <b>exactly</b> as it appears in the chat.";

/// HTML
pub const WAITING_FOR_NAME: &str = "Send the participant's name <b>exactly</b> as it appears in the chat.";

pub fn searching_for(participant: &str) -> String {
    format!("Looking for messages from '{participant}'... Large chats may take up to a minute. ⏳")
}

pub const FILE_DOWNLOAD_ERROR: &str = "I could not find your file. Please upload the chat export again.";

pub const EXTRACTION_FAILED: &str = "I could not read the file. It may be a temporary problem, please try again.";

/// HTML
pub fn messages_not_found(participant: &str) -> String {
    format!(
        "🤷 No messages from <b>{}</b> were found.\n\nCheck the spelling (case matters) and send the name again.",
        escape_html(participant)
    )
}

pub fn extraction_summary(unique_messages: usize, total_chars: usize) -> String {
    format!(
        "✅ Unique messages found: {unique_messages}.\nTotal text length: {total_chars} characters."
    )
}

pub const ASK_HYPOTHESIS: &str = "Do you already have guesses about the type? They will be checked in the analysis.";

pub const WAIT_FOR_HYPOTHESIS_INPUT: &str = "Send your guesses in one message, for example: \"ILE or LII\".";

pub const START_ANALYSIS_NO_HYPO: &str = "Starting the analysis without guesses... 🧠 This can take a few minutes.";

/// HTML
pub fn hypothesis_accepted(hypothesis: &str) -> String {
    format!(
        "Got it! Analyzing with your guesses in mind: <b>{}</b>... 🧠 This can take a few minutes.",
        escape_html(hypothesis)
    )
}

pub const RERUNNING_ANALYSIS: &str = "Restarting the analysis...";

pub const NOTHING_TO_ANALYZE: &str = "There are no extracted messages to analyze. Please upload the chat again.";

pub const ANALYSIS_FAILED: &str = "The analysis service did not answer. It may be a temporary problem, please try again.";

/// HTML
pub const ANALYSIS_PREVIEW_HEADER: &str = "<b>📊 Analysis preview:</b>\n\n";

pub const ANALYSIS_ACTION_PROMPT: &str = "What next?";

pub const NO_ANALYSIS_TEXT: &str = "The analysis text could not be found.";

// PDF

pub const PDF_PREPARING: &str = "Preparing the PDF...";
pub const PDF_CAPTION: &str = "📄 Your analysis";
pub const PDF_ERROR: &str = "The PDF could not be created. Please try again.";
pub const PDF_TITLE: &str = "Socionics analysis";

// Fallbacks

pub const FALLBACK_ACTIONS: &str = "Please choose one of the options below.";
pub const FALLBACK_ANALYSIS: &str = "The analysis is ready. Use the buttons below.";
pub const FALLBACK_UNKNOWN: &str = "I did not understand that. Upload a chat export to begin, or start over.";

pub const STORAGE_ERROR: &str = "Your progress could not be saved. Please repeat the last step.";

/// Stand-in when no participant name is stored
pub const CURRENT_PARTICIPANT: &str = "the current participant";
