//! Analysis prompt construction

use crate::llm::{GenerationParams, LlmRequest};

/// Sampling used for every analysis call
pub const ANALYSIS_GENERATION: GenerationParams = GenerationParams {
    max_tokens: Some(8192),
    temperature: Some(0.7),
    top_p: Some(1.0),
    top_k: Some(1),
};

const ANALYSIS_INSTRUCTIONS: &str = r"You are an experienced socionics typist. Below are chat messages written by a single person. Determine their most likely socionics type (one of the 16 sociotypes).

Work through the following:
1. **Information metabolism.** Which functions show up in the vocabulary, the topics and the way arguments are built? Quote short fragments as evidence.
2. **Dichotomies.** Assess extraversion/introversion, intuition/sensing, logic/ethics, rationality/irrationality, each with a short justification.
3. **Model A.** Name the leading and creative functions, then the vulnerable and suggestive ones, and show where they appear in the messages.
4. **Verdict.** Give the most likely type with a confidence estimate, and one or two alternatives with what would distinguish them.

Rules:
- Rely only on the messages; do not invent biography.
- The messages are fragments of a conversation, so treat short replies with care.
- Use **double asterisks** for headings and key terms. Do not use other markup.
";

const HYPOTHESIS_SECTION: &str = r"
The user suspects the following type(s): {hypothesis}. Check this guess explicitly: list the evidence for and against it, and say whether you confirm or reject it.
";

/// Instructions, the optional hypothesis check, then the messages verbatim
pub fn analysis_prompt(messages_text: &str, hypothesis: Option<&str>) -> String {
    let mut prompt = ANALYSIS_INSTRUCTIONS.to_string();
    if let Some(h) = hypothesis.map(str::trim).filter(|h| !h.is_empty()) {
        prompt.push_str(&HYPOTHESIS_SECTION.replace("{hypothesis}", h));
    }
    prompt.push_str("\nMessages:\n");
    prompt.push_str(messages_text);
    prompt
}

/// Request sent to the analysis edge
pub fn analysis_request(messages_text: &str, hypothesis: Option<&str>) -> LlmRequest {
    LlmRequest::prompt(analysis_prompt(messages_text, hypothesis)).with_generation(ANALYSIS_GENERATION)
}
