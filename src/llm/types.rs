//! Common types for LLM interactions

/// LLM request
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub messages: Vec<LlmMessage>,
    pub generation: GenerationParams,
}

impl LlmRequest {
    /// Single user turn
    pub fn prompt(text: impl Into<String>) -> Self {
        Self {
            messages: vec![LlmMessage::user(text)],
            generation: GenerationParams::default(),
        }
    }

    pub fn with_generation(mut self, generation: GenerationParams) -> Self {
        self.generation = generation;
        self
    }
}

/// Sampling parameters; `None` leaves the provider default
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
}

/// User turn in conversation
#[derive(Debug, Clone)]
pub struct LlmMessage {
    pub text: String,
}

impl LlmMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// LLM response
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    /// Concatenated text parts of the first candidate
    pub text: String,
    pub finish_reason: Option<String>,
    pub usage: Usage,
}

/// Usage statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}
