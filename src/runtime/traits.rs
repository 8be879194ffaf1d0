//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the controller with mock implementations.

use crate::llm::{LlmError, LlmService};
use crate::pdf::PdfError;
use crate::prompt;
use crate::state_machine::{MessageRef, Reply};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Delivery channel failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The target message no longer exists or cannot be changed
    #[error("Message is gone")]
    MessageGone,
    /// The channel refused the message markup
    #[error("Markup rejected: {0}")]
    Rejected(String),
    #[error("Delivery API error: {0}")]
    Api(String),
    #[error("Network error: {0}")]
    Network(String),
}

/// A rendered PDF waiting to be delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPdf {
    /// Transient file on local disk, removed after delivery
    pub path: PathBuf,
    /// Name the user sees
    pub file_name: String,
}

/// Outbound primitives of the delivery channel
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a message, returning a reference for later edits
    async fn send(&self, chat_id: i64, reply: &Reply) -> Result<MessageRef, TransportError>;

    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<(), TransportError>;

    async fn delete(&self, message: MessageRef) -> Result<(), TransportError>;

    /// Deliver a local file as a document
    async fn send_file(
        &self,
        chat_id: i64,
        file: &RenderedPdf,
        caption: &str,
    ) -> Result<(), TransportError>;

    /// Download an uploaded artifact by its channel handle
    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>, TransportError>;
}

/// The personality analysis edge
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, text: &str, hypothesis: Option<&str>) -> Result<String, LlmError>;
}

/// Text to PDF rendering
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render(&self, text: &str, participant: &str) -> Result<RenderedPdf, PdfError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, chat_id: i64, reply: &Reply) -> Result<MessageRef, TransportError> {
        (**self).send(chat_id, reply).await
    }

    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<(), TransportError> {
        (**self).edit_text(message, text).await
    }

    async fn delete(&self, message: MessageRef) -> Result<(), TransportError> {
        (**self).delete(message).await
    }

    async fn send_file(
        &self,
        chat_id: i64,
        file: &RenderedPdf,
        caption: &str,
    ) -> Result<(), TransportError> {
        (**self).send_file(chat_id, file, caption).await
    }

    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>, TransportError> {
        (**self).fetch_file(file_id).await
    }
}

#[async_trait]
impl<T: Analyzer + ?Sized> Analyzer for Arc<T> {
    async fn analyze(&self, text: &str, hypothesis: Option<&str>) -> Result<String, LlmError> {
        (**self).analyze(text, hypothesis).await
    }
}

#[async_trait]
impl<T: PdfRenderer + ?Sized> PdfRenderer for Arc<T> {
    async fn render(&self, text: &str, participant: &str) -> Result<RenderedPdf, PdfError> {
        (**self).render(text, participant).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Analysis through an LLM service, bounded by a timeout
pub struct LlmAnalyzer {
    llm: Arc<dyn LlmService>,
    timeout: Duration,
}

impl LlmAnalyzer {
    pub fn new(llm: Arc<dyn LlmService>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }
}

#[async_trait]
impl Analyzer for LlmAnalyzer {
    async fn analyze(&self, text: &str, hypothesis: Option<&str>) -> Result<String, LlmError> {
        let request = prompt::analysis_request(text, hypothesis);

        let response = tokio::time::timeout(self.timeout, self.llm.complete(&request))
            .await
            .map_err(|_| {
                LlmError::timeout(format!(
                    "Analysis exceeded {}s",
                    self.timeout.as_secs()
                ))
            })??;

        if response.text.trim().is_empty() {
            return Err(LlmError::unknown("Analysis returned no text"));
        }
        Ok(response.text)
    }
}
