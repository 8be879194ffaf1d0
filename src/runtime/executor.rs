//! Conversation controller: runs transitions and executes their effects

use super::traits::{Analyzer, PdfRenderer, Transport, TransportError};
use crate::extraction;
use crate::keyboards::RetryAction;
use crate::lexicon;
use crate::state_machine::{
    transition, Effect, Event, Inbound, MessageRef, Reply, Session, Step, TextFormat,
    TransitionResult,
};
use crate::store::{SessionStore, StoreError};
use crate::text::html_to_plain;
use std::collections::VecDeque;
use std::time::Duration;

/// Pause between successive chunks of a long reply
const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(500);

/// Where effects of one inbound update are delivered
#[derive(Debug, Clone, Copy)]
struct Target {
    user_id: u64,
    chat_id: i64,
    origin: Option<MessageRef>,
}

/// Drives one user's session through the state machine.
///
/// Every external failure is converted into an outcome event and fed back
/// through `transition`, so nothing escapes `handle`.
pub struct Controller<T, A, P>
where
    T: Transport + 'static,
    A: Analyzer + 'static,
    P: PdfRenderer + 'static,
{
    store: SessionStore,
    transport: T,
    analyzer: A,
    pdf: P,
    chunk_delay: Duration,
}

impl<T, A, P> Controller<T, A, P>
where
    T: Transport + 'static,
    A: Analyzer + 'static,
    P: PdfRenderer + 'static,
{
    pub fn new(store: SessionStore, transport: T, analyzer: A, pdf: P) -> Self {
        Self {
            store,
            transport,
            analyzer,
            pdf,
            chunk_delay: DEFAULT_CHUNK_DELAY,
        }
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    #[cfg(test)]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Process one inbound update and every follow-up event it produces
    pub async fn handle(&self, inbound: Inbound) {
        let Inbound {
            user_id,
            chat_id,
            origin,
            event,
        } = inbound;
        let target = Target {
            user_id,
            chat_id,
            origin,
        };

        // Process events in a loop - no recursion
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            let kind = event.kind();
            match self.process(target, event).await {
                Ok(follow_ups) => queue.extend(follow_ups),
                Err(e) => {
                    tracing::error!(user_id, event = kind, error = %e, "Session store failed");
                    self.send_reply(chat_id, &Reply::plain(lexicon::STORAGE_ERROR))
                        .await;
                    return;
                }
            }
        }
    }

    /// Run one event against the stored session and return its follow-ups
    async fn process(&self, target: Target, event: Event) -> Result<Vec<Event>, StoreError> {
        let user_id = target.user_id;
        let session = self.load(user_id).await?;
        let kind = event.kind();
        let result = transition(session.step, &session.data, event);

        if result.matched {
            tracing::debug!(user_id, step = %session.step, event = kind, "Handling event");
        } else {
            tracing::debug!(user_id, step = %session.step, event = kind, "No transition, sending fallback");
        }
        if result.new_step != session.step {
            tracing::info!(
                user_id,
                from = %session.step,
                to = %result.new_step,
                "Step transition"
            );
        }

        let follow_ups = self.execute_effects(target, result).await?;
        if !self.load(user_id).await?.is_consistent() {
            tracing::warn!(user_id, event = kind, "Session step and data disagree");
        }
        Ok(follow_ups)
    }

    async fn load(&self, user_id: u64) -> Result<Session, StoreError> {
        self.with_store(move |store| Ok(store.get(user_id))).await
    }

    /// Run a store call on the blocking pool. Writes fsync the whole document
    /// under the store lock, so async workers never touch it directly.
    async fn with_store<R, F>(&self, op: F) -> Result<R, StoreError>
    where
        F: FnOnce(&SessionStore) -> Result<R, StoreError> + Send + 'static,
        R: Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || op(&store)).await?
    }

    /// Run effects in order. Stops at the first store failure so nothing is
    /// announced that was not saved.
    async fn execute_effects(
        &self,
        target: Target,
        result: TransitionResult,
    ) -> Result<Vec<Event>, StoreError> {
        let TransitionResult {
            new_step, effects, ..
        } = result;

        let mut follow_ups = Vec::new();
        for effect in effects {
            if let Some(event) = self.execute_effect(target, new_step, effect).await? {
                follow_ups.push(event);
            }
        }
        Ok(follow_ups)
    }

    async fn execute_effect(
        &self,
        target: Target,
        new_step: Step,
        effect: Effect,
    ) -> Result<Option<Event>, StoreError> {
        match effect {
            Effect::Reply(reply) => {
                self.send_reply(target.chat_id, &reply).await;
                Ok(None)
            }

            Effect::SendChunks { chunks } => {
                let mut sent = 0usize;
                for chunk in chunks.iter().filter(|c| !c.trim().is_empty()) {
                    if sent > 0 {
                        tokio::time::sleep(self.chunk_delay).await;
                    }
                    self.send_reply(target.chat_id, &Reply::html(chunk.clone()))
                        .await;
                    sent += 1;
                }
                Ok(None)
            }

            Effect::EditOrigin { text } => {
                self.edit_origin(target, &text).await;
                Ok(None)
            }

            Effect::DeleteOrigin => {
                if let Some(origin) = target.origin {
                    match self.transport.delete(origin).await {
                        Ok(()) | Err(TransportError::MessageGone) => {}
                        Err(e) => {
                            tracing::warn!(user_id = target.user_id, error = %e, "Failed to delete prompt");
                        }
                    }
                }
                Ok(None)
            }

            Effect::UpdateData(patch) => {
                let user_id = target.user_id;
                self.with_store(move |store| store.set_data(user_id, patch))
                    .await?;
                Ok(None)
            }

            Effect::PersistStep => {
                let user_id = target.user_id;
                self.with_store(move |store| store.set_step(user_id, new_step))
                    .await?;
                Ok(None)
            }

            Effect::ResetSession { step } => {
                let user_id = target.user_id;
                self.with_store(move |store| store.reset(user_id, step))
                    .await?;
                Ok(None)
            }

            Effect::ExtractMessages {
                file_id,
                participant,
            } => Ok(Some(self.extract(target.user_id, &file_id, participant).await)),

            Effect::RequestAnalysis { text, hypothesis } => Ok(Some(
                self.analyze(target.user_id, &text, hypothesis.as_deref())
                    .await,
            )),

            Effect::SendPdf { text, participant } => {
                Ok(self.send_pdf(target, &text, &participant).await)
            }
        }
    }

    /// Send a reply; if the channel rejects HTML markup, resend it rendered as
    /// plain text
    async fn send_reply(&self, chat_id: i64, reply: &Reply) -> Option<MessageRef> {
        match self.transport.send(chat_id, reply).await {
            Ok(message) => Some(message),
            Err(TransportError::Rejected(reason)) if reply.format == TextFormat::Html => {
                tracing::warn!(chat_id, reason = %reason, "Markup rejected, resending as plain text");
                let plain = Reply {
                    text: html_to_plain(&reply.text),
                    format: TextFormat::Plain,
                    keyboard: reply.keyboard.clone(),
                };
                match self.transport.send(chat_id, &plain).await {
                    Ok(message) => Some(message),
                    Err(e) => {
                        tracing::warn!(chat_id, error = %e, "Failed to deliver reply");
                        None
                    }
                }
            }
            Err(e) => {
                tracing::warn!(chat_id, error = %e, "Failed to deliver reply");
                None
            }
        }
    }

    /// Edit the pressed message in place, or send the text when there is none
    async fn edit_origin(&self, target: Target, text: &str) {
        let Some(origin) = target.origin else {
            self.send_reply(target.chat_id, &Reply::plain(text)).await;
            return;
        };
        match self.transport.edit_text(origin, text).await {
            Ok(()) | Err(TransportError::MessageGone) => {}
            Err(e) => {
                tracing::warn!(user_id = target.user_id, error = %e, "Failed to edit prompt, sending instead");
                self.send_reply(target.chat_id, &Reply::plain(text)).await;
            }
        }
    }

    async fn extract(&self, user_id: u64, file_id: &str, participant: String) -> Event {
        let bytes = match self.transport.fetch_file(file_id).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(user_id, error = %e, "Failed to download chat export");
                return Event::ActionFailed {
                    action: RetryAction::ExtractMessages,
                };
            }
        };

        let name = participant.clone();
        let scan = tokio::task::spawn_blocking(move || {
            let raw = extraction::decode_permissive(&bytes);
            extraction::extract(&raw, &name)
        })
        .await;

        match scan {
            Ok(messages) => {
                tracing::info!(user_id, count = messages.len(), "Extracted messages");
                Event::MessagesExtracted {
                    participant,
                    messages,
                }
            }
            Err(e) => {
                tracing::error!(user_id, error = %e, "Extraction task failed");
                Event::ActionFailed {
                    action: RetryAction::ExtractMessages,
                }
            }
        }
    }

    async fn analyze(&self, user_id: u64, text: &str, hypothesis: Option<&str>) -> Event {
        match self.analyzer.analyze(text, hypothesis).await {
            Ok(result) => Event::AnalysisComplete { result },
            Err(e) => {
                tracing::error!(
                    user_id,
                    error = %e.message,
                    kind = ?e.kind,
                    retryable = e.kind.is_retryable(),
                    "Analysis failed"
                );
                Event::ActionFailed {
                    action: RetryAction::RunAnalysis,
                }
            }
        }
    }

    /// Render and deliver the PDF; the local file is removed either way
    async fn send_pdf(&self, target: Target, text: &str, participant: &str) -> Option<Event> {
        let failed = Some(Event::ActionFailed {
            action: RetryAction::DownloadPdf,
        });

        let file = match self.pdf.render(text, participant).await {
            Ok(file) => file,
            Err(e) => {
                tracing::error!(user_id = target.user_id, error = %e, "Failed to render PDF");
                return failed;
            }
        };

        let sent = self
            .transport
            .send_file(target.chat_id, &file, lexicon::PDF_CAPTION)
            .await;

        if let Err(e) = tokio::fs::remove_file(&file.path).await {
            tracing::warn!(path = %file.path.display(), error = %e, "Failed to remove transient PDF");
        }

        match sent {
            Ok(()) => None,
            Err(e) => {
                tracing::error!(user_id = target.user_id, error = %e, "Failed to deliver PDF");
                failed
            }
        }
    }
}
