//! Mock implementations for testing
//!
//! These mocks enable end-to-end testing of the controller without real I/O.

use super::executor::Controller;
use super::traits::*;
use crate::llm::LlmError;
use crate::pdf::PdfError;
use crate::state_machine::{Event, Inbound, MessageRef, Reply};
use crate::store::SessionStore;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Mock Transport
// ============================================================================

/// Everything the controller pushed to the channel, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Sent { chat_id: i64, reply: Reply },
    Edited { message: MessageRef, text: String },
    Deleted { message: MessageRef },
    File {
        chat_id: i64,
        file_name: String,
        caption: String,
        path: PathBuf,
    },
}

/// Recording transport with canned uploads
#[derive(Default)]
pub struct MockTransport {
    log: Mutex<Vec<Outbound>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    next_message_id: AtomicI32,
    reject_html: AtomicBool,
    messages_gone: AtomicBool,
    fail_file_delivery: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make an upload available under `file_id`
    pub fn with_file(self, file_id: &str, contents: &str) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(file_id.to_string(), contents.as_bytes().to_vec());
        self
    }

    /// Refuse every HTML-formatted message
    pub fn reject_html(&self) {
        self.reject_html.store(true, Ordering::SeqCst);
    }

    /// Report every edit and delete target as gone
    pub fn messages_gone(&self) {
        self.messages_gone.store(true, Ordering::SeqCst);
    }

    pub fn fail_file_delivery(&self) {
        self.fail_file_delivery.store(true, Ordering::SeqCst);
    }

    pub fn outbound(&self) -> Vec<Outbound> {
        self.log.lock().unwrap().clone()
    }

    /// Texts of all sent messages
    pub fn sent_texts(&self) -> Vec<String> {
        self.outbound()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Sent { reply, .. } => Some(reply.text),
                _ => None,
            })
            .collect()
    }

    pub fn last_reply(&self) -> Option<Reply> {
        self.outbound().into_iter().rev().find_map(|o| match o {
            Outbound::Sent { reply, .. } => Some(reply),
            _ => None,
        })
    }

    pub fn clear(&self) {
        self.log.lock().unwrap().clear();
    }

    fn record(&self, outbound: Outbound) {
        self.log.lock().unwrap().push(outbound);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, chat_id: i64, reply: &Reply) -> Result<MessageRef, TransportError> {
        if reply.format == crate::state_machine::TextFormat::Html
            && self.reject_html.load(Ordering::SeqCst)
        {
            return Err(TransportError::Rejected("can't parse entities".to_string()));
        }
        self.record(Outbound::Sent {
            chat_id,
            reply: reply.clone(),
        });
        let message_id = self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MessageRef {
            chat_id,
            message_id,
        })
    }

    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<(), TransportError> {
        if self.messages_gone.load(Ordering::SeqCst) {
            return Err(TransportError::MessageGone);
        }
        self.record(Outbound::Edited {
            message,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn delete(&self, message: MessageRef) -> Result<(), TransportError> {
        if self.messages_gone.load(Ordering::SeqCst) {
            return Err(TransportError::MessageGone);
        }
        self.record(Outbound::Deleted { message });
        Ok(())
    }

    async fn send_file(
        &self,
        chat_id: i64,
        file: &RenderedPdf,
        caption: &str,
    ) -> Result<(), TransportError> {
        if self.fail_file_delivery.load(Ordering::SeqCst) {
            return Err(TransportError::Network("connection reset".to_string()));
        }
        assert!(file.path.exists(), "PDF must exist while it is delivered");
        self.record(Outbound::File {
            chat_id,
            file_name: file.file_name.clone(),
            caption: caption.to_string(),
            path: file.path.clone(),
        });
        Ok(())
    }

    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>, TransportError> {
        self.files
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .ok_or_else(|| TransportError::Api("file not found".to_string()))
    }
}

// ============================================================================
// Mock Analyzer
// ============================================================================

/// Analyzer returning queued results
#[derive(Default)]
pub struct MockAnalyzer {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    /// Record of (text, hypothesis) for every call
    pub requests: Mutex<Vec<(String, Option<String>)>>,
}

impl MockAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_response(&self, text: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(text.to_string()));
    }

    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<(String, Option<String>)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Analyzer for MockAnalyzer {
    async fn analyze(&self, text: &str, hypothesis: Option<&str>) -> Result<String, LlmError> {
        self.requests
            .lock()
            .unwrap()
            .push((text.to_string(), hypothesis.map(str::to_string)));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }
}

// ============================================================================
// Mock PDF Renderer
// ============================================================================

/// Writes a small placeholder file instead of a real PDF
pub struct MockPdfRenderer {
    dir: PathBuf,
    fail: AtomicBool,
    /// Every path handed out
    pub rendered: Mutex<Vec<PathBuf>>,
}

impl MockPdfRenderer {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            fail: AtomicBool::new(false),
            rendered: Mutex::new(Vec::new()),
        }
    }

    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn rendered_paths(&self) -> Vec<PathBuf> {
        self.rendered.lock().unwrap().clone()
    }
}

#[async_trait]
impl PdfRenderer for MockPdfRenderer {
    async fn render(&self, text: &str, participant: &str) -> Result<RenderedPdf, PdfError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PdfError::Io(std::io::Error::other("disk full")));
        }
        let path = self.dir.join(format!("{}.pdf", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, text).await?;
        self.rendered.lock().unwrap().push(path.clone());
        Ok(RenderedPdf {
            path,
            file_name: crate::pdf::pdf_file_name(participant),
        })
    }
}

// ============================================================================
// Test Runtime
// ============================================================================

pub const USER: u64 = 42;
pub const CHAT: i64 = 4200;

/// A controller wired to mocks over a temporary store
pub struct TestRuntime {
    pub controller: Controller<Arc<MockTransport>, Arc<MockAnalyzer>, Arc<MockPdfRenderer>>,
    pub transport: Arc<MockTransport>,
    pub analyzer: Arc<MockAnalyzer>,
    pub pdf: Arc<MockPdfRenderer>,
    pub dir: tempfile::TempDir,
}

impl TestRuntime {
    pub fn new() -> TestRuntimeBuilder {
        TestRuntimeBuilder::default()
    }

    pub fn store(&self) -> &SessionStore {
        self.controller.store()
    }

    /// Deliver an event for the test user and wait until it is fully handled
    pub async fn send(&self, event: Event) {
        self.controller.handle(Inbound::new(USER, CHAT, event)).await;
    }

    /// Deliver a button press originating from `message_id`
    pub async fn press(&self, event: Event, message_id: i32) {
        let inbound = Inbound::new(USER, CHAT, event).with_origin(MessageRef {
            chat_id: CHAT,
            message_id,
        });
        self.controller.handle(inbound).await;
    }
}

#[derive(Default)]
pub struct TestRuntimeBuilder {
    transport: Option<MockTransport>,
}

impl TestRuntimeBuilder {
    pub fn transport(mut self, transport: MockTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> TestRuntime {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path().join("sessions.json")).unwrap();
        let transport = Arc::new(self.transport.unwrap_or_default());
        let analyzer = Arc::new(MockAnalyzer::new());
        let pdf = Arc::new(MockPdfRenderer::new(dir.path().to_path_buf()));

        let controller = Controller::new(store, transport.clone(), analyzer.clone(), pdf.clone())
            .with_chunk_delay(Duration::ZERO);

        TestRuntime {
            controller,
            transport,
            analyzer,
            pdf,
            dir,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboards::{Action, Keyboard, RetryAction};
    use crate::lexicon;
    use crate::runtime::SessionManager;
    use crate::state_machine::{Step, TextFormat};
    use crate::text::{html_to_plain, MAX_MESSAGE_LENGTH};
    use std::sync::atomic::AtomicUsize;

    const EXPORT: &str = "Alice (10:00): hi\n\nBob (10:01): hello\n\nAlice (10:02): hi\n";

    fn upload() -> Event {
        Event::Document {
            file_id: "f1".to_string(),
            file_name: "chat.txt".to_string(),
        }
    }

    fn runtime() -> TestRuntime {
        TestRuntime::new()
            .transport(MockTransport::new().with_file("f1", EXPORT))
            .build()
    }

    async fn extracted(rt: &TestRuntime) {
        rt.send(Event::Start).await;
        rt.send(upload()).await;
        rt.send(Event::text("Alice")).await;
    }

    async fn analyzed(rt: &TestRuntime, result: &str) {
        extracted(rt).await;
        rt.press(Event::Action(Action::StartTyping), 10).await;
        rt.analyzer.queue_response(result);
        rt.press(Event::Action(Action::HypothesisNo), 11).await;
    }

    #[tokio::test]
    async fn test_full_flow() {
        let rt = runtime();

        rt.send(Event::Start).await;
        assert_eq!(rt.store().get(USER).step, Step::AwaitingFile);
        assert_eq!(rt.transport.sent_texts(), vec![lexicon::WELCOME.to_string()]);

        rt.send(upload()).await;
        let session = rt.store().get(USER);
        assert_eq!(session.step, Step::AwaitingParticipantName);
        assert_eq!(session.data.file_id.as_deref(), Some("f1"));

        rt.send(Event::text("Alice")).await;
        let session = rt.store().get(USER);
        assert_eq!(session.step, Step::MessagesExtracted);
        assert_eq!(session.data.extracted_text.as_deref(), Some("hi"));
        assert_eq!(session.data.current_user.as_deref(), Some("Alice"));
        assert_eq!(
            rt.transport.last_reply().unwrap().text,
            lexicon::extraction_summary(1, 2)
        );

        rt.press(Event::Action(Action::StartTyping), 10).await;
        assert_eq!(rt.store().get(USER).step, Step::AwaitingHypothesis);
        assert!(rt.transport.outbound().contains(&Outbound::Deleted {
            message: MessageRef {
                chat_id: CHAT,
                message_id: 10
            }
        }));

        rt.analyzer.queue_response("**ILE** fits");
        rt.send(Event::text("ILE")).await;
        assert_eq!(
            rt.analyzer.recorded_requests(),
            vec![("hi".to_string(), Some("ILE".to_string()))]
        );

        let session = rt.store().get(USER);
        assert_eq!(session.step, Step::AnalysisDone);
        assert_eq!(session.data.analysis_result.as_deref(), Some("**ILE** fits"));
        assert_eq!(session.data.hypothesis.as_deref(), Some("ILE"));

        let preview = rt.transport.last_reply().unwrap();
        assert_eq!(preview.format, TextFormat::Html);
        assert!(preview.text.starts_with(lexicon::ANALYSIS_PREVIEW_HEADER));
        assert!(preview.text.contains("<b>ILE</b>"));
        assert_eq!(preview.keyboard, Some(Keyboard::analysis()));
    }

    #[tokio::test]
    async fn test_participant_not_found_stays_waiting() {
        let rt = runtime();
        rt.send(Event::Start).await;
        rt.send(upload()).await;
        rt.send(Event::text("alice")).await;

        let session = rt.store().get(USER);
        assert_eq!(session.step, Step::AwaitingParticipantName);
        assert_eq!(session.data.extracted_text, None);
        assert_eq!(
            rt.transport.last_reply().unwrap().text,
            lexicon::messages_not_found("alice")
        );

        rt.send(Event::text("Bob")).await;
        assert_eq!(
            rt.store().get(USER).data.extracted_text.as_deref(),
            Some("hello")
        );
    }

    #[tokio::test]
    async fn test_download_failure_offers_retry() {
        let rt = TestRuntime::new().build();
        rt.send(Event::Start).await;
        rt.send(upload()).await;
        rt.send(Event::text("Alice")).await;

        assert_eq!(rt.store().get(USER).step, Step::AwaitingParticipantName);
        let reply = rt.transport.last_reply().unwrap();
        assert_eq!(reply.text, lexicon::EXTRACTION_FAILED);
        assert_eq!(
            reply.keyboard,
            Some(Keyboard::retry(RetryAction::ExtractMessages))
        );
    }

    #[tokio::test]
    async fn test_analysis_failure_then_retry() {
        let rt = runtime();
        extracted(&rt).await;
        rt.press(Event::Action(Action::StartTyping), 10).await;

        rt.analyzer.queue_error(LlmError::timeout("too slow"));
        rt.send(Event::text("LII")).await;

        let session = rt.store().get(USER);
        assert_eq!(session.step, Step::AwaitingHypothesis);
        assert_eq!(session.data.analysis_result, None);
        assert_eq!(session.data.extracted_text.as_deref(), Some("hi"));
        let offer = rt.transport.last_reply().unwrap();
        assert_eq!(offer.text, lexicon::ANALYSIS_FAILED);
        assert_eq!(offer.keyboard, Some(Keyboard::retry(RetryAction::RunAnalysis)));

        rt.analyzer.queue_response("LII it is");
        rt.press(Event::Action(Action::Retry(RetryAction::RunAnalysis)), 20)
            .await;

        let session = rt.store().get(USER);
        assert_eq!(session.step, Step::AnalysisDone);
        assert_eq!(session.data.analysis_result.as_deref(), Some("LII it is"));
        // The retry reuses the stored hypothesis
        assert_eq!(
            rt.analyzer.recorded_requests()[1],
            ("hi".to_string(), Some("LII".to_string()))
        );
    }

    #[tokio::test]
    async fn test_hypothesis_yes_edits_prompt() {
        let rt = runtime();
        extracted(&rt).await;
        rt.press(Event::Action(Action::StartTyping), 10).await;
        rt.transport.clear();

        rt.press(Event::Action(Action::HypothesisYes), 11).await;
        assert_eq!(
            rt.transport.outbound(),
            vec![Outbound::Edited {
                message: MessageRef {
                    chat_id: CHAT,
                    message_id: 11
                },
                text: lexicon::WAIT_FOR_HYPOTHESIS_INPUT.to_string(),
            }]
        );
        assert_eq!(rt.store().get(USER).step, Step::AwaitingHypothesis);
    }

    #[tokio::test]
    async fn test_gone_prompt_is_ignored() {
        let rt = runtime();
        extracted(&rt).await;
        rt.transport.messages_gone();

        rt.press(Event::Action(Action::StartTyping), 10).await;
        assert_eq!(rt.store().get(USER).step, Step::AwaitingHypothesis);
        assert_eq!(
            rt.transport.last_reply().unwrap().text,
            lexicon::ASK_HYPOTHESIS
        );
    }

    #[tokio::test]
    async fn test_double_restart_is_idempotent() {
        let rt = runtime();
        extracted(&rt).await;

        rt.press(Event::Action(Action::Restart), 10).await;
        let first = rt.store().get(USER);
        rt.send(Event::text(lexicon::RESTART_BUTTON)).await;
        let second = rt.store().get(USER);

        assert_eq!(first, second);
        assert_eq!(second.step, Step::AwaitingFile);
        assert!(second.data.is_empty());
    }

    #[tokio::test]
    async fn test_unexpected_input_gets_fallback() {
        let rt = runtime();
        extracted(&rt).await;
        let before = rt.store().get(USER);

        rt.send(Event::text("what now?")).await;
        assert_eq!(rt.store().get(USER), before);
        let reply = rt.transport.last_reply().unwrap();
        assert_eq!(reply.text, lexicon::FALLBACK_ACTIONS);
        assert_eq!(reply.keyboard, Some(Keyboard::actions("Alice")));
    }

    #[tokio::test]
    async fn test_rejected_markup_is_resent_plain() {
        let rt = runtime();
        rt.transport.reject_html();
        rt.send(Event::Start).await;

        let reply = rt.transport.last_reply().unwrap();
        assert_eq!(reply.text, html_to_plain(lexicon::WELCOME));
        assert!(!reply.text.contains("<b>"));
        assert!(reply.text.contains("Upload chat"));
        assert_eq!(reply.format, TextFormat::Plain);
        assert_eq!(reply.keyboard, Some(Keyboard::start()));
    }

    #[tokio::test]
    async fn test_rejected_analysis_chunk_is_resent_readable() {
        let rt = runtime();
        analyzed(&rt, "**ILE** & <ENTp>").await;
        rt.transport.clear();
        rt.transport.reject_html();

        rt.press(Event::Action(Action::ShowFull), 30).await;
        let texts = rt.transport.sent_texts();
        assert_eq!(texts[0], "ILE & <ENTp>");
        assert_eq!(texts.last().unwrap(), lexicon::ANALYSIS_ACTION_PROMPT);
    }

    #[tokio::test]
    async fn test_show_full_sends_chunks_then_prompt() {
        let rt = runtime();
        let long = "word word word\n".repeat(800);
        analyzed(&rt, &long).await;
        rt.transport.clear();

        rt.press(Event::Action(Action::ShowFull), 30).await;
        let texts = rt.transport.sent_texts();
        assert_eq!(texts.len(), 4);
        assert!(texts
            .iter()
            .all(|t| t.chars().count() <= MAX_MESSAGE_LENGTH));
        assert_eq!(texts.last().unwrap(), lexicon::ANALYSIS_ACTION_PROMPT);
        assert_eq!(rt.store().get(USER).step, Step::AnalysisDone);
    }

    #[tokio::test]
    async fn test_show_full_keeps_overlong_line_whole() {
        let rt = runtime();
        let line = "word ".repeat(2000);
        analyzed(&rt, &line).await;
        rt.transport.clear();

        rt.press(Event::Action(Action::ShowFull), 30).await;
        let texts = rt.transport.sent_texts();
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0], line);
        assert_eq!(texts[1], lexicon::ANALYSIS_ACTION_PROMPT);
    }

    #[tokio::test]
    async fn test_pdf_is_removed_after_delivery() {
        let rt = runtime();
        analyzed(&rt, "**ILE** fits").await;

        rt.press(Event::Action(Action::DownloadPdf), 30).await;
        let delivered = rt
            .transport
            .outbound()
            .into_iter()
            .find_map(|o| match o {
                Outbound::File {
                    file_name,
                    caption,
                    path,
                    ..
                } => Some((file_name, caption, path)),
                _ => None,
            })
            .unwrap();

        assert_eq!(delivered.0, "Alice_analysis.pdf");
        assert_eq!(delivered.1, lexicon::PDF_CAPTION);
        assert!(!delivered.2.exists());
        assert_eq!(rt.store().get(USER).step, Step::AnalysisDone);
    }

    #[tokio::test]
    async fn test_failed_pdf_delivery_cleans_up_and_offers_retry() {
        let rt = runtime();
        analyzed(&rt, "result").await;
        rt.transport.fail_file_delivery();

        rt.press(Event::Action(Action::DownloadPdf), 30).await;
        let reply = rt.transport.last_reply().unwrap();
        assert_eq!(reply.text, lexicon::PDF_ERROR);
        assert_eq!(reply.keyboard, Some(Keyboard::retry(RetryAction::DownloadPdf)));
        for path in rt.pdf.rendered_paths() {
            assert!(!path.exists());
        }
    }

    #[tokio::test]
    async fn test_render_failure_offers_retry() {
        let rt = runtime();
        analyzed(&rt, "result").await;
        rt.pdf.fail();

        rt.press(Event::Action(Action::DownloadPdf), 30).await;
        assert_eq!(rt.transport.last_reply().unwrap().text, lexicon::PDF_ERROR);
        assert!(rt.pdf.rendered_paths().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_reports_and_keeps_step() {
        let rt = runtime();
        rt.send(Event::Start).await;

        // A directory squatting on the temp path makes the next flush fail
        std::fs::create_dir(rt.dir.path().join("sessions.json.tmp")).unwrap();

        rt.send(upload()).await;
        assert_eq!(rt.transport.last_reply().unwrap().text, lexicon::STORAGE_ERROR);
        assert_eq!(rt.store().get(USER).step, Step::AwaitingFile);
        assert_eq!(rt.store().get(USER).data.file_id, None);
    }

    #[tokio::test]
    async fn test_store_writes_leave_runtime_responsive() {
        let rt = runtime();
        let store = rt.store().clone();
        let (locked_tx, locked_rx) = std::sync::mpsc::channel();
        let holder = std::thread::spawn(move || {
            let _guard = store.hold_lock();
            locked_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(300));
        });
        locked_rx.recv().unwrap();

        // Only ticks if the controller's wait on the store lock leaves this
        // single-threaded runtime free
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = tokio::spawn({
            let ticks = Arc::clone(&ticks);
            async move {
                loop {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    ticks.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        rt.send(Event::Start).await;
        ticker.abort();
        holder.join().unwrap();

        assert!(ticks.load(Ordering::SeqCst) >= 5);
        assert_eq!(rt.store().get(USER).step, Step::AwaitingFile);
    }

    #[tokio::test]
    async fn test_manager_handles_user_updates_in_order() {
        let rt = runtime();
        let TestRuntime {
            controller,
            transport,
            dir: _dir,
            ..
        } = rt;
        let store = controller.store().clone();
        let manager = SessionManager::new(controller, Duration::from_secs(60));

        manager.dispatch(Inbound::new(USER, CHAT, Event::Start)).await;
        manager.dispatch(Inbound::new(USER, CHAT, upload())).await;
        manager
            .dispatch(Inbound::new(USER, CHAT, Event::text("Alice")))
            .await;
        manager.dispatch(Inbound::new(7, 70, Event::Start)).await;
        assert_eq!(manager.active_workers().await, 2);

        manager.shutdown().await;

        assert_eq!(store.get(USER).step, Step::MessagesExtracted);
        assert_eq!(store.get(7).step, Step::AwaitingFile);
        let to_user: Vec<_> = transport
            .outbound()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Sent { chat_id, reply } if chat_id == CHAT => Some(reply.text),
                _ => None,
            })
            .collect();
        assert_eq!(to_user.first().map(String::as_str), Some(lexicon::WELCOME));
        assert_eq!(
            to_user.last().cloned(),
            Some(lexicon::extraction_summary(1, 2))
        );
    }

    #[tokio::test]
    async fn test_idle_worker_retires() {
        let rt = runtime();
        let TestRuntime {
            controller,
            dir: _dir,
            ..
        } = rt;
        let store = controller.store().clone();
        let manager = SessionManager::new(controller, Duration::from_millis(20));

        manager.dispatch(Inbound::new(USER, CHAT, Event::Start)).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(manager.active_workers().await, 0);

        // A new update starts a fresh worker and the session is intact
        manager.dispatch(Inbound::new(USER, CHAT, upload())).await;
        manager.shutdown().await;
        assert_eq!(store.get(USER).step, Step::AwaitingParticipantName);
    }
}
