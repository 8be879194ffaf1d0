//! Socionics bot - personality analysis of Telegram chat exports
//!
//! A user uploads a chat export, names a participant, optionally states a
//! type hypothesis, and receives an LLM analysis as messages or a PDF.

mod config;
mod extraction;
mod keyboards;
mod lexicon;
mod llm;
mod pdf;
mod prompt;
mod runtime;
mod state_machine;
mod store;
mod telegram;
mod text;

use config::BotConfig;
use llm::{GeminiService, LlmService, LoggingService};
use pdf::GenPdfRenderer;
use runtime::{Controller, LlmAnalyzer, SessionManager};
use std::sync::Arc;
use std::time::Duration;
use store::SessionStore;
use teloxide::Bot;
use telegram::TelegramTransport;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EVICTION_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "socionics_bot=info,teloxide=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = BotConfig::from_env()?;

    tracing::info!(path = %config.session_store_path.display(), "Opening session store");
    let store = SessionStore::open(&config.session_store_path)?;

    if let Some(ttl) = config.session_ttl {
        evict_idle(&store, ttl);
        let store = store.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(EVICTION_INTERVAL);
            interval.tick().await;
            loop {
                interval.tick().await;
                let store = store.clone();
                let eviction = tokio::task::spawn_blocking(move || evict_idle(&store, ttl));
                if let Err(e) = eviction.await {
                    tracing::error!(error = %e, "Eviction task failed");
                }
            }
        });
    }

    // Analysis edge
    let gemini = GeminiService::new(
        config.gemini_api_key.clone(),
        &config.gemini_model,
        config.llm_gateway.as_deref(),
        config.analysis_timeout,
    )?;
    let llm: Arc<dyn LlmService> = Arc::new(LoggingService::new(Arc::new(gemini)));
    tracing::info!(model = %llm.model_id(), "Analysis model configured");
    let analyzer = LlmAnalyzer::new(llm, config.analysis_timeout);

    let renderer = GenPdfRenderer::new(
        config.pdf_font_dir.clone(),
        config.pdf_font_family.clone(),
        config.pdf_output_dir.clone(),
    );

    let bot = Bot::new(&config.telegram_token);
    let controller = Controller::new(
        store.clone(),
        TelegramTransport::new(bot.clone()),
        analyzer,
        renderer,
    )
    .with_chunk_delay(config.chunk_delay);
    let manager = Arc::new(SessionManager::new(controller, config.worker_idle));

    telegram::run(bot, Arc::clone(&manager)).await;

    // Let in-flight work finish before the final flush
    manager.shutdown().await;
    store.close()?;
    tracing::info!("Shut down cleanly");

    Ok(())
}

fn evict_idle(store: &SessionStore, ttl: chrono::Duration) {
    match store.evict_idle(ttl, chrono::Utc::now()) {
        Ok(0) => {}
        Ok(removed) => tracing::info!(removed, remaining = store.len(), "Evicted idle sessions"),
        Err(e) => tracing::error!(error = %e, "Failed to evict idle sessions"),
    }
}
