//! Telegram delivery channel
//!
//! Long-polls updates with teloxide, maps them to [`Inbound`] events for the
//! session manager, and implements [`Transport`] over the Bot API.

use crate::keyboards::{Action, Keyboard};
use crate::pdf::GenPdfRenderer;
use crate::runtime::{LlmAnalyzer, RenderedPdf, SessionManager, Transport, TransportError};
use crate::state_machine::{Event, Inbound, MessageRef, Reply, TextFormat};
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{
    FileId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, KeyboardButton,
    KeyboardMarkup, KeyboardRemove, MessageId, ParseMode, ReplyMarkup,
};
use teloxide::{ApiError, RequestError};

/// Session manager wired to the production collaborators
pub type BotManager = SessionManager<TelegramTransport, LlmAnalyzer, GenPdfRenderer>;

/// Bot API implementation of the delivery channel
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send(&self, chat_id: i64, reply: &Reply) -> Result<MessageRef, TransportError> {
        let mut request = self.bot.send_message(ChatId(chat_id), reply.text.as_str());
        if reply.format == TextFormat::Html {
            request = request.parse_mode(ParseMode::Html);
        }
        if let Some(keyboard) = &reply.keyboard {
            request = request.reply_markup(reply_markup(keyboard));
        }
        let message = request.await.map_err(classify)?;
        Ok(MessageRef {
            chat_id,
            message_id: message.id.0,
        })
    }

    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<(), TransportError> {
        self.bot
            .edit_message_text(ChatId(message.chat_id), MessageId(message.message_id), text)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete(&self, message: MessageRef) -> Result<(), TransportError> {
        self.bot
            .delete_message(ChatId(message.chat_id), MessageId(message.message_id))
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn send_file(
        &self,
        chat_id: i64,
        file: &RenderedPdf,
        caption: &str,
    ) -> Result<(), TransportError> {
        let document = InputFile::file(&file.path).file_name(file.file_name.clone());
        self.bot
            .send_document(ChatId(chat_id), document)
            .caption(caption)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>, TransportError> {
        let file = self
            .bot
            .get_file(FileId(file_id.to_string()))
            .await
            .map_err(classify)?;

        let mut bytes = Vec::new();
        self.bot
            .download_file(&file.path, &mut bytes)
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(bytes)
    }
}

/// Map a Bot API failure onto the channel error the controller understands
fn classify(error: RequestError) -> TransportError {
    match error {
        RequestError::Api(
            ApiError::MessageToDeleteNotFound
            | ApiError::MessageToEditNotFound
            | ApiError::MessageCantBeDeleted
            | ApiError::MessageNotModified,
        ) => TransportError::MessageGone,
        RequestError::Api(ApiError::CantParseEntities(reason)) => TransportError::Rejected(reason),
        RequestError::Api(api) => TransportError::Api(api.to_string()),
        RequestError::Network(e) => TransportError::Network(e.to_string()),
        other => TransportError::Api(other.to_string()),
    }
}

fn reply_markup(keyboard: &Keyboard) -> ReplyMarkup {
    match keyboard {
        Keyboard::Inline(rows) => ReplyMarkup::InlineKeyboard(InlineKeyboardMarkup::new(
            rows.iter().map(|row| {
                row.iter()
                    .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.action.token()))
                    .collect::<Vec<_>>()
            }),
        )),
        Keyboard::Reply(rows) => ReplyMarkup::Keyboard(
            KeyboardMarkup::new(rows.iter().map(|row| {
                row.iter()
                    .map(|label| KeyboardButton::new(label.clone()))
                    .collect::<Vec<_>>()
            }))
            .resize_keyboard(),
        ),
        Keyboard::Remove => ReplyMarkup::KeyboardRemove(KeyboardRemove::new()),
    }
}

/// Classify a chat message into a session event
fn message_event(text: Option<&str>, document: Option<(String, Option<String>)>) -> Event {
    if let Some((file_id, file_name)) = document {
        return Event::Document {
            file_id,
            file_name: file_name.unwrap_or_default(),
        };
    }
    match text {
        Some(text) if is_start_command(text) => Event::Start,
        Some(text) => Event::text(text),
        None => Event::Unsupported,
    }
}

/// `/start`, optionally addressed to the bot or carrying a deep-link payload
fn is_start_command(text: &str) -> bool {
    let command = text.split_whitespace().next().unwrap_or_default();
    let command = command.split('@').next().unwrap_or_default();
    command == "/start"
}

async fn on_message(msg: Message, manager: Arc<BotManager>) -> ResponseResult<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let document = msg
        .document()
        .map(|d| (d.file.id.to_string(), d.file_name.clone()));
    let event = message_event(msg.text(), document);

    tracing::debug!(user_id = user.id.0, event = event.kind(), "Received message");
    manager
        .dispatch(Inbound::new(user.id.0, msg.chat.id.0, event))
        .await;
    Ok(())
}

async fn on_callback(bot: Bot, q: CallbackQuery, manager: Arc<BotManager>) -> ResponseResult<()> {
    let action = q.data.as_deref().and_then(Action::parse);

    // Acknowledge first so the client stops its progress indicator
    let mut answer = bot.answer_callback_query(q.id.clone());
    if let Some(text) = action.and_then(Action::ack_text) {
        answer = answer.text(text);
    }
    if let Err(e) = answer.await {
        tracing::warn!(user_id = q.from.id.0, error = %e, "Failed to answer callback");
    }

    let Some(action) = action else {
        tracing::debug!(user_id = q.from.id.0, data = ?q.data, "Unknown callback token");
        return Ok(());
    };
    let Some(message) = q.message.as_ref() else {
        return Ok(());
    };

    let chat_id = message.chat().id.0;
    let inbound = Inbound::new(q.from.id.0, chat_id, Event::Action(action)).with_origin(
        MessageRef {
            chat_id,
            message_id: message.id().0,
        },
    );
    manager.dispatch(inbound).await;
    Ok(())
}

/// Poll updates until Ctrl-C
pub async fn run(bot: Bot, manager: Arc<BotManager>) {
    if let Err(e) = bot.delete_webhook().drop_pending_updates(true).await {
        tracing::warn!(error = %e, "Failed to drop pending updates");
    }

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_callback_query().endpoint(on_callback));

    tracing::info!("Polling for updates");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![manager])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
    tracing::info!("Stopped polling");
}
