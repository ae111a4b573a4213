use crate::bot::views::{DefaultMediaView, MediaView};
use crate::scheduler::ChatActions;
use async_trait::async_trait;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{ChatId, MessageId, ParseMode};
use teloxide::{ApiError, RequestError};
use tracing::debug;

/// True when the chat or message targeted by a request no longer exists, or
/// the bot lost access to it. Such failures are expected for timed actions.
#[must_use]
pub fn is_gone_error(error: &RequestError) -> bool {
    matches!(
        error,
        RequestError::Api(
            ApiError::MessageToDeleteNotFound
                | ApiError::MessageCantBeDeleted
                | ApiError::ChatNotFound
                | ApiError::BotBlocked
                | ApiError::BotKicked
                | ApiError::BotKickedFromSupergroup
        )
    )
}

/// Deletion warnings and removals through the Bot API
#[derive(Clone)]
pub struct TelegramChatActions {
    bot: Bot,
}

impl TelegramChatActions {
    /// Act through `bot`
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatActions for TelegramChatActions {
    async fn send_deletion_warning(
        &self,
        chat_id: ChatId,
        file_name: &str,
        remaining: Duration,
    ) -> anyhow::Result<()> {
        let text = DefaultMediaView::deletion_warning(file_name, remaining);
        match self
            .bot
            .send_message(chat_id, text)
            .parse_mode(ParseMode::Html)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_gone_error(&e) => {
                debug!(chat_id = %chat_id, error = %e, "Chat gone, warning skipped");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> anyhow::Result<()> {
        match self.bot.delete_message(chat_id, message_id).await {
            Ok(_) => Ok(()),
            Err(e) if is_gone_error(&e) => {
                debug!(
                    chat_id = %chat_id,
                    message_id = message_id.0,
                    error = %e,
                    "Message already gone"
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
