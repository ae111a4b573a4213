//! Status messages with automatic retry for Telegram API operations.
//!
//! The progress message of a link ("Processing...", "Found...", "Sent...")
//! goes through these wrappers so a transient network failure does not leave
//! the user without feedback. Media uploads and auto-deletion are not retried
//! here.

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatId, Message, MessageId, ParseMode};
use tracing::{debug, warn};

/// Telegram's limit is 4096, leave room for markup
const MESSAGE_LIMIT: usize = 4000;

/// Send a message with automatic retry on network failures.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
    parse_mode: Option<ParseMode>,
) -> Result<Message> {
    let text = text.into();
    crate::utils::retry_telegram_operation(|| async {
        let mut req = bot.send_message(chat_id, text.clone());
        if let Some(pm) = parse_mode {
            req = req.parse_mode(pm);
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Edit a message with automatic retry on network failures.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn edit_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    text: impl Into<String>,
    parse_mode: Option<ParseMode>,
) -> Result<Message> {
    let text = text.into();
    crate::utils::retry_telegram_operation(|| async {
        let mut req = bot.edit_message_text(chat_id, msg_id, text.clone());
        if let Some(pm) = parse_mode {
            req = req.parse_mode(pm);
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram edit error: {e}"))
    })
    .await
}

/// Edit an HTML status message, never failing.
///
/// Long texts are cut to [`MESSAGE_LIMIT`] characters. "Not modified" and
/// "not found" answers are expected while a user deletes messages and only
/// logged at debug level.
///
/// Returns `true` if the message was edited.
pub async fn edit_message_safe_resilient(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    text: &str,
) -> bool {
    const ERROR_NOT_MODIFIED: &str = "message is not modified";
    const ERROR_NOT_FOUND: &str = "message to edit not found";

    let text = fit_message(text);

    match edit_message_resilient(bot, chat_id, msg_id, text, Some(ParseMode::Html)).await {
        Ok(_) => true,
        Err(e) => {
            let err_msg = e.to_string();
            if err_msg.contains(ERROR_NOT_MODIFIED) || err_msg.contains(ERROR_NOT_FOUND) {
                debug!(chat_id = %chat_id, "Message update skipped: {err_msg}");
            } else {
                warn!(chat_id = %chat_id, "Failed to edit message after retries: {e}");
            }
            false
        }
    }
}

fn fit_message(text: &str) -> String {
    if text.chars().count() > MESSAGE_LIMIT {
        let truncated = crate::utils::truncate_str(text, MESSAGE_LIMIT);
        format!(
            "{}...\n\n<i>(message truncated)</i>",
            drop_open_markup(&truncated)
        )
    } else {
        text.to_string()
    }
}

/// Cuts off a trailing entity (`&am`) or tag (`<co`) left open by truncation
fn drop_open_markup(text: &str) -> &str {
    let mut end = text.len();
    if let Some(amp) = text.rfind('&') {
        if !text[amp..].contains(';') {
            end = amp;
        }
    }
    if let Some(lt) = text[..end].rfind('<') {
        if !text[lt..end].contains('>') {
            end = lt;
        }
    }
    &text[..end]
}
