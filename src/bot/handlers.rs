use crate::bot::delivery::send_media_file;
use crate::bot::resilient::{edit_message_safe_resilient, send_message_resilient};
use crate::bot::views::{DefaultMediaView, MediaView};
use crate::config::Settings;
use crate::extract::{ExtractError, MediaExtractor};
use crate::links::extract_urls;
use crate::scheduler::{DeletionScheduler, ScheduledDeletion};
use anyhow::Result;
use std::sync::Arc;
use teloxide::{prelude::*, types::ParseMode, utils::command::BotCommands};
use tracing::{error, info, warn};
use url::Url;

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Supported commands for the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Start the bot and show welcome message
    #[command(description = "Start the bot.")]
    Start,
    /// Show usage and limits
    #[command(description = "Show help.")]
    Help,
    /// Show pending auto-deletions
    #[command(description = "Show bot statistics.")]
    Stats,
}

/// Start handler
///
/// # Errors
///
/// Returns an error if the welcome message cannot be sent.
pub async fn start(bot: Bot, msg: Message) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    info!("User {user_id} initiated /start command.");

    bot.send_message(msg.chat.id, DefaultMediaView::welcome_message())
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Help handler
///
/// # Errors
///
/// Returns an error if the help message cannot be sent.
pub async fn help(bot: Bot, msg: Message, settings: Arc<Settings>) -> Result<()> {
    let text = DefaultMediaView::help_message(&settings.size_limits(), &settings.retention_policy());
    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Stats handler
///
/// # Errors
///
/// Returns an error if the stats message cannot be sent.
pub async fn stats(bot: Bot, msg: Message, scheduler: Arc<DeletionScheduler>) -> Result<()> {
    let pending = scheduler.pending_count().await;
    let text = DefaultMediaView::stats(pending, scheduler.policy());
    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Handle a plain text message: every link in it is processed in turn.
///
/// # Errors
///
/// Returns an error if the "no links" reply cannot be sent.
pub async fn handle_text(
    bot: Bot,
    msg: Message,
    settings: Arc<Settings>,
    extractor: Arc<MediaExtractor>,
    scheduler: Arc<DeletionScheduler>,
) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    let text = msg.text().unwrap_or_default().trim();

    info!(user_id, "Received text message");

    let urls = extract_urls(text);
    if urls.is_empty() {
        bot.send_message(msg.chat.id, DefaultMediaView::no_urls_found())
            .await?;
        return Ok(());
    }

    if urls.len() > settings.max_urls_per_message {
        info!(
            user_id,
            found = urls.len(),
            limit = settings.max_urls_per_message,
            "Too many links, extra ones are ignored"
        );
    }

    for url in urls.iter().take(settings.max_urls_per_message) {
        if let Err(e) = process_url(&bot, &msg, url, &settings, &extractor, &scheduler).await {
            error!(user_id, url = %url, "Error processing URL: {e}");
        }
    }
    Ok(())
}

/// Extract, deliver and schedule the media behind one link, keeping a status
/// message up to date.
async fn process_url(
    bot: &Bot,
    msg: &Message,
    url: &Url,
    settings: &Settings,
    extractor: &MediaExtractor,
    scheduler: &DeletionScheduler,
) -> Result<()> {
    let chat_id = msg.chat.id;
    let status = send_message_resilient(
        bot,
        chat_id,
        DefaultMediaView::processing(url.as_str()),
        Some(ParseMode::Html),
    )
    .await?;

    let files = match extractor.extract(url).await {
        Ok(files) => files,
        Err(ExtractError::NoMedia) => {
            edit_message_safe_resilient(bot, chat_id, status.id, &DefaultMediaView::no_media(url.as_str()))
                .await;
            return Ok(());
        }
        Err(e) => {
            error!(chat_id = %chat_id, url = %url, error = %e, "Extraction failed");
            edit_message_safe_resilient(
                bot,
                chat_id,
                status.id,
                &DefaultMediaView::error(url.as_str(), &e.to_string()),
            )
            .await;
            return Ok(());
        }
    };

    edit_message_safe_resilient(bot, chat_id, status.id, &DefaultMediaView::found(files.len()))
        .await;

    let limits = settings.size_limits();
    let policy = scheduler.policy();
    let mut sent_count = 0;

    for file in &files {
        match send_media_file(bot, chat_id, file, &limits, policy).await {
            Ok(sent) => {
                sent_count += 1;
                scheduler
                    .schedule(ScheduledDeletion::now(chat_id, sent.id, file.file_name.clone()))
                    .await;
            }
            Err(e) => {
                warn!(chat_id = %chat_id, file_name = %file.file_name, "Error sending media file: {e}");
            }
        }
        extractor.discard(file).await;
    }

    let final_text = if sent_count > 0 {
        DefaultMediaView::success(sent_count, url.as_str())
    } else {
        DefaultMediaView::failed_to_send(url.as_str())
    };
    edit_message_safe_resilient(bot, chat_id, status.id, &final_text).await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_lowercase() {
        assert_eq!(Command::parse("/start", "media_bot").ok(), Some(Command::Start));
        assert_eq!(Command::parse("/help", "media_bot").ok(), Some(Command::Help));
        assert_eq!(Command::parse("/stats", "media_bot").ok(), Some(Command::Stats));
        assert!(Command::parse("/clear", "media_bot").is_err());
    }

    #[test]
    fn command_descriptions_list_all_commands() {
        let descriptions = Command::descriptions().to_string();
        assert!(descriptions.contains("/start"));
        assert!(descriptions.contains("/help"));
        assert!(descriptions.contains("/stats"));
    }
}
