use crate::bot;
use crate::bot::actions::TelegramChatActions;
use crate::bot::handlers::{get_user_id_safe, Command};
use crate::config::Settings;
use crate::extract::MediaExtractor;
use crate::media::TempStore;
use crate::scheduler::DeletionScheduler;
use anyhow::Result;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::{error, info, warn};

/// Run the bot until Ctrl+C.
///
/// # Errors
///
/// Returns an error if the temp directory or the HTTP client cannot be set up.
pub async fn run_bot(settings: Arc<Settings>) -> Result<()> {
    let temp = init_temp_store().await?;

    let extractor = Arc::new(MediaExtractor::new(&settings, temp.clone())?);
    info!("Media extractor initialized.");

    let bot = Bot::new(settings.telegram_bot_token.clone());

    let actions = Arc::new(TelegramChatActions::new(bot.clone()));
    let scheduler = Arc::new(DeletionScheduler::new(actions, settings.retention_policy()));
    info!(
        retention_secs = settings.auto_delete_after_secs,
        warning_secs = settings.deletion_warning_secs,
        "Deletion scheduler started."
    );

    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![settings, extractor, scheduler.clone()])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Shutting down...");
    scheduler.shutdown().await;
    if let Err(e) = temp.purge().await {
        warn!(error = %e, "Failed to clean temp directory on shutdown");
    }
    Ok(())
}

async fn init_temp_store() -> Result<TempStore> {
    let temp = TempStore::in_system_temp()?;
    match temp.purge().await {
        Ok(0) => {}
        Ok(removed) => info!(removed, "Removed leftover downloads."),
        Err(e) => warn!(error = %e, "Failed to purge temp directory"),
    }
    info!(path = %temp.root().display(), "Temp directory ready.");
    Ok(temp)
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(
            dptree::filter(|msg: Message| msg.text().is_some()).endpoint(handle_text_message),
        )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    settings: Arc<Settings>,
    scheduler: Arc<DeletionScheduler>,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => bot::handlers::start(bot, msg).await,
        Command::Help => bot::handlers::help(bot, msg, settings).await,
        Command::Stats => bot::handlers::stats(bot, msg, scheduler).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_text_message(
    bot: Bot,
    msg: Message,
    settings: Arc<Settings>,
    extractor: Arc<MediaExtractor>,
    scheduler: Arc<DeletionScheduler>,
) -> Result<(), teloxide::RequestError> {
    let user_id = get_user_id_safe(&msg);
    if let Err(e) = Box::pin(bot::handlers::handle_text(
        bot, msg, settings, extractor, scheduler,
    ))
    .await
    {
        error!(user_id, "Text handler error: {}", e);
    }
    respond(())
}
