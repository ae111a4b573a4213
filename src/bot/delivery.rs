//! Uploading downloaded media to a chat.

use crate::bot::views::{DefaultMediaView, MediaView};
use crate::media::detection::{extension_from_path, is_valid_image, HTML_SNIFF_LEN};
use crate::media::{Delivery, MediaFile, MediaKind, SizeLimits};
use crate::scheduler::RetentionPolicy;
use anyhow::{anyhow, Result};
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile, ParseMode};
use teloxide::RequestError;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

/// Telegram rejects some valid-looking images for photo processing
const IMAGE_PROCESS_FAILED: &str = "IMAGE_PROCESS_FAILED";

fn is_image_process_failed(error: &RequestError) -> bool {
    error
        .to_string()
        .to_ascii_uppercase()
        .contains(IMAGE_PROCESS_FAILED)
}

/// First bytes of a file, enough for magic-byte sniffing
async fn read_head(path: &Path) -> std::io::Result<Vec<u8>> {
    let file = tokio::fs::File::open(path).await?;
    let mut head = Vec::with_capacity(HTML_SNIFF_LEN);
    file.take(HTML_SNIFF_LEN as u64).read_to_end(&mut head).await?;
    Ok(head)
}

/// Kind used for delivery plus whether the bytes decode as an image.
///
/// Files named like images are re-checked: valid ones become images even if
/// the server called them something else.
async fn effective_kind(file: &MediaFile) -> (MediaKind, bool) {
    let named_image = extension_from_path(Path::new(&file.file_name))
        .and_then(|ext| MediaKind::from_extension(&ext))
        == Some(MediaKind::Image);

    if file.kind != MediaKind::Image && !named_image {
        return (file.kind, false);
    }

    let valid = match read_head(&file.path).await {
        Ok(head) => is_valid_image(&head),
        Err(e) => {
            debug!(path = %file.path.display(), error = %e, "Cannot read file for validation");
            false
        }
    };
    if valid {
        (MediaKind::Image, true)
    } else {
        debug!(file_name = %file.file_name, "Image validation failed, sending as document");
        (file.kind, false)
    }
}

/// Upload one media file with its caption.
///
/// # Errors
///
/// Fails when the size policy rejects the file or the upload fails.
pub async fn send_media_file(
    bot: &Bot,
    chat_id: ChatId,
    file: &MediaFile,
    limits: &SizeLimits,
    policy: &RetentionPolicy,
) -> Result<Message> {
    let (kind, image_valid) = effective_kind(file).await;
    let delivery = limits.classify(kind, file.size, image_valid);

    info!(
        file_name = %file.file_name,
        size = file.size,
        kind = %kind,
        ?delivery,
        "Attempting to send media"
    );

    let caption = DefaultMediaView::caption(&file.file_name, file.source_url.as_str(), policy);

    let sent = match delivery {
        Delivery::Reject(reason) => return Err(anyhow!(reason)),
        Delivery::Photo => {
            let photo = bot
                .send_photo(chat_id, InputFile::file(&file.path))
                .caption(caption.clone())
                .parse_mode(ParseMode::Html)
                .await;
            match photo {
                Err(e) if is_image_process_failed(&e) => {
                    info!(file_name = %file.file_name, "Image processing failed, falling back to document");
                    send_document(bot, chat_id, file, caption).await?
                }
                other => other?,
            }
        }
        Delivery::Video => {
            bot.send_video(chat_id, InputFile::file(&file.path))
                .caption(caption)
                .parse_mode(ParseMode::Html)
                .await?
        }
        Delivery::Document => send_document(bot, chat_id, file, caption).await?,
    };

    info!(file_name = %file.file_name, size = file.size, "Successfully sent media");
    Ok(sent)
}

async fn send_document(
    bot: &Bot,
    chat_id: ChatId,
    file: &MediaFile,
    caption: String,
) -> Result<Message, RequestError> {
    bot.send_document(
        chat_id,
        InputFile::file(&file.path).file_name(file.file_name.clone()),
    )
    .caption(caption)
    .parse_mode(ParseMode::Html)
    .await
}
