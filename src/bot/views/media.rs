//! Media bot UI texts
//!
//! Every message the bot sends lives here. All texts are Telegram HTML, any
//! user- or web-supplied value is escaped before it is embedded.

use crate::media::SizeLimits;
use crate::scheduler::RetentionPolicy;
use crate::utils::{ellipsize, format_size};
use html_escape::encode_text;
use std::time::Duration;

/// Characters of the URL shown in the "processing" message
pub const PROCESSING_URL_CHARS: usize = 50;
/// Characters of the source URL shown in a media caption
pub const CAPTION_URL_CHARS: usize = 100;
/// Characters of the URL shown in final status messages
pub const STATUS_URL_CHARS: usize = 300;
/// Characters of an error reason shown to the user
pub const ERROR_REASON_CHARS: usize = 300;

// ─────────────────────────────────────────────────────────────────────────────
// Trait definition
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for media bot view rendering
pub trait MediaView {
    /// `/start` greeting
    fn welcome_message() -> &'static str;

    /// `/help` text with the active limits
    fn help_message(limits: &SizeLimits, policy: &RetentionPolicy) -> String;

    /// Reply to a message without any link
    fn no_urls_found() -> &'static str;

    /// Status while a link is being processed
    fn processing(url: &str) -> String;

    /// Status once media was found and is being uploaded
    fn found(count: usize) -> String;

    /// Final status when at least one file was delivered
    fn success(count: usize, url: &str) -> String;

    /// Final status when no strategy found any media
    fn no_media(url: &str) -> String;

    /// Final status when media was found but nothing could be delivered
    fn failed_to_send(url: &str) -> String;

    /// Final status when extraction failed
    fn error(url: &str, error: &str) -> String;

    /// Caption attached to every delivered file
    fn caption(file_name: &str, source_url: &str, policy: &RetentionPolicy) -> String;

    /// Warning posted shortly before a file is deleted
    fn deletion_warning(file_name: &str, remaining: Duration) -> String;

    /// `/stats` text
    fn stats(pending: usize, policy: &RetentionPolicy) -> String;
}

// ─────────────────────────────────────────────────────────────────────────────
// Default implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Default English implementation of `MediaView`
pub struct DefaultMediaView;

impl MediaView for DefaultMediaView {
    fn welcome_message() -> &'static str {
        r"🤖 <b>Media Extractor Bot</b>

Hi! I can help you extract images and videos from web links.

<b>How to use:</b>
1. Send me any web URL
2. I'll scan it for images and videos
3. I'll send back any media I find

<b>Supported formats:</b>
• Images: JPG, PNG, GIF, WebP, BMP
• Videos: MP4, AVI, MOV, MKV, WebM, M4V

<b>Commands:</b>
• /help - Show help
• /stats - Show pending auto-deletions
• /start - Start the bot

🔒 Everything I send is deleted automatically after a while.

Just paste any URL and I'll do the rest! 🚀"
    }

    fn help_message(limits: &SizeLimits, policy: &RetentionPolicy) -> String {
        format!(
            r"🆘 <b>Help - Media Extractor Bot</b>

<b>How it works:</b>
Send me any web URL and I'll extract images and videos from it.

<b>Supported websites:</b>
• Direct media links (images/videos)
• YouTube, Vimeo, and other video platforms
• Social media posts with embedded media
• News articles with images
• Any website with embedded media

<b>File size limits:</b>
• Images: Up to {image}
• Videos: Up to {video}

<b>Privacy:</b>
Media is deleted {hours} hour(s) after delivery, with a warning {lead} minute(s) before.

<b>Tips:</b>
• Make sure the URL is accessible and public
• Some websites may block automated access
• Private or login-required content won't work

<b>Examples:</b>
• <code>https://example.com/image.jpg</code>
• <code>https://youtube.com/watch?v=...</code>
• <code>https://news-site.com/article-with-images</code>

Need more help? Just send me a URL and see what happens! 🎯",
            image = format_size(limits.image),
            video = format_size(limits.video),
            hours = policy.retention_hours(),
            lead = policy.warning_lead.as_secs() / 60,
        )
    }

    fn no_urls_found() -> &'static str {
        "❌ No valid URLs found in your message.\n\nPlease send a valid web URL (starting with http:// or https://)"
    }

    fn processing(url: &str) -> String {
        format!(
            "🔍 Processing URL: {}\nPlease wait while I extract media...",
            encode_text(&ellipsize(url, PROCESSING_URL_CHARS))
        )
    }

    fn found(count: usize) -> String {
        format!("📁 Found {count} media file(s)!\nUploading to Telegram...")
    }

    fn success(count: usize, url: &str) -> String {
        format!(
            "✅ Successfully sent {count} media file(s) from:\n{}",
            encode_text(&ellipsize(url, STATUS_URL_CHARS))
        )
    }

    fn no_media(url: &str) -> String {
        format!(
            "❌ No supported media found at:\n{}\n\nThe URL might not contain images or videos, or they might be in unsupported formats.",
            encode_text(&ellipsize(url, STATUS_URL_CHARS))
        )
    }

    fn failed_to_send(url: &str) -> String {
        format!(
            "❌ Failed to send media files from:\n{}\n\nFiles might be too large or in unsupported format.",
            encode_text(&ellipsize(url, STATUS_URL_CHARS))
        )
    }

    fn error(url: &str, error: &str) -> String {
        format!(
            "❌ Error processing URL:\n{}\n\nError: {}\n\nPlease try with a different URL or check if the link is accessible.",
            encode_text(&ellipsize(url, STATUS_URL_CHARS)),
            encode_text(&ellipsize(error, ERROR_REASON_CHARS))
        )
    }

    fn caption(file_name: &str, source_url: &str, policy: &RetentionPolicy) -> String {
        format!(
            "📎 {}\n🔗 Source: {}\n⏰ Auto-deletes in {} hour(s)",
            encode_text(file_name),
            encode_text(&ellipsize(source_url, CAPTION_URL_CHARS)),
            policy.retention_hours()
        )
    }

    fn deletion_warning(file_name: &str, remaining: Duration) -> String {
        let minutes = remaining.as_secs().div_ceil(60);
        format!(
            "⚠️ <b>Auto-Delete Warning</b>\n\nYour media file <code>{}</code> will be automatically deleted in {minutes} minutes for privacy protection.\n\nIf you need to keep it, please save it now!",
            encode_text(file_name)
        )
    }

    fn stats(pending: usize, policy: &RetentionPolicy) -> String {
        format!(
            "📊 <b>Bot statistics</b>\n\n🗑 Pending auto-deletions: {pending}\n⏰ Retention: {} hour(s)\n⚠️ Warning: {} minute(s) before deletion",
            policy.retention_hours(),
            policy.warning_lead.as_secs() / 60
        )
    }
}
