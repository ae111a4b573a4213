//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines
//! the bot's limits and timing constants.

use crate::media::SizeLimits;
use crate::scheduler::RetentionPolicy;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest image that is still delivered (200 MiB)
pub const MAX_PHOTO_SIZE: u64 = 200 * 1024 * 1024;
/// Largest video that is still delivered (3 GiB)
pub const MAX_VIDEO_SIZE: u64 = 3 * 1024 * 1024 * 1024;
/// Largest generic document, also the hard cap for any download (3 GiB)
pub const MAX_DOCUMENT_SIZE: u64 = 3 * 1024 * 1024 * 1024;

/// Delivered media is deleted this long after it was sent
pub const AUTO_DELETE_AFTER_SECS: u64 = 3600;
/// The chat is warned this long before the deletion
pub const DELETION_WARNING_SECS: u64 = 300;

/// Timeout for connecting and for each read of a media download
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 30;
/// Timeout for the HEAD probe used to sniff content types
pub const HEAD_TIMEOUT_SECS: u64 = 10;
/// Attempts for a direct download before giving up
pub const MAX_DOWNLOAD_RETRIES: usize = 3;
/// Upper bound for a single yt-dlp invocation
pub const YTDLP_TIMEOUT_SECS: u64 = 600;

/// Browser-like user agent, some hosts refuse obvious bots
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Links handled per incoming message
pub const MAX_URLS_PER_MESSAGE: usize = 3;
/// Media files downloaded from a single scraped page
pub const MAX_SCRAPED_MEDIA: usize = 5;

/// Initial backoff for Telegram API retries
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Backoff ceiling for Telegram API retries
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;
/// Attempts for a Telegram API operation
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;

/// Application settings loaded from config files and environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token (`TELEGRAM_BOT_TOKEN`)
    pub telegram_bot_token: String,

    /// Image size limit in bytes
    #[serde(default = "default_max_photo_size")]
    pub max_photo_size: u64,
    /// Video size limit in bytes
    #[serde(default = "default_max_video_size")]
    pub max_video_size: u64,
    /// Document size limit in bytes
    #[serde(default = "default_max_document_size")]
    pub max_document_size: u64,

    /// Seconds between delivery and deletion
    #[serde(default = "default_auto_delete_after_secs")]
    pub auto_delete_after_secs: u64,
    /// Seconds before deletion at which the chat is warned
    #[serde(default = "default_deletion_warning_secs")]
    pub deletion_warning_secs: u64,

    /// Download connect/read timeout in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
    /// HEAD probe timeout in seconds
    #[serde(default = "default_head_timeout_secs")]
    pub head_timeout_secs: u64,
    /// Download attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// User agent for every outgoing HTTP request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Links handled per message
    #[serde(default = "default_max_urls_per_message")]
    pub max_urls_per_message: usize,
    /// Media files taken from one scraped page
    #[serde(default = "default_max_scraped_media")]
    pub max_scraped_media: usize,

    /// yt-dlp executable
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: String,
    /// yt-dlp timeout in seconds
    #[serde(default = "default_ytdlp_timeout_secs")]
    pub ytdlp_timeout_secs: u64,
}

const fn default_max_photo_size() -> u64 {
    MAX_PHOTO_SIZE
}

const fn default_max_video_size() -> u64 {
    MAX_VIDEO_SIZE
}

const fn default_max_document_size() -> u64 {
    MAX_DOCUMENT_SIZE
}

const fn default_auto_delete_after_secs() -> u64 {
    AUTO_DELETE_AFTER_SECS
}

const fn default_deletion_warning_secs() -> u64 {
    DELETION_WARNING_SECS
}

const fn default_download_timeout_secs() -> u64 {
    DOWNLOAD_TIMEOUT_SECS
}

const fn default_head_timeout_secs() -> u64 {
    HEAD_TIMEOUT_SECS
}

const fn default_max_retries() -> usize {
    MAX_DOWNLOAD_RETRIES
}

fn default_user_agent() -> String {
    USER_AGENT.to_string()
}

const fn default_max_urls_per_message() -> usize {
    MAX_URLS_PER_MESSAGE
}

const fn default_max_scraped_media() -> usize {
    MAX_SCRAPED_MEDIA
}

fn default_ytdlp_path() -> String {
    "yt-dlp".to_string()
}

const fn default_ytdlp_timeout_secs() -> u64 {
    YTDLP_TIMEOUT_SECS
}

/// Build the layered configuration source.
///
/// Order: `config/default`, `config/{RUN_MODE}`, `config/local`, `APP__*`
/// variables, then plain environment variables.
///
/// # Errors
///
/// Returns a `ConfigError` if a present file cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Not checked into git
        .add_source(File::with_name("config/local").required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        // UPPER_SNAKE_CASE maps to snake_case, empty values count as unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

impl Settings {
    /// Load settings from config files and the environment.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use media_extractor_bot::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails, the token is missing or
    /// a value is out of range.
    pub fn new() -> Result<Self, ConfigError> {
        let settings: Self = build_config()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Settings with every default and the given token
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            telegram_bot_token: token.into(),
            max_photo_size: MAX_PHOTO_SIZE,
            max_video_size: MAX_VIDEO_SIZE,
            max_document_size: MAX_DOCUMENT_SIZE,
            auto_delete_after_secs: AUTO_DELETE_AFTER_SECS,
            deletion_warning_secs: DELETION_WARNING_SECS,
            download_timeout_secs: DOWNLOAD_TIMEOUT_SECS,
            head_timeout_secs: HEAD_TIMEOUT_SECS,
            max_retries: MAX_DOWNLOAD_RETRIES,
            user_agent: USER_AGENT.to_string(),
            max_urls_per_message: MAX_URLS_PER_MESSAGE,
            max_scraped_media: MAX_SCRAPED_MEDIA,
            ytdlp_path: default_ytdlp_path(),
            ytdlp_timeout_secs: YTDLP_TIMEOUT_SECS,
        }
    }

    /// Check values that deserialize fine but make no sense at runtime.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Message` describing the first invalid value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram_bot_token.trim().is_empty() {
            return Err(ConfigError::Message(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }
        if self.auto_delete_after_secs == 0 {
            return Err(ConfigError::Message(
                "auto_delete_after_secs must be positive".to_string(),
            ));
        }
        if self.max_urls_per_message == 0 {
            return Err(ConfigError::Message(
                "max_urls_per_message must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Size limits applied before delivery
    #[must_use]
    pub const fn size_limits(&self) -> SizeLimits {
        SizeLimits {
            image: self.max_photo_size,
            video: self.max_video_size,
            document: self.max_document_size,
        }
    }

    /// Retention window and warning lead for delivered media
    #[must_use]
    pub const fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            retention: Duration::from_secs(self.auto_delete_after_secs),
            warning_lead: Duration::from_secs(self.deletion_warning_secs),
        }
    }

    /// Download connect/read timeout
    #[must_use]
    pub const fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// HEAD probe timeout
    #[must_use]
    pub const fn head_timeout(&self) -> Duration {
        Duration::from_secs(self.head_timeout_secs)
    }

    /// yt-dlp timeout
    #[must_use]
    pub const fn ytdlp_timeout(&self) -> Duration {
        Duration::from_secs(self.ytdlp_timeout_secs)
    }
}
