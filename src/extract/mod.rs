//! Media extraction from web links.
//!
//! Three strategies are tried in order, the first one that yields media wins:
//!
//! 1. [`DirectExtractor`]: the link itself is an image or video file
//! 2. [`YtdlpExtractor`]: a video platform supported by yt-dlp
//! 3. [`ScrapeExtractor`]: media embedded in an HTML page
//!
//! A strategy that is *authoritative* for a link (the direct strategy once the
//! link is known to be a media file) ends the chain with its error; the other
//! strategies only log their failures and let the next one try.

/// Direct media file download
pub mod direct;
/// Embedded media scraped from HTML pages
pub mod scrape;
/// Video platforms via the yt-dlp binary
pub mod ytdlp;

pub use direct::DirectExtractor;
pub use scrape::ScrapeExtractor;
pub use ytdlp::YtdlpExtractor;

use crate::config::Settings;
use crate::links::is_valid_url;
use crate::media::{MediaFile, TempStore};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

/// Errors that can occur while extracting media from a link
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Link without scheme or host
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    /// Transport-level HTTP failure
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),
    /// Server answered with a non-success status
    #[error("Server returned HTTP {0}")]
    Status(u16),
    /// Local file system failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Download exceeds the configured cap
    #[error("File too large: {size} bytes (max: {limit})")]
    TooLarge {
        /// Bytes seen so far or announced by the server
        size: u64,
        /// Configured cap
        limit: u64,
    },
    /// A "media" link served a web page
    #[error("Downloaded content is HTML, not media")]
    HtmlContent,
    /// yt-dlp failed or produced unusable output
    #[error("yt-dlp error: {0}")]
    Ytdlp(String),
    /// Every strategy came back empty
    #[error("No supported media found on this URL")]
    NoMedia,
}

/// One way of turning a link into downloaded media files
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Whether this strategy should be tried for the link at all
    async fn accepts(&self, url: &Url) -> bool;

    /// Whether an error from this strategy ends the chain
    fn authoritative(&self) -> bool {
        false
    }

    /// Download media for the link; an empty list means "nothing here"
    async fn extract(&self, url: &Url) -> Result<Vec<MediaFile>, ExtractError>;
}

/// The fallback chain of extraction strategies
pub struct MediaExtractor {
    chain: Vec<Arc<dyn Extractor>>,
    temp: TempStore,
}

impl MediaExtractor {
    /// Build the default direct → yt-dlp → scrape chain.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(settings: &Settings, temp: TempStore) -> Result<Self, ExtractError> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .connect_timeout(settings.download_timeout())
            .read_timeout(settings.download_timeout())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        let direct = Arc::new(DirectExtractor::new(client.clone(), temp.clone(), settings));
        let ytdlp = Arc::new(YtdlpExtractor::new(temp.clone(), settings));
        let scrape = Arc::new(ScrapeExtractor::new(client, direct.clone(), settings));

        Ok(Self::with_chain(vec![direct, ytdlp, scrape], temp))
    }

    /// Use a custom chain, tried in the given order
    #[must_use]
    pub fn with_chain(chain: Vec<Arc<dyn Extractor>>, temp: TempStore) -> Self {
        Self { chain, temp }
    }

    /// Extract media from `url`, trying every strategy in turn.
    ///
    /// # Errors
    ///
    /// - [`ExtractError::InvalidUrl`] before any network activity
    /// - the error of an authoritative strategy
    /// - [`ExtractError::NoMedia`] when nothing produced a file
    pub async fn extract(&self, url: &Url) -> Result<Vec<MediaFile>, ExtractError> {
        if !is_valid_url(url) {
            return Err(ExtractError::InvalidUrl(url.to_string()));
        }

        info!(url = %url, "Extracting media");

        for extractor in &self.chain {
            if !extractor.accepts(url).await {
                continue;
            }

            match extractor.extract(url).await {
                Ok(files) if !files.is_empty() => {
                    info!(
                        url = %url,
                        method = extractor.name(),
                        count = files.len(),
                        "Extracted media"
                    );
                    return Ok(files);
                }
                Ok(_) => {
                    debug!(url = %url, method = extractor.name(), "No media found");
                }
                Err(e) if extractor.authoritative() => {
                    error!(url = %url, method = extractor.name(), error = %e, "Error extracting media");
                    return Err(e);
                }
                Err(e) => {
                    debug!(url = %url, method = extractor.name(), error = %e, "Extraction failed, trying next method");
                }
            }
        }

        Err(ExtractError::NoMedia)
    }

    /// Remove a file handed out by [`Self::extract`] once it has been sent
    pub async fn discard(&self, file: &MediaFile) {
        self.temp.cleanup(&file.path).await;
    }
}
