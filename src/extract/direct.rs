use super::{ExtractError, Extractor};
use crate::config::Settings;
use crate::media::detection::{
    extension_for_content_type, extension_from_url, file_name_from_url, is_media_content_type,
    is_supported_media_url, looks_like_html, sniff_mime, HTML_SNIFF_LEN,
};
use crate::media::{MediaFile, MediaKind, TempStore};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{debug, info};
use url::Url;

/// Downloads links that point straight at an image or video file
pub struct DirectExtractor {
    client: reqwest::Client,
    temp: TempStore,
    max_size: u64,
    head_timeout: Duration,
    max_retries: usize,
}

impl DirectExtractor {
    /// Create the extractor; `client` carries the user agent and timeouts
    #[must_use]
    pub fn new(client: reqwest::Client, temp: TempStore, settings: &Settings) -> Self {
        Self {
            client,
            temp,
            max_size: settings.max_document_size,
            head_timeout: settings.head_timeout(),
            max_retries: settings.max_retries,
        }
    }

    /// `Content-Type` reported by a HEAD request, `None` on any failure
    pub async fn probe_content_type(&self, url: &Url) -> Option<String> {
        let response = match self
            .client
            .head(url.as_str())
            .timeout(self.head_timeout)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                debug!(url = %url, error = %e, "Error checking content type");
                return None;
            }
        };

        response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase)
    }

    async fn fetch(&self, url: &Url) -> Result<reqwest::Response, ExtractError> {
        let strategy = ExponentialBackoff::from_millis(500)
            .max_delay(Duration::from_secs(4))
            .map(jitter)
            .take(self.max_retries.saturating_sub(1));

        let response = RetryIf::spawn(
            strategy,
            || self.client.get(url.as_str()).send(),
            |e: &reqwest::Error| e.is_timeout() || e.is_connect() || e.is_request(),
        )
        .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::Status(status.as_u16()));
        }
        Ok(response)
    }

    /// Download `url` into the temp store.
    ///
    /// # Errors
    ///
    /// Fails on network errors, non-success statuses, bodies above the size
    /// cap and HTML pages served in place of media.
    pub async fn download(&self, url: &Url) -> Result<MediaFile, ExtractError> {
        let response = self.fetch(url).await?;

        if let Some(size) = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
        {
            if size > self.max_size {
                return Err(ExtractError::TooLarge {
                    size,
                    limit: self.max_size,
                });
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_ascii_lowercase());

        if looks_like_html(content_type.as_deref(), &[]) {
            return Err(ExtractError::HtmlContent);
        }

        let extension = content_type
            .as_deref()
            .and_then(extension_for_content_type)
            .map(str::to_string)
            .or_else(|| extension_from_url(url));
        let path = self.temp.file_path(extension.as_deref());

        let (size, head) = match self.stream_to_file(response, &path).await {
            Ok(streamed) => streamed,
            Err(e) => {
                self.temp.cleanup(&path).await;
                return Err(e);
            }
        };

        let file_name = file_name_from_url(url);
        let kind = detect_kind(
            content_type.as_deref(),
            sniff_mime(&head),
            &path,
            url,
            &file_name,
        );

        info!(file_name = %file_name, size, kind = %kind, "Downloaded direct media");

        Ok(MediaFile {
            path,
            file_name,
            size,
            kind,
            source_url: url.clone(),
            content_type,
            title: None,
        })
    }

    async fn stream_to_file(
        &self,
        response: reqwest::Response,
        path: &Path,
    ) -> Result<(u64, Vec<u8>), ExtractError> {
        let mut file = tokio::fs::File::create(path).await?;
        let mut stream = response.bytes_stream();
        let mut head: Vec<u8> = Vec::with_capacity(HTML_SNIFF_LEN);
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            if written > self.max_size {
                return Err(ExtractError::TooLarge {
                    size: written,
                    limit: self.max_size,
                });
            }
            if head.len() < HTML_SNIFF_LEN {
                let take = (HTML_SNIFF_LEN - head.len()).min(chunk.len());
                head.extend_from_slice(&chunk[..take]);
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        if looks_like_html(None, &head) {
            return Err(ExtractError::HtmlContent);
        }
        Ok((written, head))
    }
}

/// Kind from the content type first, then from the magic bytes, the stored
/// file, the link and the display name; anything unrecognised is a document.
fn detect_kind(
    content_type: Option<&str>,
    sniffed: Option<&str>,
    path: &Path,
    url: &Url,
    file_name: &str,
) -> MediaKind {
    content_type
        .and_then(MediaKind::from_content_type)
        .or_else(|| sniffed.and_then(MediaKind::from_content_type))
        .or_else(|| {
            crate::media::detection::extension_from_path(path)
                .and_then(|ext| MediaKind::from_extension(&ext))
        })
        .or_else(|| extension_from_url(url).and_then(|ext| MediaKind::from_extension(&ext)))
        .or_else(|| {
            crate::media::detection::extension_from_path(Path::new(file_name))
                .and_then(|ext| MediaKind::from_extension(&ext))
        })
        .unwrap_or(MediaKind::Document)
}

#[async_trait]
impl Extractor for DirectExtractor {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn accepts(&self, url: &Url) -> bool {
        if is_supported_media_url(url) {
            return true;
        }
        self.probe_content_type(url)
            .await
            .is_some_and(|ct| is_media_content_type(&ct))
    }

    fn authoritative(&self) -> bool {
        true
    }

    async fn extract(&self, url: &Url) -> Result<Vec<MediaFile>, ExtractError> {
        Ok(vec![self.download(url).await?])
    }
}
