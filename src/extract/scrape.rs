//! Scrape strategy: media referenced from an ordinary HTML page.

// lazy_regex! uses once_cell internally
#![allow(clippy::non_std_lazy_statics)]

use super::direct::DirectExtractor;
use super::{ExtractError, Extractor};
use crate::config::Settings;
use crate::media::detection::is_supported_media_url;
use crate::media::MediaFile;
use async_trait::async_trait;
use futures_util::StreamExt;
use lazy_regex::lazy_regex;
use reqwest::header::CONTENT_TYPE;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Image links embedded in the inline scripts of a Google Images result page
static RE_SCRIPT_IMAGE: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r#""(https?://[^"]*\.(?:jpg|jpeg|png|gif|webp)(?:\?[^"]*)?)""#);

/// Hosts whose script-embedded images are worth downloading
const SCRIPT_IMAGE_HOSTS: &[&str] = &["googleusercontent.com", "wikimedia.org"];

/// Maximum images taken from Google Images scripts
const MAX_SCRIPT_IMAGES: usize = 3;

/// `img` elements smaller than this in either declared dimension are skipped
const MIN_IMAGE_DIMENSION: u32 = 100;

/// Largest page body read for scraping
pub const MAX_PAGE_SIZE: u64 = 5 * 1024 * 1024;

/// Content types worth parsing for embedded media
const PAGE_CONTENT_TYPES: &[&str] = &["text/html", "application/xhtml+xml"];

/// Ordered set of candidate URLs
#[derive(Default)]
struct Candidates {
    seen: HashSet<String>,
    urls: Vec<Url>,
}

impl Candidates {
    fn push(&mut self, url: Url) -> bool {
        if self.seen.insert(url.as_str().to_string()) {
            self.urls.push(url);
            true
        } else {
            false
        }
    }

    /// Resolve `raw` against `page` and keep it if it names a media file
    fn push_resolved(&mut self, page: &Url, raw: &str) {
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with("data:") {
            return;
        }
        if let Ok(url) = page.join(raw) {
            if is_supported_media_url(&url) {
                self.push(url);
            }
        }
    }

    fn len(&self) -> usize {
        self.urls.len()
    }
}

fn is_google_images(page: &Url) -> bool {
    page.host_str().is_some_and(|h| h.contains("google.com"))
        && page.query_pairs().any(|(k, v)| k == "tbm" && v == "isch")
}

fn is_tiny(element: &scraper::ElementRef<'_>) -> bool {
    let dim = |name: &str| {
        element
            .value()
            .attr(name)
            .and_then(|v| v.trim().parse::<u32>().ok())
    };
    match (dim("width"), dim("height")) {
        (Some(w), Some(h)) => w < MIN_IMAGE_DIMENSION || h < MIN_IMAGE_DIMENSION,
        _ => false,
    }
}

fn select_attr(document: &Html, candidates: &mut Candidates, page: &Url, css: &str, attr: &str) {
    let Ok(selector) = Selector::parse(css) else {
        return;
    };
    for element in document.select(&selector) {
        if let Some(value) = element.value().attr(attr) {
            candidates.push_resolved(page, value);
        }
    }
}

fn mine_scripts(document: &Html, candidates: &mut Candidates) {
    let Ok(selector) = Selector::parse("script") else {
        return;
    };
    let mut found = 0;
    for script in document.select(&selector) {
        let body: String = script.text().collect();
        for capture in RE_SCRIPT_IMAGE.captures_iter(&body) {
            let raw = &capture[1];
            if !SCRIPT_IMAGE_HOSTS.iter().any(|host| raw.contains(host)) {
                continue;
            }
            if let Ok(url) = Url::parse(raw) {
                if candidates.push(url) {
                    found += 1;
                }
            }
            if found >= MAX_SCRIPT_IMAGES {
                return;
            }
        }
    }
}

/// Media URLs referenced by `html`, resolved against `page`, in document order
/// per source and without duplicates.
///
/// # Examples
///
/// ```
/// use media_extractor_bot::extract::scrape::collect_media_urls;
/// use url::Url;
///
/// let page = Url::parse("https://example.com/post/1").unwrap();
/// let html = r#"<img src="/a.png"><a href="b.mp4">clip</a><a href="/about">x</a>"#;
/// let urls = collect_media_urls(&page, html);
/// assert_eq!(urls.len(), 2);
/// assert_eq!(urls[0].as_str(), "https://example.com/a.png");
/// ```
#[must_use]
pub fn collect_media_urls(page: &Url, html: &str) -> Vec<Url> {
    let document = Html::parse_document(html);
    let mut candidates = Candidates::default();

    if is_google_images(page) {
        mine_scripts(&document, &mut candidates);
    }

    if let Ok(selector) = Selector::parse("img[src]") {
        for img in document.select(&selector) {
            if is_tiny(&img) {
                continue;
            }
            if let Some(src) = img.value().attr("src") {
                candidates.push_resolved(page, src);
            }
        }
    }

    select_attr(&document, &mut candidates, page, "img[data-src]", "data-src");
    select_attr(&document, &mut candidates, page, "video[src]", "src");
    select_attr(&document, &mut candidates, page, "source[src]", "src");
    select_attr(&document, &mut candidates, page, "a[href]", "href");
    select_attr(
        &document,
        &mut candidates,
        page,
        r#"meta[property="og:image"]"#,
        "content",
    );

    debug!(page = %page, count = candidates.len(), "Collected media candidates");
    candidates.urls
}

/// Downloads media found in the HTML of a web page
pub struct ScrapeExtractor {
    client: reqwest::Client,
    direct: Arc<DirectExtractor>,
    max_media: usize,
    max_page_size: u64,
}

impl ScrapeExtractor {
    /// Candidates are downloaded through `direct`
    #[must_use]
    pub fn new(client: reqwest::Client, direct: Arc<DirectExtractor>, settings: &Settings) -> Self {
        Self {
            client,
            direct,
            max_media: settings.max_scraped_media,
            max_page_size: MAX_PAGE_SIZE,
        }
    }

    /// HTML of the page, `None` when the link serves something else
    async fn fetch_page(&self, url: &Url) -> Result<Option<String>, ExtractError> {
        let response = self.client.get(url.as_str()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_ascii_lowercase());
        if let Some(ct) = content_type.as_deref() {
            if !PAGE_CONTENT_TYPES.iter().any(|page| ct.starts_with(page)) {
                debug!(url = %url, content_type = %ct, "Not a web page, skipping scrape");
                return Ok(None);
            }
        }

        if let Some(size) = response.content_length() {
            if size > self.max_page_size {
                return Err(ExtractError::TooLarge {
                    size,
                    limit: self.max_page_size,
                });
            }
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if (body.len() + chunk.len()) as u64 > self.max_page_size {
                return Err(ExtractError::TooLarge {
                    size: (body.len() + chunk.len()) as u64,
                    limit: self.max_page_size,
                });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(Some(String::from_utf8_lossy(&body).into_owned()))
    }
}

#[async_trait]
impl Extractor for ScrapeExtractor {
    fn name(&self) -> &'static str {
        "scrape"
    }

    async fn accepts(&self, _url: &Url) -> bool {
        true
    }

    async fn extract(&self, url: &Url) -> Result<Vec<MediaFile>, ExtractError> {
        let Some(html) = self.fetch_page(url).await? else {
            return Ok(Vec::new());
        };
        let candidates = collect_media_urls(url, &html);

        let mut files = Vec::new();
        for candidate in candidates.into_iter().take(self.max_media) {
            match self.direct.download(&candidate).await {
                Ok(file) => files.push(file),
                Err(e) => {
                    debug!(url = %candidate, error = %e, "Failed to download scraped media");
                }
            }
        }

        if !files.is_empty() {
            info!(page = %url, count = files.len(), "Scraped media files from page");
        }
        Ok(files)
    }
}
