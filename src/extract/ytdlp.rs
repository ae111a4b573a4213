//! yt-dlp strategy: video platforms and anything else yt-dlp understands.
//!
//! Metadata is fetched first (`-J`) to pick a format that fits the video size
//! limit, then the media is downloaded into a fresh job directory.

use super::{ExtractError, Extractor};
use crate::config::Settings;
use crate::media::detection::{extension_from_path, is_supported_media_path};
use crate::media::{MediaFile, MediaKind, TempStore};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};
use url::Url;

/// Patterns indicating fatal, unrecoverable yt-dlp errors
const FATAL_ERROR_PATTERNS: &[&str] = &[
    "Video unavailable",
    "Private video",
    "This video is not available",
    "Sign in to confirm your age",
    "age-restricted",
    "members-only",
    "This video is private",
    "removed by the uploader",
    "no longer available",
    "blocked it in your country",
    "geo-restricted",
    "copyright claim",
    "This video has been removed",
    "ERROR: Unsupported URL",
    "is not a valid URL",
    "Unable to extract video data",
    "Premieres in",
    "This live event will begin",
    "HTTP Error 403",
    "HTTP Error 404",
    "Sign in to view this video",
];

/// Patterns indicating transient errors that might be resolved with retry
const RETRYABLE_ERROR_PATTERNS: &[&str] = &[
    "Connection reset",
    "Connection timed out",
    "Unable to download webpage",
    "HTTP Error 429", // Too Many Requests
    "HTTP Error 503", // Service Unavailable
    "Read timed out",
    "network is unreachable",
    "Temporary failure in name resolution",
];

/// Check if error message indicates a fatal, unrecoverable error
fn is_fatal_ytdlp_error(error_msg: &str) -> bool {
    FATAL_ERROR_PATTERNS
        .iter()
        .any(|pattern| error_msg.contains(pattern))
}

/// Check if error message indicates a retryable error
fn is_retryable_ytdlp_error(error_msg: &str) -> bool {
    RETRYABLE_ERROR_PATTERNS
        .iter()
        .any(|pattern| error_msg.contains(pattern))
}

/// Subset of `yt-dlp -J` output we care about
#[derive(Debug, Deserialize)]
struct VideoInfo {
    title: Option<String>,
    #[serde(default)]
    entries: Option<Vec<VideoInfo>>,
    #[serde(default)]
    formats: Vec<FormatInfo>,
}

#[derive(Debug, Deserialize)]
struct FormatInfo {
    format_id: String,
    filesize: Option<u64>,
    filesize_approx: Option<u64>,
    quality: Option<f64>,
}

impl FormatInfo {
    fn size(&self) -> Option<u64> {
        self.filesize.or(self.filesize_approx).filter(|s| *s > 0)
    }
}

impl VideoInfo {
    /// Playlists are reduced to their first entry
    fn into_single(self) -> Option<Self> {
        match self.entries {
            Some(entries) => entries.into_iter().next(),
            None => Some(self),
        }
    }
}

/// Highest-quality format with a known size within `max_size`
fn select_format(formats: &[FormatInfo], max_size: u64) -> Option<&FormatInfo> {
    formats
        .iter()
        .filter(|f| f.size().is_some_and(|s| s <= max_size))
        .fold(None, |best: Option<&FormatInfo>, f| match best {
            Some(b) if b.quality.unwrap_or(0.0) >= f.quality.unwrap_or(0.0) => Some(b),
            _ => Some(f),
        })
}

/// Downloads media through the yt-dlp command line tool
pub struct YtdlpExtractor {
    binary: String,
    temp: TempStore,
    max_size: u64,
    timeout: Duration,
}

impl YtdlpExtractor {
    /// Create the extractor from settings
    #[must_use]
    pub fn new(temp: TempStore, settings: &Settings) -> Self {
        Self {
            binary: settings.ytdlp_path.clone(),
            temp,
            max_size: settings.max_video_size,
            timeout: settings.ytdlp_timeout(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String, ExtractError> {
        debug!(binary = %self.binary, ?args, "Executing yt-dlp command");

        let child = Command::new(&self.binary)
            .args(args)
            .kill_on_drop(true)
            .output();

        let output: Output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| ExtractError::Ytdlp(format!("timed out after {:?}", self.timeout)))??;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let error_msg = if stderr.trim().is_empty() {
            String::from_utf8_lossy(&output.stdout).into_owned()
        } else {
            stderr.into_owned()
        };
        let error_msg = error_msg.trim().to_string();

        if is_fatal_ytdlp_error(&error_msg) {
            warn!(error = %error_msg, "Fatal yt-dlp error detected");
        } else if is_retryable_ytdlp_error(&error_msg) {
            warn!(error = %error_msg, "Retryable yt-dlp error detected");
        }
        Err(ExtractError::Ytdlp(error_msg))
    }

    async fn fetch_info(&self, url: &Url) -> Result<Option<VideoInfo>, ExtractError> {
        let stdout = self
            .run(&["-J", "--no-playlist", "--no-warnings", url.as_str()])
            .await?;
        let info: VideoInfo = serde_json::from_str(&stdout)
            .map_err(|e| ExtractError::Ytdlp(format!("invalid metadata: {e}")))?;
        Ok(info.into_single())
    }

    async fn download(
        &self,
        url: &Url,
        format_id: Option<&str>,
        dir: &Path,
    ) -> Result<(), ExtractError> {
        let args = download_args(url, format_id, dir, self.max_size);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&args).await.map(|_| ())
    }
}

/// Arguments for downloading the first item behind `url` into `dir`
fn download_args(url: &Url, format_id: Option<&str>, dir: &Path, max_size: u64) -> Vec<String> {
    let template = dir.join("%(title).80s.%(ext)s");
    let mut args: Vec<String> = [
        "--no-playlist",
        "--playlist-items",
        "1",
        "--no-warnings",
        "--no-part",
        "--max-filesize",
    ]
    .into_iter()
    .map(str::to_string)
    .collect();
    args.push(max_size.to_string());
    args.push("-o".to_string());
    args.push(template.to_string_lossy().into_owned());
    if let Some(id) = format_id {
        args.push("-f".to_string());
        args.push(id.to_string());
    }
    args.push(url.to_string());
    args
}

/// Every supported media file yt-dlp left in `dir`
async fn collect_downloads(
    dir: &Path,
    url: &Url,
    title: Option<&str>,
) -> Result<Vec<MediaFile>, ExtractError> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path: PathBuf = entry.path();
        let meta = entry.metadata().await?;
        if !meta.is_file() || !is_supported_media_path(&path) {
            continue;
        }

        let kind = extension_from_path(&path)
            .and_then(|ext| MediaKind::from_extension(&ext))
            .unwrap_or(MediaKind::Document);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        files.push(MediaFile {
            path,
            file_name,
            size: meta.len(),
            kind,
            source_url: url.clone(),
            content_type: None,
            title: Some(title.unwrap_or("Unknown").to_string()),
        });
    }

    files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(files)
}

#[async_trait]
impl Extractor for YtdlpExtractor {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn accepts(&self, _url: &Url) -> bool {
        true
    }

    async fn extract(&self, url: &Url) -> Result<Vec<MediaFile>, ExtractError> {
        let Some(info) = self.fetch_info(url).await? else {
            return Ok(Vec::new());
        };
        if info.formats.is_empty() {
            debug!(url = %url, "yt-dlp reported no formats");
            return Ok(Vec::new());
        }

        // Without a sized format that fits, let yt-dlp choose and rely on --max-filesize
        let format_id = select_format(&info.formats, self.max_size).map(|f| f.format_id.clone());

        let dir = self.temp.job_dir().await?;
        let result = match self.download(url, format_id.as_deref(), &dir).await {
            Ok(()) => collect_downloads(&dir, url, info.title.as_deref()).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(files) if !files.is_empty() => {
                info!(url = %url, count = files.len(), "Extracted media files using yt-dlp");
                Ok(files)
            }
            other => {
                self.temp.cleanup_dir(&dir).await;
                other
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> VideoInfo {
        match serde_json::from_str(json) {
            Ok(info) => info,
            Err(e) => panic!("bad fixture: {e}"),
        }
    }

    #[test]
    fn test_download_takes_first_playlist_item_only() {
        let url = match Url::parse("https://www.youtube.com/playlist?list=PL123") {
            Ok(u) => u,
            Err(e) => panic!("bad url: {e}"),
        };
        let args = download_args(&url, Some("22"), Path::new("/tmp/job"), 1024);

        let items = args.iter().position(|a| a == "--playlist-items");
        assert_eq!(items.and_then(|i| args.get(i + 1)).map(String::as_str), Some("1"));
        let format = args.iter().position(|a| a == "-f");
        assert_eq!(format.and_then(|i| args.get(i + 1)).map(String::as_str), Some("22"));
        let size = args.iter().position(|a| a == "--max-filesize");
        assert_eq!(size.and_then(|i| args.get(i + 1)).map(String::as_str), Some("1024"));
        assert!(args.contains(&"/tmp/job/%(title).80s.%(ext)s".to_string()));
        assert_eq!(args.last().map(String::as_str), Some(url.as_str()));
    }

    #[test]
    fn test_fatal_error_detection() {
        assert!(is_fatal_ytdlp_error("ERROR: [youtube] abc: Private video"));
        assert!(is_fatal_ytdlp_error("ERROR: Unsupported URL: https://example.com"));
        assert!(!is_fatal_ytdlp_error("Connection reset by peer"));
    }

    #[test]
    fn test_retryable_error_detection() {
        assert!(is_retryable_ytdlp_error("HTTP Error 429: Too Many Requests"));
        assert!(!is_retryable_ytdlp_error("Private video"));
    }

    #[test]
    fn test_select_best_quality_within_limit() {
        let info = parse(
            r#"{"title":"clip","formats":[
                {"format_id":"low","filesize":100,"quality":1},
                {"format_id":"high","filesize":900,"quality":3},
                {"format_id":"huge","filesize":5000,"quality":9},
                {"format_id":"unknown","quality":7}
            ]}"#,
        );
        let chosen = select_format(&info.formats, 1000).map(|f| f.format_id.as_str());
        assert_eq!(chosen, Some("high"));
    }

    #[test]
    fn test_select_uses_approximate_size() {
        let info = parse(
            r#"{"formats":[{"format_id":"a","filesize_approx":10,"quality":2}]}"#,
        );
        assert_eq!(
            select_format(&info.formats, 50).map(|f| f.format_id.as_str()),
            Some("a")
        );
        assert!(select_format(&info.formats, 5).is_none());
    }

    #[test]
    fn test_playlist_takes_first_entry() {
        let info = parse(
            r#"{"title":"list","entries":[
                {"title":"first","formats":[{"format_id":"1"}]},
                {"title":"second","formats":[]}
            ]}"#,
        );
        let single = info.into_single();
        assert_eq!(single.and_then(|i| i.title).as_deref(), Some("first"));

        let empty = parse(r#"{"title":"list","entries":[]}"#);
        assert!(empty.into_single().is_none());
    }

    #[tokio::test]
    async fn test_collect_downloads_keeps_media_only() -> Result<(), ExtractError> {
        let dir = std::env::temp_dir().join(format!("ytdlp-test-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join("My Clip.mp4"), b"video").await?;
        tokio::fs::write(dir.join("My Clip.info.json"), b"{}").await?;
        tokio::fs::write(dir.join("thumb.webp"), b"img").await?;

        let url = match Url::parse("https://video.example/watch?v=1") {
            Ok(u) => u,
            Err(e) => panic!("{e}"),
        };
        let files = collect_downloads(&dir, &url, Some("My Clip")).await?;
        tokio::fs::remove_dir_all(&dir).await?;

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].file_name, "My Clip.mp4");
        assert_eq!(files[0].kind, MediaKind::Video);
        assert_eq!(files[0].size, 5);
        assert_eq!(files[1].kind, MediaKind::Image);
        assert_eq!(files[1].title.as_deref(), Some("My Clip"));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_binary_is_an_error() {
        let root = std::env::temp_dir().join(format!("ytdlp-bin-{}", uuid::Uuid::new_v4()));
        let temp = match TempStore::new(root) {
            Ok(t) => t,
            Err(e) => panic!("{e}"),
        };
        let mut settings = Settings::with_token("dummy");
        settings.ytdlp_path = "definitely-not-a-real-yt-dlp-binary".to_string();
        let extractor = YtdlpExtractor::new(temp, &settings);

        let url = match Url::parse("https://video.example/watch?v=1") {
            Ok(u) => u,
            Err(e) => panic!("{e}"),
        };
        assert!(matches!(
            extractor.extract(&url).await,
            Err(ExtractError::Io(_))
        ));
    }
}
