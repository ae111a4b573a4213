use super::detection::{IMAGE_EXTENSIONS, VIDEO_EXTENSIONS};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// How a piece of media is treated when it is sent back to the chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Still image, sent as a photo when it passes validation
    Image,
    /// Video clip
    Video,
    /// Anything else, sent as a file
    Document,
}

impl MediaKind {
    /// Kind for a lowercase extension with leading dot (`.jpg`)
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Video)
        } else {
            None
        }
    }

    /// Kind for a `Content-Type` header value, ignoring parameters
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let parsed: mime::Mime = content_type.trim().parse().ok()?;
        let top = parsed.type_();
        if top == mime::IMAGE {
            Some(Self::Image)
        } else if top == mime::VIDEO {
            Some(Self::Video)
        } else {
            None
        }
    }

    /// Stable lowercase name used in logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Document => "document",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A downloaded media item waiting on local disk to be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    /// Location of the temporary file
    pub path: PathBuf,
    /// Name shown to the user
    pub file_name: String,
    /// Size in bytes
    pub size: u64,
    /// Detected kind
    pub kind: MediaKind,
    /// Link the file was extracted from
    pub source_url: Url,
    /// `Content-Type` reported by the server, if any
    pub content_type: Option<String>,
    /// Title reported by yt-dlp, if any
    pub title: Option<String>,
}
