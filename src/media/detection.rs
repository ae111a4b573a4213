//! Media type detection from URLs, paths, headers and file contents.

use percent_encoding::percent_decode_str;
use sha2::{Digest, Sha256};
use std::path::Path;
use url::Url;

/// Extensions treated as images
pub const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp", ".bmp"];

/// Extensions treated as videos
pub const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".avi", ".mov", ".mkv", ".webm", ".m4v"];

/// Bytes inspected when checking whether a download is really an HTML page
pub const HTML_SNIFF_LEN: usize = 1000;

/// Lowercase extension (with dot) of the percent-decoded URL path
#[must_use]
pub fn extension_from_url(url: &Url) -> Option<String> {
    let path = percent_decode_str(url.path()).decode_utf8_lossy();
    extension_from_path(Path::new(path.as_ref()))
}

/// Lowercase extension (with dot) of a filesystem path
#[must_use]
pub fn extension_from_path(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
}

/// True when the URL path ends in a supported image or video extension
#[must_use]
pub fn is_supported_media_url(url: &Url) -> bool {
    extension_from_url(url).is_some_and(|ext| is_supported_extension(&ext))
}

/// True when the path ends in a supported image or video extension
#[must_use]
pub fn is_supported_media_path(path: &Path) -> bool {
    extension_from_path(path).is_some_and(|ext| is_supported_extension(&ext))
}

fn is_supported_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext) || VIDEO_EXTENSIONS.contains(&ext)
}

/// True when a `Content-Type` value names an image or a video
#[must_use]
pub fn is_media_content_type(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.starts_with("image/") || ct.starts_with("video/")
}

/// File extension to store a download under, derived from its content type.
///
/// Images always get an image extension (unknown subtypes become `.jpg`).
#[must_use]
pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let parsed: mime::Mime = content_type.trim().parse().ok()?;
    let subtype = parsed.subtype().as_str().to_ascii_lowercase();

    let top = parsed.type_();
    if top == mime::IMAGE {
        Some(match subtype.as_str() {
            "png" => ".png",
            "gif" => ".gif",
            "webp" => ".webp",
            "bmp" | "x-ms-bmp" => ".bmp",
            _ => ".jpg",
        })
    } else if top == mime::VIDEO {
        match subtype.as_str() {
            "mp4" => Some(".mp4"),
            "webm" => Some(".webm"),
            "quicktime" => Some(".mov"),
            "x-matroska" => Some(".mkv"),
            "x-msvideo" => Some(".avi"),
            "x-m4v" => Some(".m4v"),
            _ => None,
        }
    } else {
        None
    }
}

/// Display name for a download.
///
/// Uses the last path segment when it looks like a file name, otherwise
/// `media_` followed by 8 hex characters of a hash of the URL.
#[must_use]
pub fn file_name_from_url(url: &Url) -> String {
    let path = percent_decode_str(url.path()).decode_utf8_lossy();
    let name = Path::new(path.as_ref())
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    if name.contains('.') {
        return name.to_string();
    }

    let digest = format!("{:x}", Sha256::digest(url.as_str().as_bytes()));
    format!("media_{}", &digest[..8])
}

/// True when a response is an HTML page rather than media
#[must_use]
pub fn looks_like_html(content_type: Option<&str>, head: &[u8]) -> bool {
    if content_type.is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("text/html")) {
        return true;
    }
    let sniff = &head[..head.len().min(HTML_SNIFF_LEN)];
    sniff
        .windows(5)
        .any(|w| w.eq_ignore_ascii_case(b"<html"))
}

/// MIME type guessed from magic bytes
#[must_use]
pub fn sniff_mime(head: &[u8]) -> Option<&'static str> {
    infer::get(head).map(|kind| kind.mime_type())
}

/// True when the magic bytes belong to an image format
#[must_use]
pub fn is_valid_image(head: &[u8]) -> bool {
    infer::is_image(head)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        match Url::parse(s) {
            Ok(u) => u,
            Err(e) => panic!("bad test url {s}: {e}"),
        }
    }

    #[test]
    fn extension_ignores_query_and_case() {
        assert_eq!(
            extension_from_url(&url("https://x.com/a/Photo.JPG?size=large")).as_deref(),
            Some(".jpg")
        );
        assert_eq!(extension_from_url(&url("https://x.com/a/")), None);
        assert_eq!(
            extension_from_url(&url("https://x.com/my%20clip.webm")).as_deref(),
            Some(".webm")
        );
    }

    #[test]
    fn supported_media_urls() {
        assert!(is_supported_media_url(&url("https://x.com/cat.gif")));
        assert!(is_supported_media_url(&url("https://x.com/v.MKV")));
        assert!(!is_supported_media_url(&url("https://x.com/doc.pdf")));
        assert!(!is_supported_media_url(&url("https://x.com/watch?v=abc")));
        assert!(is_supported_media_path(Path::new("/tmp/x/clip.mp4")));
    }

    #[test]
    fn content_type_extensions() {
        assert_eq!(extension_for_content_type("image/jpeg"), Some(".jpg"));
        assert_eq!(extension_for_content_type("image/png; q=1"), Some(".png"));
        assert_eq!(extension_for_content_type("image/svg+xml"), Some(".jpg"));
        assert_eq!(extension_for_content_type("video/quicktime"), Some(".mov"));
        assert_eq!(extension_for_content_type("video/ogg"), None);
        assert_eq!(extension_for_content_type("application/json"), None);
    }

    #[test]
    fn media_content_types() {
        assert!(is_media_content_type("Image/PNG"));
        assert!(is_media_content_type("video/mp4"));
        assert!(!is_media_content_type("text/html"));
    }

    #[test]
    fn file_name_uses_last_segment() {
        assert_eq!(
            file_name_from_url(&url("https://x.com/pics/sunset%20beach.jpg")),
            "sunset beach.jpg"
        );
    }

    #[test]
    fn file_name_falls_back_to_hash() {
        let name = file_name_from_url(&url("https://x.com/watch?v=abc"));
        assert!(name.starts_with("media_"));
        assert_eq!(name.len(), "media_".len() + 8);
        // Stable for the same URL
        assert_eq!(name, file_name_from_url(&url("https://x.com/watch?v=abc")));
    }

    #[test]
    fn html_detection() {
        assert!(looks_like_html(Some("text/html; charset=utf-8"), b""));
        assert!(looks_like_html(None, b"<!DOCTYPE html>\n<HTML lang=en>"));
        assert!(!looks_like_html(Some("image/png"), &[0x89, b'P', b'N', b'G']));

        let mut late = vec![b' '; HTML_SNIFF_LEN];
        late.extend_from_slice(b"<html>");
        assert!(!looks_like_html(None, &late));
    }

    #[test]
    fn magic_bytes() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00];
        assert_eq!(sniff_mime(&png), Some("image/png"));
        assert!(is_valid_image(&png));

        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
        assert!(is_valid_image(&jpeg));

        assert!(!is_valid_image(b"<html><body>nope</body></html>"));
        assert!(sniff_mime(&[0x00, 0x11, 0x22]).is_none());
    }
}
