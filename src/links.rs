//! Link detection in incoming chat messages.

// lazy_regex! uses once_cell internally
#![allow(clippy::non_std_lazy_statics)]

use lazy_regex::lazy_regex;
use std::collections::HashSet;
use url::Url;

/// Anything that starts with a web scheme up to whitespace or a quote/bracket
static RE_WEB_URL: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r#"(?i)https?://[^\s<>"'`]+"#);

/// Detect HTTP/HTTPS URLs in text. Returns deduplicated URLs in order of appearance.
///
/// # Examples
///
/// ```
/// use media_extractor_bot::links::extract_urls;
/// let urls = extract_urls("look: https://example.com/cat.jpg, nice");
/// assert_eq!(urls.len(), 1);
/// assert_eq!(urls[0].path(), "/cat.jpg");
/// ```
#[must_use]
pub fn extract_urls(text: &str) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for candidate in RE_WEB_URL.find_iter(text) {
        let trimmed = strip_trailing_punctuation(candidate.as_str());
        let Ok(url) = Url::parse(trimmed) else {
            continue;
        };
        if is_valid_url(&url) && seen.insert(url.to_string()) {
            urls.push(url);
        }
    }

    urls
}

/// A link is usable when it is http(s) and names a host.
#[must_use]
pub fn is_valid_url(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty())
}

fn strip_trailing_punctuation(s: &str) -> &str {
    let mut trimmed = s.trim_end_matches(['.', ',', ';', ':', '!', '?']);
    // Drop an unbalanced closing bracket, e.g. "(see https://a.com/x)"
    while let Some(stripped) = trimmed.strip_suffix(')') {
        if trimmed.matches('(').count() >= trimmed.matches(')').count() {
            break;
        }
        trimmed = stripped.trim_end_matches(['.', ',', ';', ':', '!', '?']);
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_url() {
        let urls = extract_urls("check https://example.com for info");
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].as_str(), "https://example.com/");
    }

    #[test]
    fn multiple_urls_keep_order() {
        let urls = extract_urls("https://c.com/a.png then http://b.org/v.mp4 and https://a.com");
        let hosts: Vec<_> = urls.iter().filter_map(Url::host_str).collect();
        assert_eq!(hosts, vec!["c.com", "b.org", "a.com"]);
    }

    #[test]
    fn deduplication() {
        let urls = extract_urls("https://example.com/x.jpg and https://example.com/x.jpg again");
        assert_eq!(urls.len(), 1);
    }

    #[test]
    fn trailing_punctuation() {
        let urls = extract_urls("Go to https://example.com/page.");
        assert_eq!(urls[0].path(), "/page");

        let urls = extract_urls("Is it https://example.com/pic.jpg?");
        assert_eq!(urls[0].path(), "/pic.jpg");
    }

    #[test]
    fn parentheses() {
        let urls = extract_urls("(see https://example.com/path)");
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].path(), "/path");

        let urls = extract_urls("https://en.wikipedia.org/wiki/Rust_(programming_language)");
        assert_eq!(urls[0].path(), "/wiki/Rust_(programming_language)");
    }

    #[test]
    fn query_is_preserved() {
        let urls = extract_urls("https://www.google.com/search?q=cats&tbm=isch");
        assert_eq!(urls[0].query(), Some("q=cats&tbm=isch"));
    }

    #[test]
    fn no_urls() {
        assert!(extract_urls("just some regular text with no links").is_empty());
        assert!(extract_urls("ftp://files.example.com").is_empty());
        assert!(extract_urls("http://").is_empty());
    }

    #[test]
    fn validity_requires_host() {
        let Ok(url) = Url::parse("https://example.com/a") else {
            panic!("valid url");
        };
        assert!(is_valid_url(&url));

        let Ok(url) = Url::parse("file:///etc/passwd") else {
            panic!("valid url");
        };
        assert!(!is_valid_url(&url));
    }
}
