use super::types::MediaKind;
use crate::utils::format_size;

/// Per-kind size caps in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeLimits {
    /// Images above this are rejected
    pub image: u64,
    /// Videos above this are rejected
    pub video: u64,
    /// Documents above this are rejected; also the hard cap for downloads
    pub document: u64,
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self {
            image: crate::config::MAX_PHOTO_SIZE,
            video: crate::config::MAX_VIDEO_SIZE,
            document: crate::config::MAX_DOCUMENT_SIZE,
        }
    }
}

/// How a file will be sent, or why it will not be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// `sendPhoto`
    Photo,
    /// `sendVideo`
    Video,
    /// `sendDocument`
    Document,
    /// Not sent at all
    Reject(String),
}

impl SizeLimits {
    /// Decide how a file of `kind` and `size` bytes is delivered.
    ///
    /// `image_valid` only matters for images: an image whose bytes do not
    /// decode as an image is sent as a document instead of a photo.
    ///
    /// # Examples
    ///
    /// ```
    /// use media_extractor_bot::media::{Delivery, MediaKind, SizeLimits};
    ///
    /// let limits = SizeLimits::default();
    /// assert_eq!(limits.classify(MediaKind::Image, 1024, true), Delivery::Photo);
    /// assert!(matches!(
    ///     limits.classify(MediaKind::Video, 4 * 1024 * 1024 * 1024, true),
    ///     Delivery::Reject(_)
    /// ));
    /// ```
    #[must_use]
    pub fn classify(&self, kind: MediaKind, size: u64, image_valid: bool) -> Delivery {
        match kind {
            MediaKind::Image if size > self.image => Delivery::Reject(format!(
                "Image too large: {} (max: {})",
                format_size(size),
                format_size(self.image)
            )),
            MediaKind::Image if image_valid => Delivery::Photo,
            MediaKind::Image | MediaKind::Document if size > self.document => {
                Delivery::Reject(format!(
                    "File too large: {} (max: {})",
                    format_size(size),
                    format_size(self.document)
                ))
            }
            MediaKind::Image | MediaKind::Document => Delivery::Document,
            MediaKind::Video if size > self.video => Delivery::Reject(format!(
                "Video too large: {} (max: {})",
                format_size(size),
                format_size(self.video)
            )),
            MediaKind::Video => Delivery::Video,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;
    const GB: u64 = 1024 * MB;

    #[test]
    fn images_within_limit_are_photos() {
        let limits = SizeLimits::default();
        assert_eq!(limits.classify(MediaKind::Image, 200 * MB, true), Delivery::Photo);
    }

    #[test]
    fn oversized_images_are_rejected() {
        let limits = SizeLimits::default();
        let Delivery::Reject(reason) = limits.classify(MediaKind::Image, 200 * MB + 1, true)
        else {
            panic!("image over 200MB must be rejected");
        };
        assert!(reason.contains("Image too large"));
    }

    #[test]
    fn invalid_images_become_documents() {
        let limits = SizeLimits::default();
        assert_eq!(
            limits.classify(MediaKind::Image, 10 * MB, false),
            Delivery::Document
        );
    }

    #[test]
    fn video_limit_is_inclusive() {
        let limits = SizeLimits::default();
        assert_eq!(limits.classify(MediaKind::Video, 3 * GB, true), Delivery::Video);
        assert!(matches!(
            limits.classify(MediaKind::Video, 3 * GB + 1, true),
            Delivery::Reject(_)
        ));
    }

    #[test]
    fn documents_respect_document_limit() {
        let limits = SizeLimits {
            image: MB,
            video: MB,
            document: 2 * MB,
        };
        assert_eq!(
            limits.classify(MediaKind::Document, 2 * MB, true),
            Delivery::Document
        );
        assert!(matches!(
            limits.classify(MediaKind::Document, 2 * MB + 1, true),
            Delivery::Reject(_)
        ));
    }
}
