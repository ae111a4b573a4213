//! Media classification, size policy and temporary storage.

/// Extension, content-type and magic-byte detection
pub mod detection;
/// Size limits and the delivery decision
pub mod limits;
/// Scratch space for downloads
pub mod temp;
/// Media kinds and downloaded files
pub mod types;

pub use limits::{Delivery, SizeLimits};
pub use temp::TempStore;
pub use types::{MediaFile, MediaKind};
