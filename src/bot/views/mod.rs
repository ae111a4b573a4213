//! User-facing texts of the bot

/// Texts for link processing, commands and deletion warnings
pub mod media;

pub use media::{DefaultMediaView, MediaView};
