//! Telegram bot that pulls images and videos out of web links and removes
//! them from the chat again after a retention window.

/// Telegram front-end: handlers, delivery and message texts
pub mod bot;
/// Configuration and defaults
pub mod config;
/// Media extraction strategies
pub mod extract;
/// Link detection in chat messages
pub mod links;
/// Log subscriber with token redaction
pub mod logging;
/// Media types, detection, size policy and temp storage
pub mod media;
/// Bot startup and dispatching
pub mod runner;
/// Timed deletion of delivered media
pub mod scheduler;
/// Shared helpers
pub mod utils;

#[cfg(test)]
mod test_server;
