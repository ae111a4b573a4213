/// Telegram implementation of the deletion scheduler's chat actions
pub mod actions;
/// Sending downloaded media files to a chat
pub mod delivery;
/// Command and message handlers
pub mod handlers;
/// Telegram API calls with retry
pub mod resilient;
/// Message texts
pub mod views;
