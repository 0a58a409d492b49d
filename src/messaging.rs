//! Outbound transport for replies, and the Discord adapter.

pub(crate) mod commands;
pub mod discord;
pub mod traits;

pub use discord::{DiscordHandler, DiscordTransport};
pub use traits::ReplyTransport;
