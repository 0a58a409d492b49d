//! Connoisseur: an emote auto-responder that keeps its replies in sync with
//! the messages that triggered them.

pub mod config;
pub mod db;
pub mod emotes;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod replies;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};

use serde::{Deserialize, Serialize};

/// Platform message identifier.
pub type MessageId = u64;

/// Platform channel identifier.
pub type ChannelId = u64;

/// Platform user identifier.
pub type UserId = u64;

/// Platform guild (server) identifier.
pub type GuildId = u64;

/// Emote identifier, as assigned by the platform when the emote was uploaded.
pub type EmoteId = u64;

/// A newly observed message that may trigger an auto-response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub author_id: UserId,
    /// None for direct messages.
    pub guild_id: Option<GuildId>,
    pub content: String,
    /// Bots and webhooks never get an auto-response.
    pub author_is_bot: bool,
}

/// An edit to a previously observed message.
///
/// Gateways send partial payloads; `content` is None when the edit did not
/// touch the text (embeds resolving, pins, attachments).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEdit {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub content: Option<String>,
}

/// Everything needed to edit or delete a message that was sent earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageHandle {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

impl std::fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.channel_id, self.message_id)
    }
}
