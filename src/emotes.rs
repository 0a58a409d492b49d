//! Emote shorthand: lexing, resolution against the store, and reply text.

pub mod compose;
pub mod extract;
pub mod lexer;
pub mod store;

pub use compose::{clean_content, compose_quote, compose_reply, fix_first_line};
pub use extract::{Extraction, ExtractionPolicy, extract};
pub use lexer::{RenderedEmote, Token, parse_rendered, tokenize};
pub use store::{EmoteStore, NewEmote, SqliteEmoteStore};

use crate::{EmoteId, UserId};

use serde::{Deserialize, Serialize};

/// A custom emote the bot can render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emote {
    pub id: EmoteId,
    pub name: String,
    pub animated: bool,
    pub author_id: UserId,
    pub description: Option<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Emote {
    /// The emote's name in shorthand form, escaped so it does not render.
    pub fn escaped_name(&self) -> String {
        format!(r"\:{}:", self.name)
    }
}

/// Renders the platform markup, e.g. `<:blobcat:421>` or `<a:partyparrot:422>`.
impl std::fmt::Display for Emote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let animated = if self.animated { "a" } else { "" };
        write!(f, "<{}:{}:{}>", animated, self.name, self.id)
    }
}
