//! Resolve emote shorthand in a message against the store.

use crate::EmoteId;
use crate::emotes::lexer::{Token, tokenize};
use crate::emotes::store::EmoteStore;
use crate::emotes::Emote;

use futures::StreamExt as _;
use std::collections::BTreeSet;

/// Upper bound on concurrent store lookups for a single message.
const LOOKUP_CONCURRENCY: usize = 8;

/// Which parts of the message survive extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionPolicy {
    /// Keep only the emotes (and line breaks, so multi-line messages keep
    /// their shape). Used for auto-responses.
    EmotesOnly,
    /// Keep all text, with emotes substituted inline. Used for quoting.
    Quote,
}

/// The result of running a message through the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Rendered text. Equal to the input when no emote resolved.
    pub text: String,
    /// Distinct emotes that resolved.
    pub used: BTreeSet<EmoteId>,
}

impl Extraction {
    pub fn has_emotes(&self) -> bool {
        !self.used.is_empty()
    }
}

/// Resolve every shorthand token in `content`.
///
/// Lookups run concurrently but the output is assembled in token order once
/// they have all settled. Unknown names, and names whose lookup failed, are
/// written back as the shorthand the user typed.
pub async fn extract<S: EmoteStore>(
    store: &S,
    content: &str,
    policy: ExtractionPolicy,
) -> Extraction {
    let tokens = tokenize(content);

    // Futures are built up front so the stream holds no closure over borrowed
    // tokens; `buffered` still yields results in token order.
    let lookups: Vec<_> = tokens
        .iter()
        .map(|token| match token {
            Token::Emote { name, .. } => Some(*name),
            Token::Text(_) => None,
        })
        .map(|name| lookup(store, name))
        .collect();
    let resolved: Vec<Option<Emote>> = futures::stream::iter(lookups)
        .buffered(LOOKUP_CONCURRENCY)
        .collect()
        .await;

    let mut out = String::with_capacity(content.len());
    let mut used = BTreeSet::new();

    for (token, emote) in tokens.iter().zip(resolved) {
        match (token, emote) {
            (Token::Emote { .. }, Some(emote)) => {
                out.push_str(&emote.to_string());
                used.insert(emote.id);
            }
            (Token::Emote { text, .. }, None) => out.push_str(text),
            (Token::Text(text), _) => match policy {
                ExtractionPolicy::Quote => out.push_str(text),
                ExtractionPolicy::EmotesOnly if token.is_newline() => out.push('\n'),
                ExtractionPolicy::EmotesOnly => {}
            },
        }
    }

    let text = if used.is_empty() {
        content.to_string()
    } else {
        out
    };

    Extraction { text, used }
}

async fn lookup<S: EmoteStore>(store: &S, name: Option<&str>) -> Option<Emote> {
    let name = name?;
    match store.get_emote(name).await {
        Ok(emote) => emote,
        Err(error) => {
            tracing::warn!(%error, name, "emote lookup failed, leaving shorthand as text");
            None
        }
    }
}
