//! Splits message text into literal text and emote shorthand tokens.
//!
//! Shorthand is `:name:` or `;name;` where `name` is 1–32 ASCII letters,
//! digits or underscores. A few spans are never shorthand even though they
//! contain something that looks like it, and are kept whole as text:
//!
//! - already-rendered emotes, `<:name:421349768125513728>`
//! - escaped shorthand, `\:name:`
//! - inline code and fenced code blocks
//!
//! Every `\n` is its own text token. Concatenating the text of all tokens
//! gives back the input exactly.

use regex::Regex;
use std::sync::LazyLock;

static TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"```[\s\S]*?```|`[^`\n]+`",
        r"|<a?:[A-Za-z0-9_]{1,32}:\d{15,22}>",
        r"|\\:[A-Za-z0-9_]{1,32}:|\\;[A-Za-z0-9_]{1,32};",
        r"|\n",
        r"|:(?P<colon>[A-Za-z0-9_]{1,32}):",
        r"|;(?P<semicolon>[A-Za-z0-9_]{1,32});",
    ))
    .expect("hardcoded emote token regex")
});

static RENDERED_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<(?P<animated>a?):(?P<name>[A-Za-z0-9_]{1,32}):(?P<id>\d{15,22})>$")
        .expect("hardcoded rendered emote regex")
});

/// A custom emote as the platform renders it in message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderedEmote<'a> {
    pub name: &'a str,
    pub id: u64,
    pub animated: bool,
}

/// Parse text that is exactly one rendered emote, `<:name:id>` or
/// `<a:name:id>`.
pub fn parse_rendered(text: &str) -> Option<RenderedEmote<'_>> {
    let captures = RENDERED_REGEX.captures(text.trim())?;
    Some(RenderedEmote {
        name: captures.name("name")?.as_str(),
        id: captures.name("id")?.as_str().parse().ok()?,
        animated: !captures.name("animated")?.as_str().is_empty(),
    })
}

/// A classified slice of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Text(&'a str),
    Emote {
        /// The shorthand as written, delimiters included.
        text: &'a str,
        /// The name with delimiters stripped.
        name: &'a str,
    },
}

impl<'a> Token<'a> {
    /// The exact input slice this token covers.
    pub fn text(&self) -> &'a str {
        match self {
            Token::Text(text) => text,
            Token::Emote { text, .. } => text,
        }
    }

    pub fn is_emote(&self) -> bool {
        matches!(self, Token::Emote { .. })
    }

    pub fn is_newline(&self) -> bool {
        matches!(self, Token::Text("\n"))
    }
}

/// Tokenize `input`.
///
/// Pure and allocation-light: tokens borrow from `input`, and nothing is
/// shared between calls except the compiled pattern.
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut last_end = 0;

    for captures in TOKEN_REGEX.captures_iter(input) {
        let Some(whole) = captures.get(0) else {
            continue;
        };

        if whole.start() > last_end {
            tokens.push(Token::Text(&input[last_end..whole.start()]));
        }

        let name = captures
            .name("colon")
            .or_else(|| captures.name("semicolon"));
        tokens.push(match name {
            Some(name) => Token::Emote {
                text: whole.as_str(),
                name: name.as_str(),
            },
            None => Token::Text(whole.as_str()),
        });

        last_end = whole.end();
    }

    if last_end < input.len() {
        tokens.push(Token::Text(&input[last_end..]));
    }

    tokens
}
