//! Turns an extraction into the text the bot actually sends.

use crate::UserId;
use crate::emotes::extract::Extraction;

use std::borrow::Cow;

/// The auto-response for an extraction, or `None` when nothing resolved.
pub fn compose_reply(extraction: &Extraction) -> Option<String> {
    if !extraction.has_emotes() {
        return None;
    }

    Some(clean_content(fix_first_line(&extraction.text)).into_owned())
}

/// The body of a quote, optionally attributed to the user who asked for it.
///
/// Unlike [`compose_reply`] this always produces text. The quoted text keeps
/// its leading whitespace, so the separator after `said:` is whatever
/// followed the command name.
pub fn compose_quote(extraction: &Extraction, attribution: Option<UserId>) -> String {
    let body = clean_content(&extraction.text);
    match attribution {
        Some(user_id) => format!("<@{user_id}> said:{body}"),
        None => body.into_owned(),
    }
}

/// Drop whitespace-only lines from the start of `text`.
///
/// Emote-only extraction keeps line breaks, so a message whose first line had
/// no emotes would otherwise start with an empty line.
pub fn fix_first_line(text: &str) -> &str {
    let mut rest = text;
    while let Some((line, tail)) = rest.split_once('\n') {
        if !line.trim().is_empty() {
            break;
        }
        rest = tail;
    }
    rest
}

/// Neutralise mass mentions so relayed text cannot ping a whole server.
pub fn clean_content(text: &str) -> Cow<'_, str> {
    if !text.contains("@everyone") && !text.contains("@here") {
        return Cow::Borrowed(text);
    }

    Cow::Owned(
        text.replace("@everyone", "@\u{200b}everyone")
            .replace("@here", "@\u{200b}here"),
    )
}
