//! Prefix commands: parsing and the replies that do not need the platform.

use crate::emotes::{EmoteStore, NewEmote, SqliteEmoteStore, parse_rendered};
use crate::{GuildId, UserId};

/// A message addressed to the bot rather than to the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command<'a> {
    /// Everything after the command name, whitespace included.
    Quote(&'a str),
    Toggle,
    ToggleGuild,
    Blacklist(&'a str),
    Add(&'a str),
    Info(&'a str),
}

/// The command `content` invokes, if any. Unknown command names are not
/// commands: those messages are ordinary chat and still get auto-responses.
pub(crate) fn parse_command<'a>(prefix: &str, content: &'a str) -> Option<Command<'a>> {
    let rest = content.strip_prefix(prefix)?;
    let name_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let (name, raw_args) = rest.split_at(name_end);
    let args = raw_args.trim();

    Some(match name.to_ascii_lowercase().as_str() {
        "quote" => Command::Quote(raw_args),
        "toggle" => Command::Toggle,
        "toggleserver" => Command::ToggleGuild,
        "blacklist" => Command::Blacklist(args),
        "add" | "create" => Command::Add(args),
        "info" => Command::Info(args),
        _ => return None,
    })
}

/// Who ran a command, and with what standing.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Invoker {
    pub user_id: UserId,
    pub guild_id: Option<GuildId>,
    /// Listed in `owner_ids`.
    pub is_owner: bool,
    /// Owns the guild the command was run in.
    pub is_guild_owner: bool,
}

/// Blacklisted users may not run commands. Owners are never locked out.
pub(crate) async fn command_allowed<S: EmoteStore>(store: &S, invoker: &Invoker) -> bool {
    if invoker.is_owner {
        return true;
    }

    match store.blacklist_reason(invoker.user_id).await {
        Ok(reason) => reason.is_none(),
        Err(error) => {
            tracing::warn!(%error, user_id = invoker.user_id, "failed to check blacklist");
            false
        }
    }
}

/// Run a command that only touches the store and return the reply text.
///
/// `Quote` needs the platform (it deletes the invocation) and is handled by
/// the adapter, so it produces no reply here.
pub(crate) async fn answer(
    store: &SqliteEmoteStore,
    invoker: &Invoker,
    command: Command<'_>,
) -> Option<String> {
    match command {
        Command::Quote(_) => None,
        Command::Toggle => Some(toggle_user(store, invoker).await),
        Command::ToggleGuild => Some(toggle_guild(store, invoker).await),
        Command::Blacklist(args) => Some(blacklist(store, invoker, args).await),
        Command::Add(args) => Some(add(store, invoker, args).await),
        Command::Info(args) => Some(info(store, args).await),
    }
}

const STORE_FAILURE: &str = "Something went wrong saving that, try again later.";
const OWNER_ONLY: &str = "Only the bot owner can do that.";

async fn toggle_user(store: &SqliteEmoteStore, invoker: &Invoker) -> String {
    match store.toggle_user_state(invoker.user_id, invoker.guild_id).await {
        Ok(true) => "Opted in to the emote auto response.".into(),
        Ok(false) => "Opted out of the emote auto response.".into(),
        Err(error) => {
            tracing::warn!(%error, user_id = invoker.user_id, "failed to toggle auto-response");
            STORE_FAILURE.into()
        }
    }
}

async fn toggle_guild(store: &SqliteEmoteStore, invoker: &Invoker) -> String {
    let Some(guild_id) = invoker.guild_id else {
        return "This command only works in a server.".into();
    };
    if !invoker.is_owner && !invoker.is_guild_owner {
        return "Only the server owner can change this.".into();
    }

    match store.toggle_guild_state(guild_id).await {
        Ok(true) => "Emote auto response is now opt-out for this server.".into(),
        Ok(false) => "Emote auto response is now opt-in for this server.".into(),
        Err(error) => {
            tracing::warn!(%error, guild_id, "failed to toggle guild auto-response");
            STORE_FAILURE.into()
        }
    }
}

/// `<user> [reason]`. No reason lifts the blacklist.
async fn blacklist(store: &SqliteEmoteStore, invoker: &Invoker, args: &str) -> String {
    if !invoker.is_owner {
        return OWNER_ONLY.into();
    }

    let (target, reason) = match args.split_once(char::is_whitespace) {
        Some((target, reason)) => (target, Some(reason.trim()).filter(|r| !r.is_empty())),
        None => (args, None),
    };
    let Some(user_id) = parse_user(target) else {
        return "Usage: blacklist <user> [reason]".into();
    };

    match store.set_user_blacklist(user_id, reason).await {
        Ok(()) => match reason {
            Some(reason) => format!("User blacklisted with reason `{reason}`."),
            None => "User un-blacklisted.".into(),
        },
        Err(error) => {
            tracing::warn!(%error, user_id, "failed to update blacklist");
            STORE_FAILURE.into()
        }
    }
}

/// Register an emote the owner can already use, given as its rendered form.
async fn add(store: &SqliteEmoteStore, invoker: &Invoker, args: &str) -> String {
    if !invoker.is_owner {
        return OWNER_ONLY.into();
    }
    let Some(rendered) = parse_rendered(args) else {
        return "Usage: add <emote>, using an emote you already have".into();
    };

    let input = NewEmote {
        id: rendered.id,
        name: rendered.name.to_string(),
        animated: rendered.animated,
        author_id: invoker.user_id,
        description: None,
    };
    match store.create_emote(input).await {
        Ok(emote) => format!("Emote {} successfully created: {emote}", emote.escaped_name()),
        Err(error) => {
            tracing::warn!(%error, name = rendered.name, "failed to register emote");
            format!(r"Could not create \:{}:, it may already exist.", rendered.name)
        }
    }
}

async fn info(store: &SqliteEmoteStore, args: &str) -> String {
    let name = args.trim_matches(|c| c == ':' || c == ';');
    if name.is_empty() {
        return "Usage: info <emote name>".into();
    }

    let emote = match store.get_emote(name).await {
        Ok(Some(emote)) => emote,
        Ok(None) => return format!("Emote `{name}` not found."),
        Err(error) => {
            tracing::warn!(%error, name, "failed to look up emote");
            return STORE_FAILURE.into();
        }
    };

    match store.emote_usage(emote.id).await {
        Ok(count) => format!(
            "{emote} {} by <@{}>, used {count} times.",
            emote.escaped_name(),
            emote.author_id
        ),
        Err(error) => {
            tracing::warn!(%error, emote_id = emote.id, "failed to count emote usage");
            STORE_FAILURE.into()
        }
    }
}

/// Accept a raw id or a mention, `<@id>` / `<@!id>`.
fn parse_user(text: &str) -> Option<UserId> {
    let id = text
        .strip_prefix("<@")
        .and_then(|rest| rest.strip_suffix('>'))
        .map(|rest| rest.trim_start_matches('!'))
        .unwrap_or(text);
    id.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use crate::emotes::{ExtractionPolicy, extract};

    const OWNER: UserId = 1;
    const GUILD: GuildId = 500;

    async fn setup_store() -> SqliteEmoteStore {
        SqliteEmoteStore::new(memory_pool().await)
    }

    fn member(user_id: UserId) -> Invoker {
        Invoker {
            user_id,
            guild_id: Some(GUILD),
            is_owner: user_id == OWNER,
            is_guild_owner: false,
        }
    }

    #[test]
    fn commands_need_the_prefix() {
        assert_eq!(parse_command("ec/", "quote :x:"), None);
        assert_eq!(parse_command("ec/", "hello :x:"), None);
    }

    #[test]
    fn parses_each_known_command() {
        assert_eq!(parse_command("ec/", "ec/QUOTE"), Some(Command::Quote("")));
        assert_eq!(parse_command("ec/", "ec/toggle"), Some(Command::Toggle));
        assert_eq!(parse_command("ec/", "ec/toggleserver"), Some(Command::ToggleGuild));
        assert_eq!(
            parse_command("ec/", "ec/blacklist <@9>  spam "),
            Some(Command::Blacklist("<@9>  spam"))
        );
        assert_eq!(parse_command("ec/", "ec/create <:x:1>"), Some(Command::Add("<:x:1>")));
        assert_eq!(parse_command("ec/", "ec/info :x:"), Some(Command::Info(":x:")));
    }

    #[test]
    fn unknown_command_names_are_plain_messages() {
        assert_eq!(parse_command("ec/", "ec/foo :x:"), None);
        assert_eq!(parse_command("ec/", "ec/"), None);
    }

    #[test]
    fn quote_keeps_the_raw_rest_of_the_message() {
        assert_eq!(
            parse_command("ec/", "ec/quote  hi :x: there "),
            Some(Command::Quote("  hi :x: there "))
        );
        assert_eq!(
            parse_command("ec/", "ec/quote\n:x:\n:y:"),
            Some(Command::Quote("\n:x:\n:y:"))
        );
    }

    #[test]
    fn users_parse_from_ids_and_mentions() {
        assert_eq!(parse_user("42"), Some(42));
        assert_eq!(parse_user("<@42>"), Some(42));
        assert_eq!(parse_user("<@!42>"), Some(42));
        assert_eq!(parse_user("someone"), None);
    }

    #[tokio::test]
    async fn owner_registers_an_emote_that_then_resolves() {
        let store = setup_store().await;

        let reply = answer(
            &store,
            &member(OWNER),
            Command::Add("<a:party:421349768125513729>"),
        )
        .await
        .expect("add always replies");
        assert!(reply.contains(r"\:party:"), "{reply}");

        let extraction = extract(&store, "yay :party:", ExtractionPolicy::EmotesOnly).await;
        assert_eq!(extraction.text, "<a:party:421349768125513729>");
    }

    #[tokio::test]
    async fn only_owners_register_or_blacklist() {
        let store = setup_store().await;
        let user = member(2);

        for command in [Command::Add("<:x:421349768125513728>"), Command::Blacklist("3 spam")] {
            assert_eq!(answer(&store, &user, command).await.as_deref(), Some(OWNER_ONLY));
        }
        assert!(store.get_emote("x").await.expect("lookup").is_none());
        assert!(store.blacklist_reason(3).await.expect("reason").is_none());
    }

    #[tokio::test]
    async fn blacklist_blocks_commands_until_lifted() {
        let store = setup_store().await;

        let reply = answer(&store, &member(OWNER), Command::Blacklist("<@2> spam"))
            .await
            .expect("blacklist always replies");
        assert_eq!(reply, "User blacklisted with reason `spam`.");
        assert!(!command_allowed(&store, &member(2)).await);
        assert!(command_allowed(&store, &member(OWNER)).await);

        let reply = answer(&store, &member(OWNER), Command::Blacklist("2"))
            .await
            .expect("blacklist always replies");
        assert_eq!(reply, "User un-blacklisted.");
        assert!(command_allowed(&store, &member(2)).await);
    }

    #[tokio::test]
    async fn guild_toggle_needs_guild_owner_or_bot_owner() {
        let store = setup_store().await;

        let reply = answer(&store, &member(2), Command::ToggleGuild).await;
        assert_eq!(reply.as_deref(), Some("Only the server owner can change this."));
        assert!(store.auto_response_enabled(Some(GUILD), 2).await.expect("state"));

        let guild_owner = Invoker {
            is_guild_owner: true,
            ..member(2)
        };
        let reply = answer(&store, &guild_owner, Command::ToggleGuild).await;
        assert_eq!(
            reply.as_deref(),
            Some("Emote auto response is now opt-in for this server.")
        );
        assert!(!store.auto_response_enabled(Some(GUILD), 3).await.expect("state"));

        let direct = Invoker {
            guild_id: None,
            ..member(OWNER)
        };
        let reply = answer(&store, &direct, Command::ToggleGuild).await;
        assert_eq!(reply.as_deref(), Some("This command only works in a server."));
    }

    #[tokio::test]
    async fn toggle_flips_the_callers_state() {
        let store = setup_store().await;

        let reply = answer(&store, &member(2), Command::Toggle).await;
        assert_eq!(reply.as_deref(), Some("Opted out of the emote auto response."));
        let reply = answer(&store, &member(2), Command::Toggle).await;
        assert_eq!(reply.as_deref(), Some("Opted in to the emote auto response."));
    }

    #[tokio::test]
    async fn info_reports_usage() {
        let store = setup_store().await;
        answer(&store, &member(OWNER), Command::Add("<:blobcat:421349768125513728>")).await;
        store
            .log_emote_use(421_349_768_125_513_728, 2)
            .await
            .expect("use should log");

        let reply = answer(&store, &member(2), Command::Info(":BlobCat:"))
            .await
            .expect("info always replies");
        assert_eq!(
            reply,
            r"<:blobcat:421349768125513728> \:blobcat: by <@1>, used 1 times."
        );

        let reply = answer(&store, &member(2), Command::Info("nope")).await;
        assert_eq!(reply.as_deref(), Some("Emote `nope` not found."));
    }

    #[tokio::test]
    async fn quote_has_no_store_reply() {
        let store = setup_store().await;
        assert_eq!(answer(&store, &member(2), Command::Quote(" :x:")).await, None);
    }
}
