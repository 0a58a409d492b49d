//! Discord adapter: a serenity HTTP transport for replies and a gateway event
//! handler that feeds message events to the reply synchronizer.

use crate::emotes::{ExtractionPolicy, SqliteEmoteStore, compose_quote, extract};
use crate::error::{Result, TransportError};
use crate::messaging::commands::{Command, Invoker, answer, command_allowed, parse_command};
use crate::messaging::traits::ReplyTransport;
use crate::replies::SyncEvent;
use crate::{MessageEdit, MessageHandle, SourceMessage, UserId};

use serenity::all::{
    ChannelId, Context, CreateAllowedMentions, CreateMessage, EditMessage, EventHandler,
    GatewayIntents, GuildId, Http, Message, MessageId, MessageUpdateEvent, Ready,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Discord rejects message content longer than this.
const MAX_DISCORD_LEN: usize = 2000;

/// Gateway intents the bot needs to see and follow messages.
pub fn intents() -> GatewayIntents {
    GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
}

/// Truncate a string to Discord's 2000-byte content limit on a char boundary.
fn truncate(s: &str) -> &str {
    if s.len() <= MAX_DISCORD_LEN {
        return s;
    }
    let mut end = MAX_DISCORD_LEN;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Reply transport over serenity's HTTP client.
///
/// Replies never ping anyone: allowed mentions are always empty.
#[derive(Clone)]
pub struct DiscordTransport {
    http: Arc<Http>,
    timeout: Duration,
}

impl DiscordTransport {
    pub fn new(http: Arc<Http>, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    async fn timed<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                operation,
                seconds: self.timeout.as_secs(),
            }
            .into()),
        }
    }
}

impl ReplyTransport for DiscordTransport {
    fn name(&self) -> &str {
        "discord"
    }

    async fn post(&self, channel_id: crate::ChannelId, text: &str) -> Result<MessageHandle> {
        let builder = CreateMessage::new()
            .content(truncate(text))
            .allowed_mentions(CreateAllowedMentions::new());

        self.timed("post", async {
            let message = ChannelId::new(channel_id)
                .send_message(&*self.http, builder)
                .await
                .map_err(|error| TransportError::Post {
                    channel_id,
                    reason: error.to_string(),
                })?;

            Ok(MessageHandle {
                channel_id,
                message_id: message.id.get(),
            })
        })
        .await
    }

    async fn edit(&self, handle: MessageHandle, text: &str) -> Result<()> {
        let builder = EditMessage::new()
            .content(truncate(text))
            .allowed_mentions(CreateAllowedMentions::new());

        self.timed("edit", async {
            ChannelId::new(handle.channel_id)
                .edit_message(&*self.http, MessageId::new(handle.message_id), builder)
                .await
                .map_err(|error| TransportError::Edit {
                    message_id: handle.message_id,
                    reason: error.to_string(),
                })?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, handle: MessageHandle) -> Result<()> {
        self.timed("delete", async {
            ChannelId::new(handle.channel_id)
                .delete_message(&*self.http, MessageId::new(handle.message_id))
                .await
                .map_err(|error| TransportError::Delete {
                    message_id: handle.message_id,
                    reason: error.to_string(),
                })?;
            Ok(())
        })
        .await
    }
}

/// Gateway event handler.
///
/// Commands are answered here. Every other message event is forwarded to the
/// single reply synchronizer task over `events`.
pub struct DiscordHandler {
    store: Arc<SqliteEmoteStore>,
    transport: Arc<DiscordTransport>,
    events: mpsc::Sender<SyncEvent>,
    command_prefix: String,
    owner_ids: Vec<UserId>,
}

impl DiscordHandler {
    pub fn new(
        store: Arc<SqliteEmoteStore>,
        transport: Arc<DiscordTransport>,
        events: mpsc::Sender<SyncEvent>,
        command_prefix: impl Into<String>,
        owner_ids: Vec<UserId>,
    ) -> Self {
        Self {
            store,
            transport,
            events,
            command_prefix: command_prefix.into(),
            owner_ids,
        }
    }

    async fn forward(&self, event: SyncEvent) {
        if let Err(error) = self.events.send(event).await {
            tracing::warn!(%error, "reply synchronizer is gone, dropping message event");
        }
    }

    async fn handle_command(&self, ctx: &Context, message: &Message, command: Command<'_>) {
        let user_id = message.author.id.get();
        let is_guild_owner = message
            .guild_id
            .and_then(|guild_id| {
                ctx.cache
                    .guild(guild_id)
                    .map(|guild| guild.owner_id == message.author.id)
            })
            .unwrap_or(false);
        let invoker = Invoker {
            user_id,
            guild_id: message.guild_id.map(GuildId::get),
            is_owner: self.owner_ids.contains(&user_id),
            is_guild_owner,
        };

        if !command_allowed(self.store.as_ref(), &invoker).await {
            tracing::debug!(user_id, "ignoring command from blacklisted user");
            return;
        }

        if let Command::Quote(text) = command {
            self.handle_quote(ctx, message, text).await;
            return;
        }

        let Some(reply) = answer(&self.store, &invoker, command).await else {
            return;
        };
        if let Err(error) = self.transport.post(message.channel_id.get(), &reply).await {
            tracing::warn!(%error, user_id, "failed to send command reply");
        }
    }

    async fn handle_quote(&self, ctx: &Context, message: &Message, text: &str) {
        if text.trim().is_empty() {
            return;
        }

        let extraction = extract(self.store.as_ref(), text, ExtractionPolicy::Quote).await;

        // Attribute the quote only when the invocation could be removed.
        let attribution = match message.delete(ctx).await {
            Ok(()) => Some(message.author.id.get()),
            Err(error) => {
                tracing::debug!(%error, message_id = message.id.get(), "cannot delete quote invocation");
                None
            }
        };

        let body = compose_quote(&extraction, attribution);
        if let Err(error) = self.transport.post(message.channel_id.get(), &body).await {
            tracing::warn!(%error, channel_id = message.channel_id.get(), "failed to send quote");
        }
    }
}

#[async_trait::async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        tracing::info!(
            user = %ready.user.name,
            guilds = ready.guilds.len(),
            "connected to Discord"
        );
    }

    async fn message(&self, ctx: Context, message: Message) {
        let author_is_bot = message.author.bot || message.webhook_id.is_some();

        if let Some(command) = parse_command(&self.command_prefix, &message.content) {
            if !author_is_bot {
                self.handle_command(&ctx, &message, command).await;
            }
            return;
        }

        self.forward(SyncEvent::Created(SourceMessage {
            id: message.id.get(),
            channel_id: message.channel_id.get(),
            author_id: message.author.id.get(),
            guild_id: message.guild_id.map(GuildId::get),
            content: message.content,
            author_is_bot,
        }))
        .await;
    }

    async fn message_update(
        &self,
        _ctx: Context,
        _old: Option<Message>,
        _new: Option<Message>,
        event: MessageUpdateEvent,
    ) {
        self.forward(SyncEvent::Edited(MessageEdit {
            id: event.id.get(),
            channel_id: event.channel_id.get(),
            content: event.content,
        }))
        .await;
    }

    async fn message_delete(
        &self,
        _ctx: Context,
        _channel_id: ChannelId,
        deleted_message_id: MessageId,
        _guild_id: Option<GuildId>,
    ) {
        self.forward(SyncEvent::Deleted(deleted_message_id.get()))
            .await;
    }

    async fn message_delete_bulk(
        &self,
        _ctx: Context,
        _channel_id: ChannelId,
        deleted_message_ids: Vec<MessageId>,
        _guild_id: Option<GuildId>,
    ) {
        let ids = deleted_message_ids.into_iter().map(MessageId::get).collect();
        self.forward(SyncEvent::BulkDeleted(ids)).await;
    }
}
