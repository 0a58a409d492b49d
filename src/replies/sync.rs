//! Reply synchronizer: posts auto-responses and keeps them consistent with
//! the messages that triggered them.
//!
//! Per source message the state is either untracked or tracked (a live cache
//! entry). A new message with resolvable emotes becomes tracked once its reply
//! is posted. Edits re-render the reply in place, or delete it when no emote
//! is left. Deleting the source deletes the reply. Every transport failure is
//! logged and contained; nothing here returns an error to the event loop.

use crate::emotes::{EmoteStore, ExtractionPolicy, compose_reply, extract};
use crate::messaging::ReplyTransport;
use crate::replies::cache::{ReplyCache, TrackedReply};
use crate::{MessageEdit, MessageHandle, MessageId, SourceMessage};

use std::sync::Arc;
use tokio::sync::mpsc;

/// A message event the synchronizer reacts to.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    Created(SourceMessage),
    Edited(MessageEdit),
    Deleted(MessageId),
    BulkDeleted(Vec<MessageId>),
}

/// What handling one event amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing to do: gated author, untracked message, or an edit without text.
    Ignored,
    /// The message had no resolvable emotes.
    NoEmotes,
    Posted(MessageHandle),
    /// The re-rendered reply matched what is already shown.
    Unchanged,
    Edited(MessageHandle),
    Deleted(MessageHandle),
    /// The platform call failed; already logged.
    TransportFailed,
}

/// Owns the reply cache and is its only writer.
pub struct ReplySync<S, T> {
    store: Arc<S>,
    transport: Arc<T>,
    cache: ReplyCache,
}

impl<S: EmoteStore, T: ReplyTransport> ReplySync<S, T> {
    pub fn new(store: Arc<S>, transport: Arc<T>, cache: ReplyCache) -> Self {
        Self {
            store,
            transport,
            cache,
        }
    }

    pub fn cache(&self) -> &ReplyCache {
        &self.cache
    }

    /// Consume events until every sender is dropped.
    pub async fn run(self, mut events: mpsc::Receiver<SyncEvent>) {
        tracing::info!(
            transport = self.transport.name(),
            capacity = self.cache.capacity(),
            "reply synchronizer started"
        );

        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }

        tracing::info!(
            tracked = self.cache.entry_count(),
            evicted = self.cache.evicted_count(),
            "reply synchronizer stopped"
        );
    }

    pub async fn handle(&self, event: SyncEvent) -> Vec<SyncOutcome> {
        match event {
            SyncEvent::Created(message) => vec![self.on_message(&message).await],
            SyncEvent::Edited(edit) => vec![self.on_message_edit(&edit).await],
            SyncEvent::Deleted(source_id) => vec![self.on_message_delete(source_id).await],
            SyncEvent::BulkDeleted(source_ids) => self.on_bulk_delete(&source_ids).await,
        }
    }

    /// Respond to a newly observed message.
    pub async fn on_message(&self, message: &SourceMessage) -> SyncOutcome {
        if !self.should_respond(message).await {
            return SyncOutcome::Ignored;
        }

        let extraction =
            extract(self.store.as_ref(), &message.content, ExtractionPolicy::EmotesOnly).await;
        let Some(reply) = compose_reply(&extraction) else {
            return SyncOutcome::NoEmotes;
        };

        for &emote_id in &extraction.used {
            if let Err(error) = self.store.log_emote_use(emote_id, message.author_id).await {
                tracing::warn!(%error, emote_id, user_id = message.author_id, "failed to log emote use");
            }
        }

        match self.transport.post(message.channel_id, &reply).await {
            Ok(handle) => {
                self.cache
                    .insert(
                        message.id,
                        TrackedReply {
                            handle,
                            content: reply,
                        },
                    )
                    .await;
                tracing::debug!(source_id = message.id, reply = %handle, "posted emote reply");
                SyncOutcome::Posted(handle)
            }
            Err(error) => {
                tracing::warn!(%error, source_id = message.id, "failed to post emote reply");
                SyncOutcome::TransportFailed
            }
        }
    }

    /// Follow an edit of a source message.
    pub async fn on_message_edit(&self, edit: &MessageEdit) -> SyncOutcome {
        let Some(content) = edit.content.as_deref() else {
            return SyncOutcome::Ignored;
        };
        let Some(tracked) = self.cache.get(edit.id).await else {
            return SyncOutcome::Ignored;
        };

        let extraction = extract(self.store.as_ref(), content, ExtractionPolicy::EmotesOnly).await;
        let Some(reply) = compose_reply(&extraction) else {
            return self.delete_reply(edit.id).await;
        };

        if reply == tracked.content {
            return SyncOutcome::Unchanged;
        }

        match self.transport.edit(tracked.handle, &reply).await {
            Ok(()) => {
                self.cache
                    .insert(
                        edit.id,
                        TrackedReply {
                            handle: tracked.handle,
                            content: reply,
                        },
                    )
                    .await;
                SyncOutcome::Edited(tracked.handle)
            }
            Err(error) => {
                tracing::warn!(%error, source_id = edit.id, reply = %tracked.handle, "failed to edit emote reply");
                SyncOutcome::TransportFailed
            }
        }
    }

    /// Follow a deletion of a source message.
    pub async fn on_message_delete(&self, source_id: MessageId) -> SyncOutcome {
        self.delete_reply(source_id).await
    }

    /// Follow a bulk deletion, one message at a time. A failure for one id
    /// does not stop the rest.
    pub async fn on_bulk_delete(&self, source_ids: &[MessageId]) -> Vec<SyncOutcome> {
        let mut outcomes = Vec::with_capacity(source_ids.len());
        for &source_id in source_ids {
            outcomes.push(self.delete_reply(source_id).await);
        }
        outcomes
    }

    async fn should_respond(&self, message: &SourceMessage) -> bool {
        if message.author_is_bot {
            return false;
        }

        match self.store.blacklist_reason(message.author_id).await {
            Ok(Some(reason)) => {
                tracing::debug!(user_id = message.author_id, %reason, "skipping blacklisted user");
                return false;
            }
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(%error, user_id = message.author_id, "failed to check blacklist");
                return false;
            }
        }

        match self
            .store
            .auto_response_enabled(message.guild_id, message.author_id)
            .await
        {
            Ok(enabled) => enabled,
            Err(error) => {
                tracing::warn!(%error, user_id = message.author_id, "failed to read auto-response state");
                false
            }
        }
    }

    /// Stop tracking first so a failed delete cannot leave a stale entry.
    async fn delete_reply(&self, source_id: MessageId) -> SyncOutcome {
        let Some(tracked) = self.cache.remove(source_id).await else {
            return SyncOutcome::Ignored;
        };

        match self.transport.delete(tracked.handle).await {
            Ok(()) => {
                tracing::debug!(source_id, reply = %tracked.handle, "deleted emote reply");
                SyncOutcome::Deleted(tracked.handle)
            }
            Err(error) => {
                tracing::warn!(%error, source_id, reply = %tracked.handle, "failed to delete emote reply");
                SyncOutcome::TransportFailed
            }
        }
    }
}
