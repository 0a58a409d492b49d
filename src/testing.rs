//! In-memory test doubles for the store and transport seams.

use crate::emotes::{Emote, EmoteStore};
use crate::error::{Result, TransportError};
use crate::messaging::ReplyTransport;
use crate::{ChannelId, EmoteId, GuildId, MessageHandle, MessageId, UserId};

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Emote store backed by maps, with knobs for latency and failure.
#[derive(Debug, Default)]
pub(crate) struct MemoryEmoteStore {
    emotes: Mutex<HashMap<String, Emote>>,
    delays: Mutex<HashMap<String, Duration>>,
    failing: Mutex<HashSet<String>>,
    lookups: Mutex<Vec<String>>,
    usage: Mutex<Vec<(EmoteId, UserId)>>,
    fail_usage: AtomicBool,
    disabled_users: Mutex<HashSet<UserId>>,
    blacklist: Mutex<HashMap<UserId, String>>,
}

impl MemoryEmoteStore {
    pub(crate) fn add(&self, id: EmoteId, name: &str, animated: bool) {
        let emote = Emote {
            id,
            name: name.to_string(),
            animated,
            author_id: 0,
            description: None,
            created_at: None,
        };
        self.emotes.lock().insert(name.to_lowercase(), emote);
    }

    pub(crate) fn delay(&self, name: &str, delay: Duration) {
        self.delays.lock().insert(name.to_lowercase(), delay);
    }

    pub(crate) fn fail_lookup(&self, name: &str) {
        self.failing.lock().insert(name.to_lowercase());
    }

    pub(crate) fn fail_usage_logging(&self) {
        self.fail_usage.store(true, Ordering::SeqCst);
    }

    pub(crate) fn disable_user(&self, user_id: UserId) {
        self.disabled_users.lock().insert(user_id);
    }

    pub(crate) fn blacklist(&self, user_id: UserId, reason: &str) {
        self.blacklist.lock().insert(user_id, reason.to_string());
    }

    /// Names looked up so far, in call order.
    pub(crate) fn lookups(&self) -> Vec<String> {
        self.lookups.lock().clone()
    }

    pub(crate) fn usage(&self) -> Vec<(EmoteId, UserId)> {
        self.usage.lock().clone()
    }
}

impl EmoteStore for MemoryEmoteStore {
    async fn get_emote(&self, name: &str) -> Result<Option<Emote>> {
        let key = name.to_lowercase();
        self.lookups.lock().push(name.to_string());

        let delay = self.delays.lock().get(&key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().contains(&key) {
            return Err(anyhow::anyhow!("lookup of {name} failed").into());
        }

        Ok(self.emotes.lock().get(&key).cloned())
    }

    async fn log_emote_use(&self, emote_id: EmoteId, user_id: UserId) -> Result<()> {
        if self.fail_usage.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("usage log unavailable").into());
        }
        self.usage.lock().push((emote_id, user_id));
        Ok(())
    }

    async fn auto_response_enabled(&self, _guild_id: Option<GuildId>, user_id: UserId) -> Result<bool> {
        Ok(!self.disabled_users.lock().contains(&user_id))
    }

    async fn blacklist_reason(&self, user_id: UserId) -> Result<Option<String>> {
        Ok(self.blacklist.lock().get(&user_id).cloned())
    }
}

/// Transport that records every call and hands out sequential message ids.
#[derive(Debug)]
pub(crate) struct RecordingTransport {
    next_id: AtomicU64,
    posts: Mutex<Vec<(ChannelId, String)>>,
    edits: Mutex<Vec<(MessageHandle, String)>>,
    deletes: Mutex<Vec<MessageHandle>>,
    fail_posts: AtomicBool,
    fail_edits: AtomicBool,
    failing_deletes: Mutex<HashSet<MessageId>>,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1000),
            posts: Mutex::default(),
            edits: Mutex::default(),
            deletes: Mutex::default(),
            fail_posts: AtomicBool::new(false),
            fail_edits: AtomicBool::new(false),
            failing_deletes: Mutex::default(),
        }
    }
}

impl RecordingTransport {
    pub(crate) fn fail_posts(&self) {
        self.fail_posts.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_edits(&self) {
        self.fail_edits.store(true, Ordering::SeqCst);
    }

    /// Make deleting the reply with this message id fail.
    pub(crate) fn fail_delete_of(&self, message_id: MessageId) {
        self.failing_deletes.lock().insert(message_id);
    }

    pub(crate) fn posts(&self) -> Vec<(ChannelId, String)> {
        self.posts.lock().clone()
    }

    pub(crate) fn edits(&self) -> Vec<(MessageHandle, String)> {
        self.edits.lock().clone()
    }

    /// Every delete attempted, including the ones that failed.
    pub(crate) fn deletes(&self) -> Vec<MessageHandle> {
        self.deletes.lock().clone()
    }
}

impl ReplyTransport for RecordingTransport {
    fn name(&self) -> &str {
        "recording"
    }

    async fn post(&self, channel_id: ChannelId, text: &str) -> Result<MessageHandle> {
        if self.fail_posts.load(Ordering::SeqCst) {
            return Err(TransportError::Post {
                channel_id,
                reason: "injected failure".into(),
            }
            .into());
        }

        let message_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.posts.lock().push((channel_id, text.to_string()));
        Ok(MessageHandle {
            channel_id,
            message_id,
        })
    }

    async fn edit(&self, handle: MessageHandle, text: &str) -> Result<()> {
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(TransportError::Edit {
                message_id: handle.message_id,
                reason: "injected failure".into(),
            }
            .into());
        }

        self.edits.lock().push((handle, text.to_string()));
        Ok(())
    }

    async fn delete(&self, handle: MessageHandle) -> Result<()> {
        self.deletes.lock().push(handle);

        if self.failing_deletes.lock().contains(&handle.message_id) {
            return Err(TransportError::Delete {
                message_id: handle.message_id,
                reason: "injected failure".into(),
            }
            .into());
        }

        Ok(())
    }
}
