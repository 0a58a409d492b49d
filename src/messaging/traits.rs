//! The outbound side of a chat platform, as the reply synchronizer sees it.

use crate::error::Result;
use crate::{ChannelId, MessageHandle};

use std::future::Future;

/// Post, edit and delete bot messages.
///
/// Failures come back as [`crate::error::TransportError`] wrapped in the
/// crate error. Callers treat every failure as best-effort and never retry.
pub trait ReplyTransport: Send + Sync + 'static {
    /// Unique name for this transport, used in logs.
    fn name(&self) -> &str;

    /// Send `text` to `channel_id` and return a handle to the new message.
    fn post(
        &self,
        channel_id: ChannelId,
        text: &str,
    ) -> impl Future<Output = Result<MessageHandle>> + Send;

    /// Replace the text of a message sent earlier.
    fn edit(&self, handle: MessageHandle, text: &str) -> impl Future<Output = Result<()>> + Send;

    /// Delete a message sent earlier.
    fn delete(&self, handle: MessageHandle) -> impl Future<Output = Result<()>> + Send;
}
