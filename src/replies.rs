//! Tracking of posted replies and keeping them in step with their sources.

pub mod cache;
pub mod sync;

pub use cache::{ReplyCache, TrackedReply};
pub use sync::{ReplySync, SyncEvent, SyncOutcome};
