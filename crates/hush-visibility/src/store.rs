//! Collaborators consumed by the whisper subsystem.
//!
//! Every method is a point-in-time query; nothing here is cached. Writers
//! bundle their calls inside one unit of work provided by the backing store,
//! so a send observes and writes a consistent snapshot.

use std::collections::{BTreeSet, HashSet};

use anyhow::Result;
use chrono::{DateTime, Utc};
use hush_types::models::{ChannelId, GroupId, Message, MessageId, UserId, VisibilityDescriptor};

/// Users, groups and channels. Owned outside this subsystem.
pub trait Directory {
    /// `ResolveUser`: `None` if the id does not name an existing user.
    fn resolve_user(&self, id: UserId) -> Result<Option<UserId>>;

    /// `ResolveGroup`: `None` if the id does not name an existing group.
    fn resolve_group(&self, id: GroupId) -> Result<Option<GroupId>>;

    fn channel_exists(&self, channel_id: ChannelId) -> Result<bool>;

    fn is_channel_subscriber(&self, channel_id: ChannelId, user_id: UserId) -> Result<bool>;

    fn channel_subscribers(&self, channel_id: ChannelId) -> Result<BTreeSet<UserId>>;
}

/// Read side of the group membership store.
pub trait GroupMembership {
    /// Members right now. A group that no longer exists has no members.
    fn current_group_members(&self, group_id: GroupId) -> Result<BTreeSet<UserId>>;

    /// Groups the user belongs to right now.
    fn current_user_groups(&self, user_id: UserId) -> Result<HashSet<GroupId>>;
}

/// A message about to be written, before the store assigns its id.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: UserId,
    pub channel_id: Option<ChannelId>,
    pub topic: Option<String>,
    pub content: String,
    pub sent_at: DateTime<Utc>,
    pub whisper_recipients: Option<VisibilityDescriptor>,
}

/// Direction and bound of a channel history scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// Newest first, ids strictly below the bound (`None`: from the newest).
    Before(Option<MessageId>),
    /// Oldest first, ids at or above the bound.
    AtOrAfter(MessageId),
}

/// Messages plus the materialized recipient index.
pub trait MessageLog {
    /// Writes the message and one index row per audience member. Callers run
    /// this inside the store's atomic unit of work.
    fn insert_message(&self, message: &NewMessage, audience: &BTreeSet<UserId>) -> Result<Message>;

    fn message_by_id(&self, id: MessageId) -> Result<Option<Message>>;

    fn has_visibility_row(&self, message_id: MessageId, user_id: UserId) -> Result<bool>;

    /// The subset of `message_ids` the user has index rows for.
    fn visibility_rows_among(
        &self,
        user_id: UserId,
        message_ids: &[MessageId],
    ) -> Result<HashSet<MessageId>>;

    /// Candidate messages of a channel in scan order, unfiltered.
    fn channel_window(&self, channel_id: ChannelId, scan: Scan, limit: usize)
    -> Result<Vec<Message>>;
}

/// Everything a send, get or list needs from one unit of work.
pub trait WhisperStore: Directory + GroupMembership + MessageLog {}

impl<T: Directory + GroupMembership + MessageLog + ?Sized> WhisperStore for T {}
