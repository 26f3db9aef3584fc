use anyhow::Result;
use hush_types::models::{ChannelId, Message, UserId, VisibilityDescriptor};

use crate::store::{Directory, GroupMembership, MessageLog};

/// The access tiers the resolver composes. They stay separate: a
/// materialized grant is historical, a group grant is live.
pub trait AccessSource {
    /// The viewer has an index row for the message (access confirmed at send time).
    fn has_materialized_access(&self, viewer: UserId, message: &Message) -> Result<bool>;

    /// The viewer is currently a member of a group named by the descriptor.
    fn has_live_group_access(&self, viewer: UserId, descriptor: &VisibilityDescriptor)
    -> Result<bool>;

    /// Current channel subscription, for messages without a descriptor.
    fn has_subscription(&self, viewer: UserId, channel_id: ChannelId) -> Result<bool>;
}

/// Decides whether `viewer` may see `message`, short-circuiting on the
/// first grant.
///
/// 1. No descriptor: subscribers of the channel see it (direct messages:
///    only their index rows grant access).
/// 2. An index row grants access.
/// 3. Otherwise current membership in any named group grants access. A
///    group that no longer exists simply has no members.
///
/// Errors propagate; they never turn into a grant.
pub fn is_visible<A: AccessSource + ?Sized>(
    access: &A,
    viewer: UserId,
    message: &Message,
) -> Result<bool> {
    let Some(descriptor) = &message.whisper_recipients else {
        return match message.channel_id {
            Some(channel_id) => access.has_subscription(viewer, channel_id),
            None => access.has_materialized_access(viewer, message),
        };
    };

    if access.has_materialized_access(viewer, message)? {
        return Ok(true);
    }

    if descriptor.group_ids.is_empty() {
        return Ok(false);
    }

    access.has_live_group_access(viewer, descriptor)
}

/// Per-message access checks straight against the stores. Used for
/// single-message reads.
pub struct LiveAccess<'s, S: ?Sized> {
    store: &'s S,
}

impl<'s, S: ?Sized> LiveAccess<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }
}

impl<S> AccessSource for LiveAccess<'_, S>
where
    S: Directory + GroupMembership + MessageLog + ?Sized,
{
    fn has_materialized_access(&self, viewer: UserId, message: &Message) -> Result<bool> {
        self.store.has_visibility_row(message.id, viewer)
    }

    fn has_live_group_access(
        &self,
        viewer: UserId,
        descriptor: &VisibilityDescriptor,
    ) -> Result<bool> {
        let groups = self.store.current_user_groups(viewer)?;
        Ok(descriptor.group_ids.iter().any(|g| groups.contains(g)))
    }

    fn has_subscription(&self, viewer: UserId, channel_id: ChannelId) -> Result<bool> {
        self.store.is_channel_subscriber(channel_id, viewer)
    }
}
