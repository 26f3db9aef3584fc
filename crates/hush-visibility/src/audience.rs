use std::collections::BTreeSet;

use hush_types::models::{SendTarget, UserId, VisibilityDescriptor};

use crate::store::{Directory, GroupMembership};

/// Users with confirmed access at send time. These get index rows and the
/// real-time event.
///
/// Whisper: sender, listed users, and the members of each listed group as
/// of this call. Ordinary channel message: current subscribers. Direct
/// message: sender and recipients. The sender is always included.
pub fn compute_audience<S: Directory + GroupMembership + ?Sized>(
    store: &S,
    sender_id: UserId,
    target: &SendTarget,
    descriptor: Option<&VisibilityDescriptor>,
) -> anyhow::Result<BTreeSet<UserId>> {
    let mut audience = BTreeSet::from([sender_id]);

    match (target, descriptor) {
        (_, Some(descriptor)) => {
            audience.extend(descriptor.user_ids.iter().copied());
            for &group_id in &descriptor.group_ids {
                audience.extend(store.current_group_members(group_id)?);
            }
        }
        (SendTarget::Channel { channel_id, .. }, None) => {
            audience.extend(store.channel_subscribers(*channel_id)?);
        }
        (SendTarget::Direct { recipient_ids }, None) => {
            audience.extend(recipient_ids.iter().copied());
        }
    }

    Ok(audience)
}
