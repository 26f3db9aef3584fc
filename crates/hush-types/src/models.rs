use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }
    };
}

id_type!(UserId);
id_type!(ChannelId);
id_type!(
    /// User group id. Membership lives outside the message history.
    GroupId
);
id_type!(
    /// Assigned by the store at send time; strictly increasing, never reused.
    MessageId
);

/// The recipients a whisper was addressed to, exactly as the sender named them.
///
/// Write-once: stored with the message and never rewritten. The effective
/// audience can still grow through group membership, but this record does not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityDescriptor {
    #[serde(default)]
    pub user_ids: BTreeSet<UserId>,
    #[serde(default)]
    pub group_ids: BTreeSet<GroupId>,
}

impl VisibilityDescriptor {
    /// Returns `None` when both lists are empty: that is an ordinary message.
    pub fn new(
        user_ids: impl IntoIterator<Item = UserId>,
        group_ids: impl IntoIterator<Item = GroupId>,
    ) -> Option<Self> {
        let descriptor = Self {
            user_ids: user_ids.into_iter().collect(),
            group_ids: group_ids.into_iter().collect(),
        };
        if descriptor.user_ids.is_empty() && descriptor.group_ids.is_empty() {
            None
        } else {
            Some(descriptor)
        }
    }
}

/// Where a message is being sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SendTarget {
    Channel { channel_id: ChannelId, topic: String },
    Direct { recipient_ids: Vec<UserId> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    /// `None` for direct messages.
    pub channel_id: Option<ChannelId>,
    pub topic: Option<String>,
    pub content: String,
    pub sent_at: DateTime<Utc>,
    pub whisper_recipients: Option<VisibilityDescriptor>,
}

impl Message {
    pub fn is_whisper(&self) -> bool {
        self.whisper_recipients.is_some()
    }
}
