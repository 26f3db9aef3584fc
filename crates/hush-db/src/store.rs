use std::collections::{BTreeSet, HashSet};

use anyhow::Result;
use hush_types::models::{ChannelId, GroupId, Message, MessageId, UserId};
use hush_visibility::{Directory, GroupMembership, MessageLog, NewMessage, Scan};
use rusqlite::Connection;

use crate::queries;

/// The whisper collaborators over one borrowed connection. Inside
/// [`Database::atomic`](crate::Database::atomic) the connection is a
/// transaction, so reads and writes of a send share one snapshot.
pub struct SqlStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqlStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl Directory for SqlStore<'_> {
    fn resolve_user(&self, id: UserId) -> Result<Option<UserId>> {
        queries::query_user(self.conn, id)
    }

    fn resolve_group(&self, id: GroupId) -> Result<Option<GroupId>> {
        queries::query_group(self.conn, id)
    }

    fn channel_exists(&self, channel_id: ChannelId) -> Result<bool> {
        queries::query_channel_exists(self.conn, channel_id)
    }

    fn is_channel_subscriber(&self, channel_id: ChannelId, user_id: UserId) -> Result<bool> {
        queries::query_is_subscriber(self.conn, channel_id, user_id)
    }

    fn channel_subscribers(&self, channel_id: ChannelId) -> Result<BTreeSet<UserId>> {
        queries::query_subscribers(self.conn, channel_id)
    }
}

impl GroupMembership for SqlStore<'_> {
    fn current_group_members(&self, group_id: GroupId) -> Result<BTreeSet<UserId>> {
        queries::query_group_members(self.conn, group_id)
    }

    fn current_user_groups(&self, user_id: UserId) -> Result<HashSet<GroupId>> {
        queries::query_user_groups(self.conn, user_id)
    }
}

impl MessageLog for SqlStore<'_> {
    fn insert_message(&self, message: &NewMessage, audience: &BTreeSet<UserId>) -> Result<Message> {
        queries::insert_message(self.conn, message, audience)
    }

    fn message_by_id(&self, id: MessageId) -> Result<Option<Message>> {
        queries::query_message(self.conn, id)
    }

    fn has_visibility_row(&self, message_id: MessageId, user_id: UserId) -> Result<bool> {
        queries::query_has_visibility_row(self.conn, message_id, user_id)
    }

    fn visibility_rows_among(
        &self,
        user_id: UserId,
        message_ids: &[MessageId],
    ) -> Result<HashSet<MessageId>> {
        queries::query_visibility_rows_among(self.conn, user_id, message_ids)
    }

    fn channel_window(
        &self,
        channel_id: ChannelId,
        scan: Scan,
        limit: usize,
    ) -> Result<Vec<Message>> {
        queries::query_channel_window(self.conn, channel_id, scan, limit)
    }
}
