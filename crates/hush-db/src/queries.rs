use std::collections::{BTreeSet, HashSet};

use anyhow::Result;
use hush_types::models::{ChannelId, GroupId, Message, MessageId, UserId};
use hush_visibility::{NewMessage, Scan};
use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::Database;
use crate::models::MessageRow;

impl Database {
    // -- Users, channels, groups --
    //
    // Owned by the surrounding chat server; kept here so the service runs
    // stand-alone and tests can seed state.

    pub fn create_user(&self, full_name: &str) -> Result<UserId> {
        self.with_conn(|conn| {
            conn.execute("INSERT INTO users (full_name) VALUES (?1)", [full_name])?;
            Ok(UserId(conn.last_insert_rowid()))
        })
    }

    pub fn create_channel(&self, name: &str) -> Result<ChannelId> {
        self.with_conn(|conn| {
            conn.execute("INSERT INTO channels (name) VALUES (?1)", [name])?;
            Ok(ChannelId(conn.last_insert_rowid()))
        })
    }

    pub fn subscribe(&self, channel_id: ChannelId, user_id: UserId) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO subscriptions (channel_id, user_id) VALUES (?1, ?2)",
                (channel_id.0, user_id.0),
            )?;
            Ok(())
        })
    }

    pub fn unsubscribe(&self, channel_id: ChannelId, user_id: UserId) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM subscriptions WHERE channel_id = ?1 AND user_id = ?2",
                (channel_id.0, user_id.0),
            )?;
            Ok(())
        })
    }

    pub fn create_group(&self, name: &str, members: &[UserId]) -> Result<GroupId> {
        self.with_conn(|conn| {
            conn.execute("INSERT INTO user_groups (name) VALUES (?1)", [name])?;
            let group_id = GroupId(conn.last_insert_rowid());
            for member in members {
                insert_group_member(conn, group_id, *member)?;
            }
            Ok(group_id)
        })
    }

    pub fn delete_group(&self, group_id: GroupId) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM user_groups WHERE id = ?1", [group_id.0])?;
            Ok(deleted > 0)
        })
    }

    // -- Group membership --
    //
    // Each change is its own transaction and never touches message history:
    // whisper visibility picks it up on the next read.

    /// Returns false if the user was already a member.
    pub fn add_group_member(&self, group_id: GroupId, user_id: UserId) -> Result<bool> {
        let added = self.with_conn(|conn| insert_group_member(conn, group_id, user_id))?;
        if added {
            info!("user {} joined group {}", user_id, group_id);
        }
        Ok(added)
    }

    /// Returns false if the user was not a member.
    pub fn remove_group_member(&self, group_id: GroupId, user_id: UserId) -> Result<bool> {
        let removed = self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM group_members WHERE group_id = ?1 AND user_id = ?2",
                (group_id.0, user_id.0),
            )?;
            Ok(n > 0)
        })?;
        if removed {
            info!("user {} left group {}", user_id, group_id);
        }
        Ok(removed)
    }

    pub fn group_exists(&self, group_id: GroupId) -> Result<bool> {
        self.with_conn(|conn| Ok(query_group(conn, group_id)?.is_some()))
    }

    pub fn user_exists(&self, user_id: UserId) -> Result<bool> {
        self.with_conn(|conn| Ok(query_user(conn, user_id)?.is_some()))
    }

    pub fn visibility_row_count(&self, message_id: MessageId) -> Result<usize> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM message_visibility WHERE message_id = ?1",
                [message_id.0],
                |row| row.get(0),
            )?;
            Ok(n as usize)
        })
    }

    pub fn message_count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
            Ok(n as usize)
        })
    }
}

fn insert_group_member(conn: &Connection, group_id: GroupId, user_id: UserId) -> Result<bool> {
    let n = conn.execute(
        "INSERT OR IGNORE INTO group_members (group_id, user_id) VALUES (?1, ?2)",
        (group_id.0, user_id.0),
    )?;
    Ok(n > 0)
}

pub(crate) fn query_user(conn: &Connection, id: UserId) -> Result<Option<UserId>> {
    let row = conn
        .query_row("SELECT id FROM users WHERE id = ?1", [id.0], |row| row.get(0))
        .optional()?;
    Ok(row.map(UserId))
}

pub(crate) fn query_group(conn: &Connection, id: GroupId) -> Result<Option<GroupId>> {
    let row = conn
        .query_row("SELECT id FROM user_groups WHERE id = ?1", [id.0], |row| row.get(0))
        .optional()?;
    Ok(row.map(GroupId))
}

pub(crate) fn query_channel_exists(conn: &Connection, id: ChannelId) -> Result<bool> {
    let row: Option<i64> = conn
        .query_row("SELECT id FROM channels WHERE id = ?1", [id.0], |row| row.get(0))
        .optional()?;
    Ok(row.is_some())
}

pub(crate) fn query_is_subscriber(conn: &Connection, channel_id: ChannelId, user_id: UserId) -> Result<bool> {
    let row: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM subscriptions WHERE channel_id = ?1 AND user_id = ?2",
            (channel_id.0, user_id.0),
            |row| row.get(0),
        )
        .optional()?;
    Ok(row.is_some())
}

pub(crate) fn query_subscribers(conn: &Connection, channel_id: ChannelId) -> Result<BTreeSet<UserId>> {
    let mut stmt = conn.prepare_cached("SELECT user_id FROM subscriptions WHERE channel_id = ?1")?;
    let rows = stmt
        .query_map([channel_id.0], |row| row.get::<_, i64>(0))?
        .map(|r| r.map(UserId))
        .collect::<std::result::Result<BTreeSet<_>, _>>()?;
    Ok(rows)
}

/// A group id that no longer exists simply yields no rows.
pub(crate) fn query_group_members(conn: &Connection, group_id: GroupId) -> Result<BTreeSet<UserId>> {
    let mut stmt = conn.prepare_cached("SELECT user_id FROM group_members WHERE group_id = ?1")?;
    let rows = stmt
        .query_map([group_id.0], |row| row.get::<_, i64>(0))?
        .map(|r| r.map(UserId))
        .collect::<std::result::Result<BTreeSet<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn query_user_groups(conn: &Connection, user_id: UserId) -> Result<HashSet<GroupId>> {
    let mut stmt = conn.prepare_cached("SELECT group_id FROM group_members WHERE user_id = ?1")?;
    let rows = stmt
        .query_map([user_id.0], |row| row.get::<_, i64>(0))?
        .map(|r| r.map(GroupId))
        .collect::<std::result::Result<HashSet<_>, _>>()?;
    Ok(rows)
}

// -- Messages --

pub(crate) fn insert_message(
    conn: &Connection,
    message: &NewMessage,
    audience: &BTreeSet<UserId>,
) -> Result<Message> {
    let descriptor_json = message
        .whisper_recipients
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO messages (sender_id, channel_id, topic, content, sent_at, whisper_recipients)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            message.sender_id.0,
            message.channel_id.map(|c| c.0),
            message.topic,
            message.content,
            message.sent_at.to_rfc3339(),
            descriptor_json,
        ],
    )?;
    let id = MessageId(conn.last_insert_rowid());

    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO message_visibility (message_id, user_id) VALUES (?1, ?2)",
    )?;
    for user_id in audience {
        stmt.execute((id.0, user_id.0))?;
    }

    Ok(Message {
        id,
        sender_id: message.sender_id,
        channel_id: message.channel_id,
        topic: message.topic.clone(),
        content: message.content.clone(),
        sent_at: message.sent_at,
        whisper_recipients: message.whisper_recipients.clone(),
    })
}

pub(crate) fn query_message(conn: &Connection, id: MessageId) -> Result<Option<Message>> {
    let sql = format!("SELECT {} FROM messages WHERE id = ?1", MessageRow::COLUMNS);
    let row = conn.query_row(&sql, [id.0], MessageRow::from_row).optional()?;
    row.map(MessageRow::into_message).transpose()
}

pub(crate) fn query_has_visibility_row(conn: &Connection, message_id: MessageId, user_id: UserId) -> Result<bool> {
    let row: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM message_visibility WHERE message_id = ?1 AND user_id = ?2",
            (message_id.0, user_id.0),
            |row| row.get(0),
        )
        .optional()?;
    Ok(row.is_some())
}

/// Batch-fetch which of `message_ids` the user holds index rows for.
pub(crate) fn query_visibility_rows_among(
    conn: &Connection,
    user_id: UserId,
    message_ids: &[MessageId],
) -> Result<HashSet<MessageId>> {
    if message_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let placeholders: Vec<String> = (2..=message_ids.len() + 1).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT message_id FROM message_visibility WHERE user_id = ?1 AND message_id IN ({})",
        placeholders.join(", ")
    );

    let mut params: Vec<i64> = Vec::with_capacity(message_ids.len() + 1);
    params.push(user_id.0);
    params.extend(message_ids.iter().map(|id| id.0));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params), |row| row.get::<_, i64>(0))?
        .map(|r| r.map(MessageId))
        .collect::<std::result::Result<HashSet<_>, _>>()?;

    Ok(rows)
}

pub(crate) fn query_channel_window(
    conn: &Connection,
    channel_id: ChannelId,
    scan: Scan,
    limit: usize,
) -> Result<Vec<Message>> {
    let (cmp, order, bound) = match scan {
        Scan::Before(bound) => ("<", "DESC", bound.map_or(i64::MAX, |b| b.0)),
        Scan::AtOrAfter(bound) => (">=", "ASC", bound.0),
    };
    let sql = format!(
        "SELECT {} FROM messages
         WHERE channel_id = ?1 AND id {} ?2
         ORDER BY id {}
         LIMIT ?3",
        MessageRow::COLUMNS,
        cmp,
        order
    );

    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt
        .query_map(
            rusqlite::params![channel_id.0, bound, limit as i64],
            MessageRow::from_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(MessageRow::into_message).collect()
}
