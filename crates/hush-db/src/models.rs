//! Database row types. These map directly to SQLite rows.
//! Distinct from hush-types API models to keep the DB layer independent.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use hush_types::models::{ChannelId, Message, MessageId, UserId, VisibilityDescriptor};

pub struct MessageRow {
    pub id: i64,
    pub sender_id: i64,
    pub channel_id: Option<i64>,
    pub topic: Option<String>,
    pub content: String,
    pub sent_at: String,
    pub whisper_recipients: Option<String>,
}

impl MessageRow {
    pub const COLUMNS: &'static str =
        "id, sender_id, channel_id, topic, content, sent_at, whisper_recipients";

    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            sender_id: row.get(1)?,
            channel_id: row.get(2)?,
            topic: row.get(3)?,
            content: row.get(4)?,
            sent_at: row.get(5)?,
            whisper_recipients: row.get(6)?,
        })
    }

    /// Unreadable columns are errors. A descriptor treated as absent would
    /// expose the whisper to the whole channel.
    pub fn into_message(self) -> Result<Message> {
        let whisper_recipients = self
            .whisper_recipients
            .as_deref()
            .map(serde_json::from_str::<VisibilityDescriptor>)
            .transpose()
            .with_context(|| format!("Corrupt whisper_recipients on message {}", self.id))?;

        let sent_at = self
            .sent_at
            .parse::<DateTime<Utc>>()
            .with_context(|| format!("Corrupt sent_at '{}' on message {}", self.sent_at, self.id))?;

        Ok(Message {
            id: MessageId(self.id),
            sender_id: UserId(self.sender_id),
            channel_id: self.channel_id.map(ChannelId),
            topic: self.topic,
            content: self.content,
            sent_at,
            whisper_recipients,
        })
    }
}
