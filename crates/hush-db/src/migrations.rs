use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY,
            full_name   TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS channels (
            id          INTEGER PRIMARY KEY,
            name        TEXT NOT NULL UNIQUE,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS subscriptions (
            channel_id  INTEGER NOT NULL REFERENCES channels(id),
            user_id     INTEGER NOT NULL REFERENCES users(id),
            PRIMARY KEY (channel_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS user_groups (
            id          INTEGER PRIMARY KEY,
            name        TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS group_members (
            group_id    INTEGER NOT NULL REFERENCES user_groups(id) ON DELETE CASCADE,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            PRIMARY KEY (group_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_group_members_user
            ON group_members(user_id);

        -- AUTOINCREMENT: ids only ever grow and are never reused.
        -- whisper_recipients is write-once JSON of shape {user_ids: [..], group_ids: [..]}
        CREATE TABLE IF NOT EXISTS messages (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            sender_id           INTEGER NOT NULL REFERENCES users(id),
            channel_id          INTEGER REFERENCES channels(id),
            topic               TEXT,
            content             TEXT NOT NULL,
            sent_at             TEXT NOT NULL,
            whisper_recipients  TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_messages_channel
            ON messages(channel_id, id);

        -- Materialized recipient index. Rows are never updated or deleted.
        CREATE TABLE IF NOT EXISTS message_visibility (
            message_id  INTEGER NOT NULL REFERENCES messages(id),
            user_id     INTEGER NOT NULL REFERENCES users(id),
            PRIMARY KEY (message_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_message_visibility_user
            ON message_visibility(user_id, message_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
