use std::fmt;

use hush_types::models::{ChannelId, UserId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WhisperError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientKind {
    User,
    Group,
}

impl fmt::Display for RecipientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Group => f.write_str("user group"),
        }
    }
}

#[derive(Debug, Error)]
pub enum WhisperError {
    /// Whisper parameters on a send that does not target a channel.
    #[error("Whispers can only be sent in channels")]
    UnsupportedContext,

    #[error("Invalid {kind} id: {id}")]
    UnknownRecipient { kind: RecipientKind, id: i64 },

    /// The authenticated sender does not name an existing user.
    #[error("Invalid sender id: {0}")]
    UnknownSender(UserId),

    #[error("Channel does not exist: {0}")]
    UnknownChannel(ChannelId),

    #[error("Not subscribed to channel {0}")]
    NotSubscribed(ChannelId),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Hidden and nonexistent messages share this variant and message.
    #[error("Invalid message(s)")]
    NotVisible,

    /// Group membership or persistence could not be reached. Retriable.
    #[error("Store unavailable: {0}")]
    Store(#[from] anyhow::Error),
}

impl WhisperError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}
