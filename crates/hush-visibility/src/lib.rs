//! Selective-visibility messaging ("whispers").
//!
//! A whisper is a channel message restricted to named users and groups. Access
//! is the union of a write-once per-user index filled at send time and a live
//! check of current group membership, so users who join a named group later
//! see the history without any backfill.

pub mod audience;
pub mod descriptor;
pub mod error;
pub mod filter;
pub mod resolver;
pub mod service;
pub mod store;

#[cfg(test)]
mod fake;

pub use error::{RecipientKind, WhisperError};
pub use filter::{ViewerContext, Window};
pub use resolver::{AccessSource, LiveAccess, is_visible};
pub use service::{SentMessage, get_message, list_messages, send_message};
pub use store::{Directory, GroupMembership, MessageLog, NewMessage, Scan, WhisperStore};
