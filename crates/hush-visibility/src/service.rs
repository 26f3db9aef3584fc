use std::collections::BTreeSet;

use hush_types::api::SendMessageRequest;
use hush_types::models::{ChannelId, Message, MessageId, SendTarget, UserId};
use tracing::{debug, info};

use crate::audience::compute_audience;
use crate::descriptor::build_descriptor;
use crate::error::{RecipientKind, Result, WhisperError};
use crate::filter::{ViewerContext, Window, scan_visible};
use crate::resolver::{LiveAccess, is_visible};
use crate::store::{NewMessage, WhisperStore};

pub const MAX_TOPIC_LEN: usize = 60;
pub const MAX_CONTENT_LEN: usize = 10_000;

/// A committed message together with the audience it was materialized for.
/// The audience is exactly who receives the real-time event.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub message: Message,
    pub audience: BTreeSet<UserId>,
}

/// Validates, resolves and writes a message with its index rows.
///
/// Must run inside one unit of work: on any error nothing is written, and
/// the caller only fans out once the unit has committed.
pub fn send_message<S: WhisperStore + ?Sized>(
    store: &S,
    sender_id: UserId,
    request: &SendMessageRequest,
) -> Result<SentMessage> {
    if store.resolve_user(sender_id)?.is_none() {
        return Err(WhisperError::UnknownSender(sender_id));
    }

    let descriptor = build_descriptor(
        store,
        &request.target,
        &request.whisper_to_user_ids,
        &request.whisper_to_group_ids,
    )?;

    let content = request.content.trim();
    if content.is_empty() {
        return Err(WhisperError::InvalidMessage("content must not be empty".into()));
    }
    if content.chars().count() > MAX_CONTENT_LEN {
        return Err(WhisperError::InvalidMessage(format!(
            "content exceeds {} characters",
            MAX_CONTENT_LEN
        )));
    }

    let (channel_id, topic) = match &request.target {
        SendTarget::Channel { channel_id, topic } => {
            let topic = validate_topic(topic)?;
            check_channel(store, *channel_id, sender_id)?;
            (Some(*channel_id), Some(topic))
        }
        SendTarget::Direct { recipient_ids } => {
            if recipient_ids.is_empty() {
                return Err(WhisperError::InvalidMessage("direct message needs a recipient".into()));
            }
            for &user_id in recipient_ids {
                if store.resolve_user(user_id)?.is_none() {
                    return Err(WhisperError::UnknownRecipient {
                        kind: RecipientKind::User,
                        id: user_id.0,
                    });
                }
            }
            (None, None)
        }
    };

    let audience = compute_audience(store, sender_id, &request.target, descriptor.as_ref())?;

    let message = store.insert_message(
        &NewMessage {
            sender_id,
            channel_id,
            topic,
            content: content.to_string(),
            sent_at: chrono::Utc::now(),
            whisper_recipients: descriptor,
        },
        &audience,
    )?;

    info!(
        "message {} from {} written for {} recipients{}",
        message.id,
        sender_id,
        audience.len(),
        if message.is_whisper() { " (whisper)" } else { "" }
    );

    Ok(SentMessage { message, audience })
}

fn validate_topic(topic: &str) -> Result<String> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(WhisperError::InvalidMessage("topic must not be empty".into()));
    }
    if topic.chars().count() > MAX_TOPIC_LEN {
        return Err(WhisperError::InvalidMessage(format!(
            "topic exceeds {} characters",
            MAX_TOPIC_LEN
        )));
    }
    Ok(topic.to_string())
}

fn check_channel<S: WhisperStore + ?Sized>(
    store: &S,
    channel_id: ChannelId,
    sender_id: UserId,
) -> Result<()> {
    if !store.channel_exists(channel_id)? {
        return Err(WhisperError::UnknownChannel(channel_id));
    }
    if !store.is_channel_subscriber(channel_id, sender_id)? {
        return Err(WhisperError::NotSubscribed(channel_id));
    }
    Ok(())
}

/// Fetches one message for `viewer`. Missing and hidden messages both come
/// back as `NotVisible`.
pub fn get_message<S: WhisperStore + ?Sized>(
    store: &S,
    viewer: UserId,
    message_id: MessageId,
) -> Result<Message> {
    let message = store.message_by_id(message_id)?.ok_or(WhisperError::NotVisible)?;

    if is_visible(&LiveAccess::new(store), viewer, &message)? {
        Ok(message)
    } else {
        debug!("message {} hidden from {}", message_id, viewer);
        Err(WhisperError::NotVisible)
    }
}

/// Lists a window of channel history visible to `viewer`, oldest first.
/// Hidden messages are left out silently and never count toward the window.
pub fn list_messages<S: WhisperStore + ?Sized>(
    store: &S,
    viewer: UserId,
    channel_id: ChannelId,
    window: Window,
) -> Result<Vec<Message>> {
    let context = ViewerContext::load(store, viewer, channel_id)?;

    let mut messages = match window.before_scan() {
        Some(scan) => scan_visible(store, &context, scan, window.num_before)?,
        None => Vec::new(),
    };
    messages.reverse();

    if let Some(scan) = window.after_scan() {
        messages.extend(scan_visible(store, &context, scan, window.num_after)?);
    }

    Ok(messages)
}
