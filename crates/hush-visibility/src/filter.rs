use std::collections::HashSet;

use anyhow::Result;
use hush_types::api::Anchor;
use hush_types::models::{ChannelId, GroupId, Message, MessageId, UserId, VisibilityDescriptor};
use tracing::debug;

use crate::resolver::{AccessSource, is_visible};
use crate::store::{Directory, GroupMembership, MessageLog, Scan};

/// Candidates pulled from the store per round trip while filling a page.
pub const SCAN_BATCH: usize = 100;

/// What the viewer can reach in one channel, captured once per query.
///
/// Group membership and subscription are fetched a single time; each
/// candidate then costs a set lookup instead of a membership round trip.
#[derive(Debug, Clone)]
pub struct ViewerContext {
    pub viewer: UserId,
    pub channel_id: ChannelId,
    pub groups: HashSet<GroupId>,
    pub subscribed: bool,
}

impl ViewerContext {
    pub fn load<S: Directory + GroupMembership + ?Sized>(
        store: &S,
        viewer: UserId,
        channel_id: ChannelId,
    ) -> Result<Self> {
        Ok(Self {
            viewer,
            channel_id,
            groups: store.current_user_groups(viewer)?,
            subscribed: store.is_channel_subscriber(channel_id, viewer)?,
        })
    }
}

/// A viewer context paired with the index rows of one candidate batch.
struct BatchAccess<'c> {
    context: &'c ViewerContext,
    materialized: HashSet<MessageId>,
}

impl AccessSource for BatchAccess<'_> {
    fn has_materialized_access(&self, viewer: UserId, message: &Message) -> Result<bool> {
        Ok(viewer == self.context.viewer && self.materialized.contains(&message.id))
    }

    fn has_live_group_access(
        &self,
        viewer: UserId,
        descriptor: &VisibilityDescriptor,
    ) -> Result<bool> {
        Ok(viewer == self.context.viewer
            && descriptor.group_ids.iter().any(|g| self.context.groups.contains(g)))
    }

    fn has_subscription(&self, viewer: UserId, channel_id: ChannelId) -> Result<bool> {
        Ok(viewer == self.context.viewer
            && channel_id == self.context.channel_id
            && self.context.subscribed)
    }
}

/// Keeps the candidates the viewer may see, in their original order.
///
/// Index rows are fetched in one query for the whole batch, and only for
/// messages whose visibility can depend on them.
pub fn filter_visible<S: MessageLog + ?Sized>(
    store: &S,
    context: &ViewerContext,
    candidates: Vec<Message>,
) -> Result<Vec<Message>> {
    let needs_rows: Vec<MessageId> = candidates
        .iter()
        .filter(|m| m.whisper_recipients.is_some() || m.channel_id.is_none())
        .map(|m| m.id)
        .collect();

    let materialized = if needs_rows.is_empty() {
        HashSet::new()
    } else {
        store.visibility_rows_among(context.viewer, &needs_rows)?
    };

    let access = BatchAccess { context, materialized };
    let mut visible = Vec::with_capacity(candidates.len());
    for message in candidates {
        if is_visible(&access, context.viewer, &message)? {
            visible.push(message);
        }
    }
    Ok(visible)
}

/// Walks the channel in `scan` order until `want` visible messages are
/// collected or the history runs out. Invisible messages never count
/// against `want`.
pub fn scan_visible<S: MessageLog + ?Sized>(
    store: &S,
    context: &ViewerContext,
    mut scan: Scan,
    want: usize,
) -> Result<Vec<Message>> {
    let mut out = Vec::with_capacity(want);

    while out.len() < want {
        let batch = store.channel_window(context.channel_id, scan, SCAN_BATCH)?;
        let fetched = batch.len();
        let Some(last) = batch.last().map(|m| m.id) else {
            break;
        };

        let visible = filter_visible(store, context, batch)?;
        debug!(
            "scan {:?} in channel {}: {} fetched, {} visible to {}",
            scan,
            context.channel_id,
            fetched,
            visible.len(),
            context.viewer
        );
        out.extend(visible.into_iter().take(want - out.len()));

        if fetched < SCAN_BATCH {
            break;
        }
        scan = match scan {
            Scan::Before(_) => Scan::Before(Some(last)),
            Scan::AtOrAfter(_) => Scan::AtOrAfter(MessageId(last.0 + 1)),
        };
    }

    Ok(out)
}

/// A window of channel history around an anchor.
///
/// The before side holds ids below the anchor (`newest`: everything,
/// newest included); the after side holds ids at or above it (`oldest`:
/// from the first message). Counts are in visible messages.
///
/// With an id anchor the anchor message itself is the first entry of the
/// after side and counts against `num_after`: anchor 4 with two on each
/// side yields `[2, 3, 4, 5]`. Ask for `num_after + 1` to get the anchor
/// plus a full after side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub anchor: Anchor,
    pub num_before: usize,
    pub num_after: usize,
}

impl Window {
    pub fn before_scan(&self) -> Option<Scan> {
        match self.anchor {
            _ if self.num_before == 0 => None,
            Anchor::Oldest => None,
            Anchor::Newest => Some(Scan::Before(None)),
            Anchor::Id(id) => Some(Scan::Before(Some(id))),
        }
    }

    pub fn after_scan(&self) -> Option<Scan> {
        match self.anchor {
            _ if self.num_after == 0 => None,
            Anchor::Newest => None,
            Anchor::Oldest => Some(Scan::AtOrAfter(MessageId(0))),
            Anchor::Id(id) => Some(Scan::AtOrAfter(id)),
        }
    }
}
