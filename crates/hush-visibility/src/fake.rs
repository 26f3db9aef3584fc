//! In-memory collaborators for unit tests.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use anyhow::{Result, bail};
use hush_types::models::{ChannelId, GroupId, Message, MessageId, SendTarget, UserId, VisibilityDescriptor};

use crate::audience::compute_audience;
use crate::store::{Directory, GroupMembership, MessageLog, NewMessage, Scan};

#[derive(Default)]
pub struct MemoryStore {
    users: RefCell<BTreeSet<UserId>>,
    channels: RefCell<BTreeMap<ChannelId, BTreeSet<UserId>>>,
    groups: RefCell<BTreeMap<GroupId, BTreeSet<UserId>>>,
    messages: RefCell<Vec<Message>>,
    rows: RefCell<BTreeSet<(MessageId, UserId)>>,
    membership_calls: Cell<usize>,
    fail_membership: Cell<bool>,
}

impl MemoryStore {
    pub fn add_user(&self, user_id: UserId) {
        self.users.borrow_mut().insert(user_id);
    }

    pub fn add_channel(&self, channel_id: ChannelId, subscribers: &[UserId]) {
        for &u in subscribers {
            self.add_user(u);
        }
        self.channels
            .borrow_mut()
            .insert(channel_id, subscribers.iter().copied().collect());
    }

    pub fn subscribe(&self, channel_id: ChannelId, user_id: UserId) {
        self.add_user(user_id);
        self.channels.borrow_mut().entry(channel_id).or_default().insert(user_id);
    }

    pub fn add_group(&self, group_id: GroupId, members: &[UserId]) {
        for &u in members {
            self.add_user(u);
        }
        self.groups
            .borrow_mut()
            .insert(group_id, members.iter().copied().collect());
    }

    pub fn add_member(&self, group_id: GroupId, user_id: UserId) {
        self.add_user(user_id);
        self.groups.borrow_mut().entry(group_id).or_default().insert(user_id);
    }

    pub fn remove_member(&self, group_id: GroupId, user_id: UserId) {
        if let Some(members) = self.groups.borrow_mut().get_mut(&group_id) {
            members.remove(&user_id);
        }
    }

    /// Sends through the real audience computation, skipping validation.
    pub fn post(&self, sender_id: UserId, channel_id: ChannelId, descriptor: Option<VisibilityDescriptor>) -> Message {
        let target = SendTarget::Channel { channel_id, topic: "t".into() };
        let audience = compute_audience(self, sender_id, &target, descriptor.as_ref()).unwrap();
        self.insert_message(
            &NewMessage {
                sender_id,
                channel_id: Some(channel_id),
                topic: Some("t".into()),
                content: "body".into(),
                sent_at: chrono::Utc::now(),
                whisper_recipients: descriptor,
            },
            &audience,
        )
        .unwrap()
    }

    pub fn message_count(&self) -> usize {
        self.messages.borrow().len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.borrow().len()
    }

    pub fn membership_calls(&self) -> usize {
        self.membership_calls.get()
    }

    pub fn fail_membership(&self, fail: bool) {
        self.fail_membership.set(fail);
    }

    fn count_membership_call(&self) -> Result<()> {
        self.membership_calls.set(self.membership_calls.get() + 1);
        if self.fail_membership.get() {
            bail!("membership store unavailable");
        }
        Ok(())
    }
}

impl Directory for MemoryStore {
    fn resolve_user(&self, id: UserId) -> Result<Option<UserId>> {
        Ok(self.users.borrow().contains(&id).then_some(id))
    }

    fn resolve_group(&self, id: GroupId) -> Result<Option<GroupId>> {
        Ok(self.groups.borrow().contains_key(&id).then_some(id))
    }

    fn channel_exists(&self, channel_id: ChannelId) -> Result<bool> {
        Ok(self.channels.borrow().contains_key(&channel_id))
    }

    fn is_channel_subscriber(&self, channel_id: ChannelId, user_id: UserId) -> Result<bool> {
        Ok(self
            .channels
            .borrow()
            .get(&channel_id)
            .is_some_and(|subs| subs.contains(&user_id)))
    }

    fn channel_subscribers(&self, channel_id: ChannelId) -> Result<BTreeSet<UserId>> {
        Ok(self.channels.borrow().get(&channel_id).cloned().unwrap_or_default())
    }
}

impl GroupMembership for MemoryStore {
    fn current_group_members(&self, group_id: GroupId) -> Result<BTreeSet<UserId>> {
        self.count_membership_call()?;
        Ok(self.groups.borrow().get(&group_id).cloned().unwrap_or_default())
    }

    fn current_user_groups(&self, user_id: UserId) -> Result<HashSet<GroupId>> {
        self.count_membership_call()?;
        Ok(self
            .groups
            .borrow()
            .iter()
            .filter(|(_, members)| members.contains(&user_id))
            .map(|(&g, _)| g)
            .collect())
    }
}

impl MessageLog for MemoryStore {
    fn insert_message(&self, message: &NewMessage, audience: &BTreeSet<UserId>) -> Result<Message> {
        let mut messages = self.messages.borrow_mut();
        let stored = Message {
            id: MessageId(messages.len() as i64 + 1),
            sender_id: message.sender_id,
            channel_id: message.channel_id,
            topic: message.topic.clone(),
            content: message.content.clone(),
            sent_at: message.sent_at,
            whisper_recipients: message.whisper_recipients.clone(),
        };
        messages.push(stored.clone());
        self.rows
            .borrow_mut()
            .extend(audience.iter().map(|&u| (stored.id, u)));
        Ok(stored)
    }

    fn message_by_id(&self, id: MessageId) -> Result<Option<Message>> {
        Ok(self.messages.borrow().iter().find(|m| m.id == id).cloned())
    }

    fn has_visibility_row(&self, message_id: MessageId, user_id: UserId) -> Result<bool> {
        Ok(self.rows.borrow().contains(&(message_id, user_id)))
    }

    fn visibility_rows_among(&self, user_id: UserId, message_ids: &[MessageId]) -> Result<HashSet<MessageId>> {
        let rows = self.rows.borrow();
        Ok(message_ids
            .iter()
            .copied()
            .filter(|&id| rows.contains(&(id, user_id)))
            .collect())
    }

    fn channel_window(&self, channel_id: ChannelId, scan: Scan, limit: usize) -> Result<Vec<Message>> {
        let messages = self.messages.borrow();
        let in_channel = messages.iter().filter(|m| m.channel_id == Some(channel_id));
        let window: Vec<Message> = match scan {
            Scan::Before(bound) => in_channel
                .rev()
                .filter(|m| bound.is_none_or(|b| m.id < b))
                .take(limit)
                .cloned()
                .collect(),
            Scan::AtOrAfter(bound) => in_channel
                .filter(|m| m.id >= bound)
                .take(limit)
                .cloned()
                .collect(),
        };
        Ok(window)
    }
}
