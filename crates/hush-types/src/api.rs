use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::{GroupId, Message, MessageId, SendTarget, UserId};

// -- JWT Claims --

/// JWT claims shared across hush-api (REST middleware) and the gateway
/// upgrade handler. Tokens are minted by the external auth service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub exp: usize,
}

// -- Messages --

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(flatten)]
    pub target: SendTarget,
    pub content: String,
    #[serde(default)]
    pub whisper_to_user_ids: Vec<UserId>,
    #[serde(default)]
    pub whisper_to_group_ids: Vec<GroupId>,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub result: &'static str,
    pub id: MessageId,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub result: &'static str,
    pub message: Message,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub result: &'static str,
    pub anchor: Anchor,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub result: &'static str,
    pub msg: String,
}

/// Reference point of a message window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Anchor {
    Oldest,
    Newest,
    Id(MessageId),
}

impl FromStr for Anchor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "oldest" => Ok(Self::Oldest),
            "newest" => Ok(Self::Newest),
            other => other
                .parse::<i64>()
                .map(|id| Self::Id(MessageId(id)))
                .map_err(|_| format!("invalid anchor: {other}")),
        }
    }
}

impl TryFrom<String> for Anchor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Anchor> for String {
    fn from(anchor: Anchor) -> Self {
        match anchor {
            Anchor::Oldest => "oldest".to_string(),
            Anchor::Newest => "newest".to_string(),
            Anchor::Id(id) => id.to_string(),
        }
    }
}

// -- Groups --

#[derive(Debug, Serialize)]
pub struct MembershipResponse {
    pub result: &'static str,
    /// Whether the call changed anything.
    pub changed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChannelId;

    #[test]
    fn anchor_parses_keywords_and_ids() {
        assert_eq!("oldest".parse::<Anchor>().unwrap(), Anchor::Oldest);
        assert_eq!("newest".parse::<Anchor>().unwrap(), Anchor::Newest);
        assert_eq!("42".parse::<Anchor>().unwrap(), Anchor::Id(MessageId(42)));
        assert!("first_unread".parse::<Anchor>().is_err());
    }

    #[test]
    fn send_request_reads_channel_whisper() {
        let req: SendMessageRequest = serde_json::from_str(
            r#"{"type":"channel","channel_id":3,"topic":"plans","content":"psst",
                "whisper_to_user_ids":[8],"whisper_to_group_ids":[2]}"#,
        )
        .unwrap();
        assert_eq!(
            req.target,
            SendTarget::Channel { channel_id: ChannelId(3), topic: "plans".into() }
        );
        assert_eq!(req.whisper_to_user_ids, vec![UserId(8)]);
        assert_eq!(req.whisper_to_group_ids, vec![GroupId(2)]);
    }

    #[test]
    fn send_request_defaults_whisper_lists() {
        let req: SendMessageRequest =
            serde_json::from_str(r#"{"type":"direct","recipient_ids":[5],"content":"hi"}"#)
                .unwrap();
        assert!(req.whisper_to_user_ids.is_empty());
        assert!(req.whisper_to_group_ids.is_empty());
    }
}
