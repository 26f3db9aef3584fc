use serde::{Deserialize, Serialize};

use crate::models::{Message, UserId};

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms the connection is registered for fan-out
    Ready { user_id: UserId },

    /// A new message was committed and this client is in its audience
    MessageCreate { message: Message },
}
