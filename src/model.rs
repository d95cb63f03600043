//! Wire-level data shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One dispatched server-push frame.
///
/// Absent `event` and `data` are empty strings, as in the standard
/// event-source framing. `id` keeps an explicit empty `id:` line apart from
/// no `id` line at all, since the empty one resets the last event id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSourceMessage {
    /// Event category name
    pub event: String,

    /// Event id carried by this frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Payload, `data` lines joined with `\n`
    pub data: String,

    /// Suggested reconnect delay in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<u64>,
}

impl EventSourceMessage {
    /// Event name, with the unnamed default reported as `message`.
    pub fn event_name(&self) -> &str {
        if self.event.is_empty() {
            "message"
        } else {
            &self.event
        }
    }
}

/// Chat payload carried in the `data` field of a conversation stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Incremental text fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Error text reported by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errmsg: Option<String>,

    /// Conversation identifier
    #[serde(default)]
    pub session_id: String,

    /// Prior turns, opaque to the client
    #[serde(default)]
    pub histories: Value,
}
