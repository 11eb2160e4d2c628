use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

/// An inbound message or interaction from the chat platform.
///
/// Immutable once constructed; the dispatcher and handlers only ever read it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Unique event id, assigned on receipt.
    pub id: String,
    /// Channel the event originated from (platform-specific identifier).
    pub channel_id: String,
    /// Sender identity (platform-specific identifier).
    pub sender_id: String,
    /// Raw message body.
    pub body: String,
    pub received_at: DateTime<Utc>,
}

impl InboundEvent {
    pub fn new(
        channel_id: impl Into<String>,
        sender_id: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            channel_id: channel_id.into(),
            sender_id: sender_id.into(),
            body: body.into(),
            received_at: Utc::now(),
        }
    }
}

/// Outbound reply content. Text is always present; media is optional and
/// ignored by platforms that cannot carry it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyPayload {
    pub text: String,
    pub media_url: Option<String>,
}

impl ReplyPayload {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            media_url: None,
        }
    }
}
