//! Webhook event deserialization types.

use eggbird_core::error::EggbirdError;
use serde::Deserialize;

/// Top-level webhook request body.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

/// A single webhook event, discriminated by the `type` field.
///
/// Kinds the bot does not act on (follow, unfollow, postback, future
/// additions) deserialize as `Other` instead of failing the whole batch.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WebhookEvent {
    Message {
        #[serde(rename = "replyToken")]
        reply_token: String,
        #[serde(default)]
        source: Option<EventSource>,
        message: MessageContent,
    },
    Join {
        #[serde(rename = "replyToken")]
        reply_token: String,
    },
    #[serde(other)]
    Other,
}

/// Who sent the event: a user, group, or room.
#[derive(Debug, Deserialize)]
pub struct EventSource {
    #[serde(rename = "type", default)]
    pub source_type: String,
    #[serde(rename = "userId", default)]
    pub user_id: Option<String>,
}

/// Message payload, discriminated by the `type` field. Only text messages
/// are acted on; stickers, images, and the rest map to `Other`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageContent {
    Text {
        #[serde(default)]
        id: Option<String>,
        text: String,
    },
    #[serde(other)]
    Other,
}

/// Decode a webhook body into events.
pub fn parse_webhook(body: &str) -> Result<WebhookPayload, EggbirdError> {
    serde_json::from_str(body)
        .map_err(|e| EggbirdError::Channel(format!("invalid webhook payload: {e}")))
}
