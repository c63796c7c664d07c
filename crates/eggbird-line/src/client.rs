//! LINE Messaging API client: targeted replies and broadcasts.

use async_trait::async_trait;
use eggbird_core::{config::LineConfig, error::EggbirdError, traits::Channel};
use serde_json::json;
use tracing::{debug, warn};

/// LINE allows at most 5000 characters per text message object.
const MAX_TEXT_LEN: usize = 5000;

/// And at most five message objects per reply/broadcast call.
const MAX_MESSAGES_PER_CALL: usize = 5;

/// LINE Messaging API channel.
pub struct LineChannel {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl LineChannel {
    /// Create a new LINE channel from config.
    pub fn new(config: &LineConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: "https://api.line.me/v2/bot".to_string(),
            access_token: config.channel_access_token.clone(),
        }
    }

    /// POST a message endpoint with bearer auth and surface API errors.
    async fn post_messages(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<(), EggbirdError> {
        let url = format!("{}{path}", self.base_url);
        debug!("line: POST {url}");

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .json(&body)
            .send()
            .await
            .map_err(|e| EggbirdError::Channel(format!("line send failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            return Err(EggbirdError::Channel(format!(
                "line send failed ({status}): {error_text}"
            )));
        }

        Ok(())
    }

    /// Build the messages array, chunking long text at the platform limit.
    fn text_messages(text: &str) -> Vec<serde_json::Value> {
        let chunks = split_message(text, MAX_TEXT_LEN);
        if chunks.len() > MAX_MESSAGES_PER_CALL {
            warn!(
                "line: text needs {} chunks, truncating to {MAX_MESSAGES_PER_CALL}",
                chunks.len()
            );
        }
        chunks
            .into_iter()
            .take(MAX_MESSAGES_PER_CALL)
            .map(|chunk| json!({"type": "text", "text": chunk}))
            .collect()
    }
}

#[async_trait]
impl Channel for LineChannel {
    fn name(&self) -> &str {
        "line"
    }

    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), EggbirdError> {
        let body = json!({
            "replyToken": reply_token,
            "messages": LineChannel::text_messages(text),
        });
        self.post_messages("/message/reply", body).await
    }

    async fn broadcast(&self, text: &str) -> Result<(), EggbirdError> {
        let body = json!({
            "messages": LineChannel::text_messages(text),
        });
        self.post_messages("/message/broadcast", body).await
    }
}

/// Split a long message into chunks that respect a platform's character limit.
///
/// All slice boundaries are aligned to UTF-8 char boundaries to avoid panics
/// on multi-byte content (CJK, emoji). Prefers splitting at newline
/// boundaries when possible.
pub fn split_message(text: &str, max_len: usize) -> Vec<&str> {
    if text.len() <= max_len {
        return vec![text];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        while end < text.len() && !text.is_char_boundary(end) {
            end -= 1;
        }
        let break_at = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .map(|i| start + i + 1)
                .unwrap_or(end)
        } else {
            end
        };
        chunks.push(&text[start..break_at]);
        start = break_at;
    }

    chunks
}
