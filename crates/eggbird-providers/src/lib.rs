//! # eggbird-providers
//!
//! Completion provider implementations for EggBird, plus the never-fail
//! fallback policy around them.

pub mod openai;

use eggbird_core::traits::Provider;
use tracing::error;

/// Fixed user-facing reply substituted whenever the provider call fails.
pub const FALLBACK_REPLY: &str = "抱歉，我的 AI 大腦暫時短路了。";

/// Fixed system-role instruction sent with every completion.
pub const SYSTEM_INSTRUCTION: &str = "你是一個有幫助的 LINE 助理。";

/// Run a completion, recovering any failure into [`FALLBACK_REPLY`].
///
/// The bot must always produce some reply, so provider errors never reach
/// the caller: they are logged and swallowed here.
pub async fn complete_or_fallback(provider: &dyn Provider, prompt: &str) -> String {
    match provider.complete(SYSTEM_INSTRUCTION, prompt).await {
        Ok(text) => text,
        Err(e) => {
            error!("{} completion failed: {e}", provider.name());
            FALLBACK_REPLY.to_string()
        }
    }
}
