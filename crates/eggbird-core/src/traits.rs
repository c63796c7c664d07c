use crate::error::EggbirdError;
use async_trait::async_trait;

/// Completion provider trait — the brain.
///
/// Any OpenAI-compatible backend implements this trait to turn a prompt
/// into a reply text.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Whether this provider requires an API key to function.
    fn requires_api_key(&self) -> bool;

    /// Send a system instruction plus a user prompt and get the reply text.
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, EggbirdError>;

    /// Check if the provider is available and ready.
    async fn is_available(&self) -> bool;
}

/// Messaging channel trait — the mouth.
///
/// The platform integration implements this trait to deliver replies to a
/// single conversation or to every subscriber.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name.
    fn name(&self) -> &str;

    /// Send a targeted reply using the platform's one-shot reply token.
    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), EggbirdError>;

    /// Send a message to every user who has added the bot.
    async fn broadcast(&self, text: &str) -> Result<(), EggbirdError>;
}
