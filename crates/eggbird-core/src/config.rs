//! TOML configuration with environment-variable overrides for secrets.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::error::EggbirdError;
use crate::prompt::PromptMode;

/// Top-level EggBird configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub line: LineConfig,
    #[serde(default)]
    pub provider: OpenAiConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
}

/// General bot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Shared secret for `GET /cron_trigger`, checked against the
    /// `X-Cron-Token` header. Empty = no check (trusted-scheduler only).
    #[serde(default)]
    pub cron_token: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cron_token: String::new(),
        }
    }
}

/// LINE Messaging API credentials.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LineConfig {
    /// Channel access token for the reply/broadcast API.
    #[serde(default)]
    pub channel_access_token: String,
    /// Channel secret for webhook signature verification.
    #[serde(default)]
    pub channel_secret: String,
}

/// OpenAI-compatible provider config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Prompt construction settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PromptConfig {
    /// `dynamic` interpolates today's schedule clause; `static` renders the
    /// single all-weekdays instruction.
    #[serde(default)]
    pub mode: PromptMode,
}

fn default_name() -> String {
    "EggBird".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4".to_string()
}

fn default_max_tokens() -> u32 {
    300
}

fn default_temperature() -> f32 {
    0.7
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist, then applies
/// environment overrides. Missing secrets are warned about but never fatal:
/// the bot should come up so the operator can see it in logs.
pub fn load(path: &str) -> Result<Config, EggbirdError> {
    let path = Path::new(path);
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EggbirdError::Config(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| EggbirdError::Config(format!("failed to parse config: {e}")))?
    } else {
        tracing::info!("Config file not found at {}, using defaults", path.display());
        Config::default()
    };

    apply_env(&mut config);
    warn_missing_secrets(&config);

    Ok(config)
}

/// Override secrets from the environment. Env vars win over file values.
fn apply_env(config: &mut Config) {
    if let Ok(v) = std::env::var("LINE_CHANNEL_ACCESS_TOKEN") {
        if !v.is_empty() {
            config.line.channel_access_token = v;
        }
    }
    if let Ok(v) = std::env::var("LINE_CHANNEL_SECRET") {
        if !v.is_empty() {
            config.line.channel_secret = v;
        }
    }
    if let Ok(v) = std::env::var("OPENAI_API_KEY") {
        if !v.is_empty() {
            config.provider.api_key = v;
        }
    }
}

fn warn_missing_secrets(config: &Config) {
    if config.line.channel_access_token.is_empty() {
        warn!("LINE channel access token not set (config [line] or LINE_CHANNEL_ACCESS_TOKEN)");
    }
    if config.line.channel_secret.is_empty() {
        warn!("LINE channel secret not set (config [line] or LINE_CHANNEL_SECRET)");
    }
    if config.provider.api_key.is_empty() {
        warn!("OpenAI API key not set (config [provider] or OPENAI_API_KEY)");
    }
}
