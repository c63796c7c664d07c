mod api;
mod dispatch;

use clap::{Parser, Subcommand};
use eggbird_core::{config, traits::Provider};
use eggbird_line::LineChannel;
use eggbird_providers::{openai::OpenAiProvider, SYSTEM_INSTRUCTION};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "eggbird",
    version,
    about = "EggBird — LINE health-assistant bot"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server.
    Start,
    /// Check configuration and provider availability.
    Status,
    /// Send a one-shot prompt to the completion provider.
    Ask {
        /// The message to send.
        #[arg(trailing_var_arg = true)]
        message: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Start => {
            let cfg = config::load(&cli.config)?;
            let provider: Arc<dyn Provider> = Arc::new(OpenAiProvider::from_config(&cfg.provider));
            let channel: Arc<dyn eggbird_core::traits::Channel> =
                Arc::new(LineChannel::new(&cfg.line));

            println!("EggBird — starting bot...");
            api::serve(&cfg, channel, provider).await;
        }
        Commands::Status => {
            let cfg = config::load(&cli.config)?;
            println!("EggBird — Status Check\n");
            println!("Config: {}", cli.config);
            println!("Model: {}", cfg.provider.model);
            println!("Prompt mode: {:?}", cfg.prompt.mode);
            println!();

            let provider = OpenAiProvider::from_config(&cfg.provider);
            println!(
                "  openai: {}",
                if provider.is_available().await {
                    "available"
                } else {
                    "not available"
                }
            );
            println!(
                "  line: {}",
                if cfg.line.channel_access_token.is_empty() {
                    "missing channel access token"
                } else {
                    "configured"
                }
            );
        }
        Commands::Ask { message } => {
            if message.is_empty() {
                anyhow::bail!("no message provided. Usage: eggbird ask <message>");
            }

            let prompt = message.join(" ");
            let cfg = config::load(&cli.config)?;
            let provider = OpenAiProvider::from_config(&cfg.provider);

            if !provider.is_available().await {
                anyhow::bail!(
                    "provider '{}' is not available. Is the API key set?",
                    provider.name()
                );
            }

            let response = provider.complete(SYSTEM_INSTRUCTION, &prompt).await?;
            println!("{response}");
        }
    }

    Ok(())
}
