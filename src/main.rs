use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use secrecy::SecretString;

use compass_llm::{ProxyConfig, ProxyProvider};
use compass_server::ServerConfig;
use compass_store::Database;

const DEFAULT_WEEKLY_REVIEW_PROMPT: &str = "\
You are a supportive personal-development coach. Given a JSON summary of a \
user's week (planned steps done and not done, average mood, their own \
reflection), respond with a JSON object containing: summary (string), score \
(integer 1-10), feedback (object), questions_for_reflection (array of \
strings). Respond with JSON only.";

#[derive(Parser)]
#[command(name = "compass", about = "Compass coaching backend")]
struct Cli {
    /// Port to listen on
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Database file path (defaults to ~/.compass/database/compass.db)
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// AI proxy endpoint for weekly-review analysis
    #[arg(
        long,
        env = "COMPASS_AI_PROXY_URL",
        default_value = "http://127.0.0.1:8300/v1/chat/completions"
    )]
    ai_proxy_url: String,

    /// Model requested from the proxy
    #[arg(long, env = "COMPASS_AI_MODEL", default_value = "gpt-4o-mini")]
    ai_model: String,

    /// Bounded wait for weekly analysis, in seconds
    #[arg(long, default_value_t = 90)]
    generation_timeout_secs: u64,

    /// Override the weekly-review system prompt with a file's contents
    #[arg(long)]
    system_prompt_path: Option<PathBuf>,
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

    tracing::info!("Starting Compass server");

    let db_path = match cli.db_path {
        Some(path) => path,
        None => dirs_home().join(".compass").join("database").join("compass.db"),
    };
    let db = Database::open(&db_path).context("failed to open database")?;
    tracing::info!(path = %db_path.display(), "Database opened");

    let system_prompt = match cli.system_prompt_path {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read system prompt {}", path.display()))?
            .trim()
            .to_string(),
        None => DEFAULT_WEEKLY_REVIEW_PROMPT.to_string(),
    };

    let api_key = std::env::var("COMPASS_AI_API_KEY").ok().map(SecretString::from);
    let provider = Arc::new(
        ProxyProvider::new(ProxyConfig {
            url: cli.ai_proxy_url,
            model: cli.ai_model,
            api_key,
            system_prompt,
        })
        .context("failed to build AI proxy provider")?,
    );

    let config = ServerConfig {
        port: cli.port,
        generation_timeout_secs: cli.generation_timeout_secs,
    };
    let port = config.port;
    let _handle = compass_server::start(config, db, provider)
        .await
        .context("failed to start server")?;

    tracing::info!(port = port, "Compass server ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    tracing::info!("Shutting down");
    Ok(())
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}
