use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use courier_gateway::{
    Config, ContextBuilder, GeminiClient, HistoryRepo, Relay, TelegramChannel, config, db,
};

/// Courier - Telegram relay gateway for Gemini-backed AI chat
#[derive(Parser)]
#[command(name = "courier", version, about)]
struct Cli {
    /// Telegram bot token
    #[arg(long, env = "TELEGRAM_TOKEN", hide_env_values = true)]
    telegram_token: String,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: String,

    /// Gemini model for chat completions
    #[arg(long, env = "GEMINI_MODEL", default_value = config::DEFAULT_MODEL)]
    model: String,

    /// Path to the history database
    #[arg(long, env = "DB_PATH", default_value = config::DEFAULT_DB_PATH)]
    db_path: PathBuf,

    /// Number of recent turns sent as context per reply
    #[arg(long, env = "HISTORY_LIMIT", default_value_t = config::DEFAULT_HISTORY_LIMIT)]
    history_limit: usize,

    /// Seconds between Telegram getUpdates polls
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = 2)]
    poll_interval_secs: u64,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,courier_gateway=info",
        1 => "info,courier_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config {
        telegram_token: cli.telegram_token,
        gemini_api_key: cli.gemini_api_key,
        model: cli.model,
        db_path: cli.db_path,
        history_limit: cli.history_limit,
        poll_interval: Duration::from_secs(cli.poll_interval_secs),
    };
    config.validate()?;

    tracing::info!(
        model = %config.model,
        db_path = %config.db_path.display(),
        history_limit = config.history_limit,
        "starting courier gateway"
    );

    let pool = db::init(&config.db_path)?;
    let history = HistoryRepo::new(pool);
    let context = ContextBuilder::new(history.clone(), config.history_limit);
    let backend = GeminiClient::new(config.gemini_api_key.clone(), config.model.clone())?;

    let (channel, rx) = TelegramChannel::with_receiver(config.telegram_token.clone());

    // Fail fast on a bad token
    channel.get_me().await?;

    let _poller = channel.start_polling(config.poll_interval);
    tracing::info!("telegram polling started");

    let relay = Arc::new(Relay::new(channel, history, context, backend));
    relay.run(rx).await;

    Ok(())
}
