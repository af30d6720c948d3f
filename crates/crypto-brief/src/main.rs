use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use shared::{
    AiClient, AiProvider, AiSummarizer, Config, FeedKind, FollowinClient, PipelineError,
    TelegramApi, TelegramPublisher,
};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "crypto-brief")]
#[command(about = "Fetch crypto headlines, summarize them with an LLM and post the report to Telegram")]
struct Args {
    /// Feed(s) to read: news, trending, opinions, tag
    #[arg(short, long = "feed", default_value = "news")]
    feeds: Vec<FeedKind>,

    /// Maximum number of titles taken from each feed
    #[arg(short = 'n', long)]
    max_items: Option<usize>,

    /// Model protocol: gemini (generateContent) or openai (chat/completions)
    #[arg(short, long)]
    provider: Option<AiProvider>,

    /// Candidate model, tried in the order given (repeat or comma-separate)
    #[arg(short, long = "model", value_delimiter = ',')]
    models: Vec<String>,

    /// Print the report instead of sending it to Telegram
    #[arg(long)]
    dry_run: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_timer(tfmt::time::UtcTime::rfc_3339())
        .init();
}

/// Loads the config and folds in command-line overrides. Nothing touches the
/// network until this has succeeded.
fn load_config(args: &Args) -> Result<Config> {
    let mut config = Config::from_env()?;

    if let Some(provider) = args.provider {
        config.ai_provider = provider;
    }
    if let Some(max_items) = args.max_items {
        config.max_items = max_items;
    }
    let models: Vec<String> = args
        .models
        .iter()
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect();
    if !models.is_empty() {
        config.ai_models = Some(models);
    }

    config.validate(!args.dry_run)?;
    Ok(config)
}

async fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    let models = config.candidate_models();

    tracing::info!(
        provider = %config.ai_provider,
        models = %models.join(","),
        feeds = ?args.feeds,
        dry_run = args.dry_run,
        "crypto-brief starting"
    );

    let feed = FollowinClient::new(
        config.followin_api_key.clone(),
        config.followin_base_url.clone(),
        args.feeds.clone(),
    )?;
    let summarizer = AiSummarizer::new(AiClient::from_config(&config)?, models);

    let publisher = if args.dry_run {
        None
    } else {
        let (bot_token, chat_id) = config.telegram_credentials()?;
        let api = TelegramApi::new(bot_token, &config.telegram_api_base)?;
        Some(TelegramPublisher::new(api, chat_id.to_string()))
    };

    let outcome = shared::run(&feed, &summarizer, publisher.as_ref(), config.max_items)
        .await
        .context("Daily brief run failed")?;

    if outcome.published {
        tracing::info!(titles = outcome.titles.len(), "✅ report delivered");
    } else {
        println!("{}", outcome.report);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e
                .downcast_ref::<PipelineError>()
                .map(PipelineError::exit_code)
                .unwrap_or(1);
            eprintln!("Error: {e:#}");
            ExitCode::from(code)
        }
    }
}
