//! # Awful News Poster
//!
//! Reads a batch of fresh articles, picks the best one with a valid image,
//! composes a post under the character budget and publishes it to X.
//!
//! ## Usage
//!
//! ```sh
//! awful_news_poster -i ./batch.json
//! ```
//!
//! The run outcome is printed to stdout as JSON (and optionally written to
//! `--outcome-file`) so the caller can do its own bookkeeping. The process
//! exits non-zero when nothing was published.

use awful_news_poster::api::{SocialPlatform, XClient};
use awful_news_poster::image::ImageValidator;
use awful_news_poster::links::PassThroughLink;
use awful_news_poster::{Article, Pipeline, PublishOutcome, PublisherConfig};
use clap::Parser;
use std::error::Error;
use std::process::ExitCode;
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;

use cli::Cli;

#[tokio::main]
#[instrument]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let start_time = std::time::Instant::now();
    info!("awful_news_poster starting up");

    let args = Cli::parse();
    debug!(input = %args.input, dry_run = args.dry_run, self_check = args.self_check, "Parsed CLI arguments");

    let config = load_config(&args).await?;
    let token = args.access_token.clone().unwrap_or_default();
    if token.is_empty() && !args.dry_run {
        error!("No access token; set X_ACCESS_TOKEN or pass --access-token");
        return Err("missing access token".into());
    }
    let platform = XClient::new(&config.api_base_url, &token, config.request_timeout())?;

    if args.self_check {
        let account = platform.current_account().await.map_err(|e| {
            error!(error = %e, "Self-check failed");
            e
        })?;
        info!(id = %account.id, username = %account.username, "Self-check passed");
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({
            "id": account.id,
            "username": account.username,
            "name": account.name,
        }))?);
        return Ok(ExitCode::SUCCESS);
    }

    let articles = read_articles(&args.input).await?;
    info!(count = articles.len(), "Loaded article batch");

    let validator = ImageValidator::new(config.image.clone())?;
    let pipeline = Pipeline::new(&config, validator, platform, PassThroughLink);
    let outcome = if args.dry_run {
        pipeline.dry_run(articles).await
    } else {
        pipeline.run(articles).await
    };

    report(&outcome, &args).await?;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        success = outcome.is_success(),
        "Execution complete"
    );

    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Config file (or defaults) with the CLI overrides applied.
async fn load_config(args: &Cli) -> Result<PublisherConfig, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => PublisherConfig::load(path).await?,
        None => {
            info!("No config file given; using defaults");
            PublisherConfig::default()
        }
    };

    if let Some(base) = &args.api_base {
        config.api_base_url = base.clone();
    }
    if let Some(style) = args.style {
        config.post_style = style;
    }
    config.validate()?;
    Ok(config)
}

/// Read the JSON article batch from a file, or stdin for `-`.
#[instrument(level = "info", skip_all, fields(input = %input))]
async fn read_articles(input: &str) -> Result<Vec<Article>, Box<dyn Error>> {
    let raw = if input == "-" {
        let mut buf = String::new();
        tokio::io::stdin().read_to_string(&mut buf).await?;
        buf
    } else {
        tokio::fs::read_to_string(input).await?
    };

    let articles: Vec<Article> = serde_json::from_str(&raw).map_err(|e| {
        error!(error = %e, "Article batch is not a JSON array of articles");
        e
    })?;
    Ok(articles)
}

/// Print the outcome and write it to the outcome file, if any.
async fn report(outcome: &PublishOutcome, args: &Cli) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(outcome)?;
    println!("{json}");

    if let Some(path) = &args.outcome_file {
        tokio::fs::write(path, &json).await.map_err(|e| {
            error!(path = %path.display(), error = %e, "Failed writing outcome file");
            e
        })?;
        info!(path = %path.display(), "Wrote outcome file");
    }
    Ok(())
}
