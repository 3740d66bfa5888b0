//! Command-line interface definitions for Awful News Poster.
//!
//! Credentials and the API base can also come from the environment.

use awful_news_poster::config::PostStyle;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the Awful News Poster application.
///
/// # Examples
///
/// ```sh
/// # Publish the best article from a batch
/// awful_news_poster -i ./batch.json
///
/// # Preview the composed post without publishing
/// cat batch.json | awful_news_poster -i - --dry-run --style hashtags
///
/// # Check that the credentials work
/// awful_news_poster --self-check
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// JSON array of articles to choose from (`-` reads stdin)
    #[arg(short, long, default_value = "-")]
    pub input: String,

    /// Optional path to config.yaml file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// OAuth 2.0 user-context bearer token for the X API
    #[arg(long, env = "X_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Override the API base URL from the config
    #[arg(long, env = "X_API_BASE_URL")]
    pub api_base: Option<String>,

    /// Override the post style from the config
    #[arg(long, value_enum)]
    pub style: Option<PostStyle>,

    /// Select and compose, print the post, but do not publish
    #[arg(long)]
    pub dry_run: bool,

    /// Verify the credentials against the platform and exit
    #[arg(long, conflicts_with = "dry_run")]
    pub self_check: bool,

    /// Also write the outcome JSON to this file
    #[arg(short, long)]
    pub outcome_file: Option<PathBuf>,
}
