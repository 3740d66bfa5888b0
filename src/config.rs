//! Runtime configuration.
//!
//! Everything has a default, so a YAML file only needs the keys it changes:
//!
//! ```yaml
//! char_budget: 280
//! look_ahead: 5
//! post_style: hashtags
//! image:
//!   max_bytes: 5242880
//!   probe_metadata: false
//! retry:
//!   max_attempts: 3
//!   delay_ms: 2000
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

/// Default character budget for a post.
pub const DEFAULT_CHAR_BUDGET: usize = 280;
/// Images must be strictly larger than this.
pub const DEFAULT_MIN_IMAGE_BYTES: usize = 1000;
/// Images may be at most this large.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// How the post tail is built. A run uses exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PostStyle {
    /// End the post with the destination link.
    #[default]
    Link,
    /// End the post with inferred hashtags.
    Hashtags,
}

/// Image fetch limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Exclusive lower bound on image size.
    pub min_bytes: usize,
    /// Inclusive upper bound on image size.
    pub max_bytes: usize,
    pub timeout_secs: u64,
    /// Send a HEAD request before the full transfer.
    pub probe_metadata: bool,
    pub probe_timeout_secs: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            min_bytes: DEFAULT_MIN_IMAGE_BYTES,
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
            timeout_secs: 15,
            probe_metadata: true,
            probe_timeout_secs: 5,
        }
    }
}

impl ImageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

/// Media upload retry policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total upload attempts, including the first.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 2000,
        }
    }
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    pub char_budget: usize,
    /// How many ranked candidates may have their image checked.
    pub look_ahead: usize,
    /// Validate the whole look-ahead window concurrently.
    pub parallel_image_checks: bool,
    pub post_style: PostStyle,
    pub image: ImageConfig,
    pub retry: RetryConfig,
    /// Pause between media upload and post creation.
    pub media_settle_ms: u64,
    pub request_timeout_secs: u64,
    pub api_base_url: String,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            char_budget: DEFAULT_CHAR_BUDGET,
            look_ahead: 5,
            parallel_image_checks: false,
            post_style: PostStyle::Link,
            image: ImageConfig::default(),
            retry: RetryConfig::default(),
            media_settle_ms: 3000,
            request_timeout_secs: 30,
            api_base_url: "https://api.x.com".to_string(),
        }
    }
}

impl PublisherConfig {
    /// Load and validate a YAML config file.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let config = Self::from_yaml(&raw)?;
        info!(?config, "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let config: PublisherConfig = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.char_budget == 0 {
            return Err(invalid("char_budget", "must be greater than zero"));
        }
        if self.look_ahead == 0 {
            return Err(invalid("look_ahead", "must be greater than zero"));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "must be at least 1"));
        }
        if self.image.min_bytes >= self.image.max_bytes {
            return Err(invalid(
                "image.min_bytes",
                format!(
                    "{} must be below image.max_bytes ({})",
                    self.image.min_bytes, self.image.max_bytes
                ),
            ));
        }
        if url::Url::parse(&self.api_base_url).is_err() {
            return Err(invalid("api_base_url", format!("`{}` is not a URL", self.api_base_url)));
        }
        Ok(())
    }

    pub fn media_settle(&self) -> Duration {
        Duration::from_millis(self.media_settle_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn invalid(key: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        message: message.into(),
    }
}
