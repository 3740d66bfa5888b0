//! Social platform API access.
//!
//! The module uses a trait-based design so the publisher can be driven by
//! anything that speaks the three operations it needs:
//! - [`SocialPlatform`]: upload media, create a post, read the current account
//! - [`XClient`]: HTTP implementation against the X API v2 endpoints
//!
//! All calls authenticate with the same bearer token; the session is reused
//! read-only for every request in a run.

use crate::error::PlatformError;
use crate::models::ValidatedImage;
use crate::utils::truncate_for_log;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// Handle returned by a successful media upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaHandle {
    pub media_id: String,
}

/// A post that the platform has materialized.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedPost {
    pub id: String,
    #[serde(default)]
    pub text: String,
}

/// The account the credentials belong to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountIdentity {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub name: String,
}

/// The operations the pipeline needs from a social platform.
pub trait SocialPlatform {
    /// Upload an image and return a handle to reference in a post.
    async fn upload_media(&self, image: &ValidatedImage) -> Result<MediaHandle, PlatformError>;

    /// Create a post with `text` and the uploaded media.
    async fn create_post(&self, text: &str, media: &MediaHandle) -> Result<CreatedPost, PlatformError>;

    /// Identify the authenticated account. Used as a connectivity check only.
    async fn current_account(&self) -> Result<AccountIdentity, PlatformError>;
}

/// `{"data": ..., "errors": [...]}` wrapper used by v2 responses.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct UploadedMedia {
    #[serde(alias = "media_id_string")]
    id: String,
}

/// Upload responses come in the flat v1.1 shape or the v2 envelope. The flat
/// shape is tried first since every field of the envelope is optional.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UploadResponse {
    Flat(UploadedMedia),
    Envelope(Envelope<UploadedMedia>),
}

/// HTTP client for the X API.
#[derive(Clone)]
pub struct XClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl fmt::Debug for XClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XClient")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl XClient {
    /// Build a client for `base_url` (e.g. `https://api.x.com`) using an
    /// OAuth 2.0 user-context bearer token.
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, PlatformError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send a request and decode the JSON body, turning non-success statuses
    /// into [`PlatformError::Api`] with the platform's payload attached.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, PlatformError> {
        let t0 = Instant::now();
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        let body = response.text().await?;
        let elapsed_ms = t0.elapsed().as_millis() as u64;

        if !status.is_success() {
            warn!(
                status = status.as_u16(),
                elapsed_ms,
                body = %truncate_for_log(&body, 300),
                "Platform rejected request"
            );
            let payload = serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body));
            return Err(PlatformError::Api {
                status: status.as_u16(),
                payload,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            warn!(error = %e, body = %truncate_for_log(&body, 300), "Unexpected platform response");
            PlatformError::Decode(e.to_string())
        })
    }
}

/// Unwrap a v2 envelope, treating a missing `data` as a platform error.
fn unwrap_envelope<T>(envelope: Envelope<T>) -> Result<T, PlatformError> {
    match envelope.data {
        Some(data) => Ok(data),
        None => Err(PlatformError::Api {
            status: 200,
            payload: envelope.errors.unwrap_or(serde_json::Value::Null),
        }),
    }
}

impl SocialPlatform for XClient {
    #[instrument(level = "info", skip_all, fields(bytes = image.byte_len(), mime = image.mime_type()))]
    async fn upload_media(&self, image: &ValidatedImage) -> Result<MediaHandle, PlatformError> {
        let part = Part::bytes(image.data.clone())
            .file_name(format!("image.{}", image.format.extension()))
            .mime_str(image.mime_type())?;
        let form = Form::new()
            .part("media", part)
            .text("media_category", "tweet_image");

        let response: UploadResponse = self
            .send_json(self.client.post(self.endpoint("2/media/upload")).multipart(form))
            .await?;
        let media = match response {
            UploadResponse::Envelope(envelope) => unwrap_envelope(envelope)?,
            UploadResponse::Flat(media) => media,
        };

        info!(media_id = %media.id, "Media uploaded");
        Ok(MediaHandle { media_id: media.id })
    }

    #[instrument(level = "info", skip_all, fields(media_id = %media.media_id))]
    async fn create_post(&self, text: &str, media: &MediaHandle) -> Result<CreatedPost, PlatformError> {
        let body = serde_json::json!({
            "text": text,
            "media": { "media_ids": [media.media_id] },
        });
        let envelope: Envelope<CreatedPost> = self
            .send_json(self.client.post(self.endpoint("2/tweets")).json(&body))
            .await?;
        let post = unwrap_envelope(envelope)?;
        info!(post_id = %post.id, "Post created");
        Ok(post)
    }

    #[instrument(level = "info", skip_all)]
    async fn current_account(&self) -> Result<AccountIdentity, PlatformError> {
        let envelope: Envelope<AccountIdentity> =
            self.send_json(self.client.get(self.endpoint("2/users/me"))).await?;
        unwrap_envelope(envelope)
    }
}
