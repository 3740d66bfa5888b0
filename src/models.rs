//! Data models for candidate articles and the artifacts derived from them.
//!
//! This module defines the core data structures used throughout the pipeline:
//! - [`Article`]: A normalized article handed over by upstream ingestion
//! - [`ValidatedImage`]: An image buffer confirmed by byte-signature sniffing
//! - [`SelectedArticle`]: The winning candidate together with its validated image
//! - [`ComposedPost`]: Budget-conforming post text ready for publication
//! - [`PublishOutcome`]: The single structured result of a run
//!
//! Articles are read-only inside the pipeline. The validated image is never
//! stashed back onto the article; it travels alongside it in a [`SelectedArticle`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A normalized article as produced by the ingestion stage.
///
/// Upstream sources name their fields differently (`image`, `urlToImage`,
/// `thumbnail`, ...). Mapping them onto this shape is the ingestion stage's job;
/// the serde aliases only cover the spellings seen in saved batches.
///
/// # Fields
///
/// * `title` - The headline; uniqueness key within a run
/// * `body` - Full (possibly rewritten) article text
/// * `description` - Short summary used when `body` is absent
/// * `image_url` - Candidate image reference
/// * `link` - Destination link for the post
/// * `category` - Upstream category tag (e.g. `"technology"`)
/// * `published_at` - Publication timestamp, defaults to "now" when absent
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Article {
    /// The article headline.
    pub title: String,
    /// The article text, if the source provided one.
    #[serde(default, alias = "content")]
    pub body: Option<String>,
    /// A short description or summary of the article.
    #[serde(default)]
    pub description: Option<String>,
    /// URL of the article's lead image.
    #[serde(default, alias = "image", alias = "urlToImage")]
    pub image_url: Option<String>,
    /// The link readers are sent to.
    #[serde(default, alias = "url")]
    pub link: String,
    /// The category the source filed the article under.
    #[serde(default)]
    pub category: Option<String>,
    /// When the article was published.
    #[serde(default = "Utc::now", alias = "publishedAt")]
    pub published_at: DateTime<Utc>,
}

impl Article {
    /// Build an article with only a title and link; everything else empty.
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: None,
            description: None,
            image_url: None,
            link: link.into(),
            category: None,
            published_at: Utc::now(),
        }
    }

    /// The text used for ranking and snippets: the body when it has content,
    /// otherwise the description.
    pub fn content_text(&self) -> Option<&str> {
        non_blank(self.body.as_deref()).or_else(|| non_blank(self.description.as_deref()))
    }

    /// Character count of [`Article::content_text`], zero when absent.
    pub fn content_len(&self) -> usize {
        self.content_text().map_or(0, |t| t.chars().count())
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|t| !t.trim().is_empty())
}

/// The four image formats the platform accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageFormat {
    /// MIME type sent with the media upload.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Webp => "image/webp",
        }
    }

    /// File extension used for the multipart file name.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            ImageFormat::Webp => "webp",
        }
    }
}

/// An image whose bytes have been fetched and authenticated.
///
/// The format is always the sniffed one; whatever the origin declared is kept
/// in `declared_type` for diagnostics only.
#[derive(Clone, PartialEq)]
pub struct ValidatedImage {
    /// The URL the image was fetched from.
    pub source_url: String,
    /// The raw image bytes.
    pub data: Vec<u8>,
    /// Format detected from the byte signature.
    pub format: ImageFormat,
    /// `Content-Type` the origin sent, if any.
    pub declared_type: Option<String>,
}

impl ValidatedImage {
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

impl std::fmt::Debug for ValidatedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatedImage")
            .field("source_url", &self.source_url)
            .field("byte_len", &self.data.len())
            .field("format", &self.format)
            .field("declared_type", &self.declared_type)
            .finish()
    }
}

/// The candidate chosen by the selector, with the image that qualified it.
///
/// Written once by the selector and read-only afterwards; the image is reused
/// for the upload so it is never fetched twice.
#[derive(Debug, Clone)]
pub struct SelectedArticle {
    pub article: Article,
    pub image: ValidatedImage,
}

/// Which degradation step produced the final text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionLevel {
    /// Title, snippet and tail.
    Full,
    /// Title and tail only.
    TitleAndTail,
    /// Title cut down with an ellipsis, tail intact.
    TruncatedTitle,
    /// Last-resort hard cut of the whole string.
    HardTruncated,
}

/// Post text that fits the character budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposedPost {
    pub text: String,
    pub level: CompositionLevel,
}

impl ComposedPost {
    /// Length in characters, as the platform counts it.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Why a run did not publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// No candidate in the look-ahead window had a valid image.
    NoCandidate,
    /// The text failed the final length check before transmission.
    TextOverBudget,
    /// Uploading the image failed.
    MediaUpload,
    /// The upload succeeded but creating the post failed.
    PostCreation,
}

/// The single structured result of a run, consumed by the external caller
/// for its bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PublishOutcome {
    Published {
        post_id: String,
        post_url: String,
        title: String,
        upload_attempts: u32,
    },
    DryRun {
        title: String,
        text: String,
    },
    Failed {
        reason: FailureReason,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        diagnostic: Option<serde_json::Value>,
    },
}

impl PublishOutcome {
    pub fn failed(reason: FailureReason, message: impl Into<String>) -> Self {
        PublishOutcome::Failed {
            reason,
            message: message.into(),
            diagnostic: None,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, PublishOutcome::Failed { .. })
    }

    /// Attach the title of the article this outcome is about.
    pub fn with_title(self, article_title: &str) -> Self {
        match self {
            PublishOutcome::Published {
                post_id,
                post_url,
                upload_attempts,
                ..
            } => PublishOutcome::Published {
                post_id,
                post_url,
                title: article_title.to_string(),
                upload_attempts,
            },
            other => other,
        }
    }
}
