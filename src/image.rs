//! Candidate image acquisition and validation.
//!
//! [`ImageValidator::validate`] runs these checks in order, stopping at the first failure:
//!
//! 1. URL must parse as an absolute `http(s)` URL
//! 2. URL must not match a known-bad pattern (placeholders, tracking pixels, SVG)
//! 3. Optional `HEAD` probe; only an advertised oversize body is fatal
//! 4. Full `GET` with a hard byte ceiling and a timeout
//! 5. Payload must be non-empty
//! 6. Payload must be larger than the size floor
//! 7. Byte signature must be JPEG, PNG, GIF or WebP
//!
//! The declared `Content-Type` is advisory. Origins mislabel images often
//! enough that only the sniffed signature decides the format.

use crate::config::ImageConfig;
use crate::error::ImageRejection;
use crate::models::{ImageFormat, ValidatedImage};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Substrings that mark an image URL as not worth fetching.
///
/// A cheap pre-filter, not a security boundary.
pub const BLOCKED_URL_PATTERNS: &[&str] = &[
    "placeholder",
    "dummy",
    "default-image",
    "default_image",
    "no-image",
    "no_image",
    "noimage",
    "test-image",
    "testimage",
    "blank.gif",
    "spacer.gif",
    "pixel.gif",
    "transparent.gif",
    "1x1",
    ".svg",
];

/// Something that can turn an image URL into a [`ValidatedImage`].
///
/// The selector is generic over this so it can be driven without network access.
pub trait ValidateImage {
    async fn validate(&self, url: &str) -> Result<ValidatedImage, ImageRejection>;
}

/// HTTP-backed image validator.
#[derive(Debug, Clone)]
pub struct ImageValidator {
    client: reqwest::Client,
    config: ImageConfig,
}

impl ImageValidator {
    pub fn new(config: ImageConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    /// Lightweight existence/size check. Returns the advertised length when
    /// the origin answered; any failure is logged and ignored.
    #[instrument(level = "debug", skip(self))]
    async fn probe(&self, url: &Url) -> Option<u64> {
        let response = match self
            .client
            .head(url.clone())
            .timeout(self.config.probe_timeout())
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(%url, error = %e, "Image probe failed; attempting full fetch anyway");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(%url, status = response.status().as_u16(), "Image probe rejected; attempting full fetch anyway");
            return None;
        }

        let declared = declared_type(response.headers());
        let length = advertised_length(response.headers());
        debug!(%url, ?declared, ?length, "Image probe succeeded");
        length
    }

    /// Download the image, enforcing the byte ceiling while streaming.
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &Url) -> Result<(Vec<u8>, Option<String>), ImageRejection> {
        let max = self.config.max_bytes;
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ImageRejection::Transfer(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageRejection::HttpStatus {
                status: status.as_u16(),
            });
        }

        let declared = declared_type(response.headers());
        if let Some(len) = advertised_length(response.headers()) {
            if len > max as u64 {
                return Err(ImageRejection::TooLarge { limit: max });
            }
        }

        let mut data = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ImageRejection::Transfer(e.to_string()))?
        {
            if data.len() + chunk.len() > max {
                return Err(ImageRejection::TooLarge { limit: max });
            }
            data.extend_from_slice(&chunk);
        }

        Ok((data, declared))
    }
}

impl ValidateImage for ImageValidator {
    #[instrument(level = "info", skip(self))]
    async fn validate(&self, url: &str) -> Result<ValidatedImage, ImageRejection> {
        let t0 = Instant::now();
        let parsed = parse_image_url(url)?;
        check_blocked(url)?;

        if self.config.probe_metadata {
            if let Some(len) = self.probe(&parsed).await {
                if len > self.config.max_bytes as u64 {
                    return Err(ImageRejection::TooLarge {
                        limit: self.config.max_bytes,
                    });
                }
            }
        }

        let (data, declared) = self.fetch(&parsed).await?;
        let image = check_bytes(url, data, declared, &self.config)?;
        info!(
            bytes = image.byte_len(),
            format = image.mime_type(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Image validated"
        );
        Ok(image)
    }
}

/// Parse `url` as an absolute `http`/`https` URL with a host.
pub fn parse_image_url(url: &str) -> Result<Url, ImageRejection> {
    let parsed = Url::parse(url.trim()).map_err(|_| ImageRejection::InvalidUrl)?;
    match parsed.scheme() {
        "http" | "https" if parsed.has_host() => Ok(parsed),
        _ => Err(ImageRejection::InvalidUrl),
    }
}

/// Reject URLs containing one of [`BLOCKED_URL_PATTERNS`].
pub fn check_blocked(url: &str) -> Result<(), ImageRejection> {
    let lower = url.to_lowercase();
    match BLOCKED_URL_PATTERNS.iter().find(|p| lower.contains(*p)) {
        Some(pattern) => Err(ImageRejection::BlockedPattern { pattern: *pattern }),
        None => Ok(()),
    }
}

/// Identify the image format from its leading bytes.
pub fn sniff_format(data: &[u8]) -> Option<ImageFormat> {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(ImageFormat::Jpeg)
    } else if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some(ImageFormat::Png)
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some(ImageFormat::Gif)
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some(ImageFormat::Webp)
    } else {
        None
    }
}

/// Validate a downloaded payload: emptiness, size bounds, then signature.
///
/// The size floor is checked before sniffing so that every undersized payload
/// reports a size reason, whatever its contents.
pub fn check_bytes(
    source_url: &str,
    data: Vec<u8>,
    declared_type: Option<String>,
    config: &ImageConfig,
) -> Result<ValidatedImage, ImageRejection> {
    if data.is_empty() {
        return Err(ImageRejection::Empty);
    }
    if data.len() > config.max_bytes {
        return Err(ImageRejection::TooLarge {
            limit: config.max_bytes,
        });
    }
    if data.len() <= config.min_bytes {
        return Err(ImageRejection::TooSmall {
            len: data.len(),
            floor: config.min_bytes,
        });
    }

    let format = sniff_format(&data).ok_or(ImageRejection::NotAnImage)?;
    if let Some(declared) = declared_type.as_deref() {
        if !declared.eq_ignore_ascii_case(format.mime_type()) {
            debug!(
                url = source_url,
                declared,
                sniffed = format.mime_type(),
                "Declared content type disagrees with signature; trusting signature"
            );
        }
    }

    Ok(ValidatedImage {
        source_url: source_url.to_string(),
        data,
        format,
        declared_type,
    })
}

fn declared_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_lowercase())
        .filter(|v| !v.is_empty())
}

fn advertised_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
