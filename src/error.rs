//! Error types for the publish pipeline.
//!
//! - [`ImageRejection`]: why a candidate image failed validation
//! - [`PlatformError`]: failures talking to the social platform
//! - [`ConfigError`]: configuration loading and validation failures
//!
//! Platform errors are classified with [`classify`] into a closed
//! [`FailureClass`]; only [`FailureClass::Transient`] failures are retried.

use thiserror::Error;

/// Reason an image was rejected by the validator.
///
/// These are results, not faults: callers branch on them and move on to the
/// next candidate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageRejection {
    #[error("invalid URL format")]
    InvalidUrl,

    /// URL matched a known-bad pattern (placeholders, vector formats, ...).
    #[error("image URL matches rejected pattern `{pattern}`")]
    BlockedPattern { pattern: &'static str },

    #[error("image request returned HTTP {status}")]
    HttpStatus { status: u16 },

    /// Timeout or transport failure during the transfer.
    #[error("image transfer failed: {0}")]
    Transfer(String),

    #[error("image exceeds {limit} byte limit")]
    TooLarge { limit: usize },

    #[error("empty image")]
    Empty,

    /// At or below the size floor; tracking pixels and broken placeholders.
    #[error("image too small: {len} bytes (must exceed {floor})")]
    TooSmall { len: usize, floor: usize },

    #[error("not a valid image file")]
    NotAnImage,
}

impl ImageRejection {
    /// True for the rejections caused by the payload size.
    pub fn is_size_related(&self) -> bool {
        matches!(
            self,
            ImageRejection::Empty | ImageRejection::TooSmall { .. } | ImageRejection::TooLarge { .. }
        )
    }
}

/// Retry classification for platform failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Timeouts, resets, name resolution, generic transport failures.
    Transient,
    /// Auth, payload validation, quota. Retrying will not help.
    Permanent,
    /// Anything else. Treated as non-retryable.
    Unknown,
}

impl FailureClass {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureClass::Transient)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::Transient => "transient",
            FailureClass::Permanent => "permanent",
            FailureClass::Unknown => "unknown",
        }
    }
}

/// Failure talking to the social platform.
#[derive(Debug, Clone, Error)]
pub enum PlatformError {
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connection refused/reset or name resolution failure.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Generic transport-level failure while sending the request.
    #[error("request failed: {0}")]
    Request(String),

    /// The platform answered with a non-success status.
    #[error("platform returned HTTP {status}")]
    Api {
        status: u16,
        /// The platform's structured error body (or the raw text, wrapped).
        payload: serde_json::Value,
    },

    /// The response body did not have the expected shape.
    #[error("unexpected platform response: {0}")]
    Decode(String),

    #[error("{0}")]
    Other(String),
}

impl PlatformError {
    /// The platform's error payload, when there is one.
    pub fn diagnostic(&self) -> Option<serde_json::Value> {
        match self {
            PlatformError::Api { status, payload } => Some(serde_json::json!({
                "status": status,
                "body": payload,
            })),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest reports DNS failures as connect errors.
        if e.is_timeout() {
            PlatformError::Timeout(e.to_string())
        } else if e.is_connect() {
            PlatformError::Connection(e.to_string())
        } else if e.is_decode() {
            PlatformError::Decode(e.to_string())
        } else if e.is_request() || e.is_body() {
            PlatformError::Request(e.to_string())
        } else {
            PlatformError::Other(e.to_string())
        }
    }
}

/// Classify a platform failure for the retry policy.
pub fn classify(err: &PlatformError) -> FailureClass {
    match err {
        PlatformError::Timeout(_) | PlatformError::Connection(_) | PlatformError::Request(_) => {
            FailureClass::Transient
        }
        PlatformError::Api { status, .. } => match status {
            408 => FailureClass::Transient,
            400 | 401 | 403 | 404 | 413 | 415 | 422 | 429 => FailureClass::Permanent,
            _ => FailureClass::Unknown,
        },
        PlatformError::Decode(_) | PlatformError::Other(_) => FailureClass::Unknown,
    }
}

/// Configuration loading or validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config value `{key}`: {message}")]
    Invalid { key: &'static str, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> PlatformError {
        PlatformError::Api {
            status,
            payload: serde_json::json!({"title": "error"}),
        }
    }

    #[test]
    fn test_transport_failures_are_transient() {
        assert_eq!(classify(&PlatformError::Timeout("t".into())), FailureClass::Transient);
        assert_eq!(classify(&PlatformError::Connection("dns".into())), FailureClass::Transient);
        assert_eq!(classify(&PlatformError::Request("reset".into())), FailureClass::Transient);
    }

    #[test]
    fn test_auth_payload_and_quota_are_permanent() {
        for status in [400, 401, 403, 413, 422, 429] {
            assert_eq!(classify(&api(status)), FailureClass::Permanent, "status {status}");
        }
    }

    #[test]
    fn test_unknown_is_not_retryable() {
        assert_eq!(classify(&api(500)), FailureClass::Unknown);
        assert_eq!(classify(&PlatformError::Decode("bad json".into())), FailureClass::Unknown);
        assert!(!FailureClass::Unknown.is_retryable());
        assert!(!FailureClass::Permanent.is_retryable());
        assert!(FailureClass::Transient.is_retryable());
    }

    #[test]
    fn test_diagnostic_only_for_api_errors() {
        let diag = api(401).diagnostic().unwrap();
        assert_eq!(diag["status"], 401);
        assert_eq!(diag["body"]["title"], "error");
        assert!(PlatformError::Timeout("t".into()).diagnostic().is_none());
    }

    #[test]
    fn test_rejection_messages() {
        assert_eq!(ImageRejection::InvalidUrl.to_string(), "invalid URL format");
        assert_eq!(ImageRejection::Empty.to_string(), "empty image");
        assert_eq!(ImageRejection::NotAnImage.to_string(), "not a valid image file");
        assert!(ImageRejection::TooSmall { len: 10, floor: 1000 }.is_size_related());
        assert!(!ImageRejection::NotAnImage.is_size_related());
    }
}
