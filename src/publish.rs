//! Media publishing with bounded upload retries.
//!
//! Publishing is two phases against the platform:
//!
//! 1. Upload the validated image, obtaining a media handle
//! 2. Create the post referencing that handle
//!
//! # Retry Strategy
//!
//! - Only phase 1 is retried, up to `max_attempts` in total
//! - Fixed delay between attempts
//! - Only [`FailureClass::Transient`] failures are retried; permanent and
//!   unknown failures return immediately with the platform payload attached
//!
//! Phase 2 runs once. If it fails the uploaded media is abandoned; the platform
//! does not materialize anything until a post references it.

use crate::api::{MediaHandle, SocialPlatform};
use crate::config::RetryConfig;
use crate::error::{FailureClass, PlatformError, classify};
use crate::models::{FailureReason, PublishOutcome, ValidatedImage};
use crate::utils::char_len;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Public URL of a post given its id.
pub fn post_url(post_id: &str) -> String {
    format!("https://x.com/i/web/status/{post_id}")
}

/// Upload retry bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: config.delay(),
        }
    }
}

/// Result of [`upload_with_retry`] together with how many attempts it took.
#[derive(Debug)]
pub struct UploadReport {
    pub result: Result<MediaHandle, PlatformError>,
    pub attempts: u32,
}

/// Upload `image`, retrying transient failures according to `policy`.
///
/// A timed-out attempt counts as failed; the next attempt starts fresh.
#[instrument(level = "info", skip_all, fields(max_attempts = policy.max_attempts))]
pub async fn upload_with_retry<P: SocialPlatform>(
    platform: &P,
    image: &ValidatedImage,
    policy: &RetryPolicy,
) -> UploadReport {
    let total_t0 = Instant::now();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let attempt_t0 = Instant::now();
        let err = match platform.upload_media(image).await {
            Ok(handle) => {
                return UploadReport {
                    result: Ok(handle),
                    attempts: attempt,
                };
            }
            Err(e) => e,
        };

        let class = classify(&err);
        let elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64;
        let elapsed_ms_total = total_t0.elapsed().as_millis() as u64;

        if !class.is_retryable() {
            error!(
                attempt,
                class = class.as_str(),
                elapsed_ms_total,
                error = %err,
                "upload failed with non-retryable error"
            );
            return UploadReport {
                result: Err(err),
                attempts: attempt,
            };
        }

        if attempt >= policy.max_attempts {
            error!(
                attempt,
                max = policy.max_attempts,
                elapsed_ms_attempt,
                elapsed_ms_total,
                error = %err,
                "upload exhausted retries"
            );
            return UploadReport {
                result: Err(err),
                attempts: attempt,
            };
        }

        warn!(
            attempt,
            max = policy.max_attempts,
            elapsed_ms_attempt,
            elapsed_ms_total,
            delay = ?policy.delay,
            error = %err,
            "upload attempt failed; retrying"
        );
        sleep(policy.delay).await;
    }
}

fn failure(reason: FailureReason, err: &PlatformError, attempts: u32) -> PublishOutcome {
    let class: FailureClass = classify(err);
    PublishOutcome::Failed {
        reason,
        message: err.to_string(),
        diagnostic: Some(serde_json::json!({
            "class": class.as_str(),
            "attempts": attempts,
            "response": err.diagnostic(),
        })),
    }
}

/// Uploads media and creates the post.
#[derive(Debug)]
pub struct MediaPublisher<P> {
    platform: P,
    retry: RetryPolicy,
    /// Wait between upload and post creation so the platform finishes
    /// processing the media before it is referenced.
    settle: Duration,
    budget: usize,
}

impl<P: SocialPlatform> MediaPublisher<P> {
    pub fn new(platform: P, retry: RetryPolicy, settle: Duration, budget: usize) -> Self {
        Self {
            platform,
            retry,
            settle,
            budget,
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Publish `text` with `image` attached.
    ///
    /// Never returns an error; every failure is reported in the outcome.
    #[instrument(level = "info", skip_all, fields(chars = char_len(text), bytes = image.byte_len()))]
    pub async fn publish(&self, text: &str, image: &ValidatedImage) -> PublishOutcome {
        let len = char_len(text);
        if len > self.budget {
            error!(len, budget = self.budget, "Refusing to send over-budget text");
            return PublishOutcome::failed(
                FailureReason::TextOverBudget,
                format!("text is {len} characters, budget is {}", self.budget),
            );
        }

        let report = upload_with_retry(&self.platform, image, &self.retry).await;
        let handle = match report.result {
            Ok(handle) => handle,
            Err(e) => return failure(FailureReason::MediaUpload, &e, report.attempts),
        };

        if !self.settle.is_zero() {
            info!(settle = ?self.settle, media_id = %handle.media_id, "Waiting for media processing");
            sleep(self.settle).await;
        }

        match self.platform.create_post(text, &handle).await {
            Ok(post) => {
                let url = post_url(&post.id);
                info!(post_id = %post.id, %url, attempts = report.attempts, "Published");
                PublishOutcome::Published {
                    post_id: post.id,
                    post_url: url,
                    title: String::new(),
                    upload_attempts: report.attempts,
                }
            }
            Err(e) => {
                error!(media_id = %handle.media_id, error = %e, "Post creation failed; media abandoned");
                failure(FailureReason::PostCreation, &e, report.attempts)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::api::{AccountIdentity, CreatedPost};
    use crate::models::ImageFormat;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Platform double with scripted upload results.
    #[derive(Default)]
    pub(crate) struct FakePlatform {
        uploads: Mutex<VecDeque<Result<MediaHandle, PlatformError>>>,
        post_result: Mutex<Option<PlatformError>>,
        pub(crate) upload_calls: AtomicU32,
        pub(crate) post_calls: AtomicU32,
        pub(crate) posted_text: Mutex<Option<String>>,
    }

    impl FakePlatform {
        pub(crate) fn with_uploads(results: Vec<Result<MediaHandle, PlatformError>>) -> Self {
            Self {
                uploads: Mutex::new(results.into()),
                ..Self::default()
            }
        }

        pub(crate) fn failing_post(self, err: PlatformError) -> Self {
            *self.post_result.lock().unwrap() = Some(err);
            self
        }

        pub(crate) fn uploads(&self) -> u32 {
            self.upload_calls.load(Ordering::SeqCst)
        }

        pub(crate) fn posts(&self) -> u32 {
            self.post_calls.load(Ordering::SeqCst)
        }
    }

    impl SocialPlatform for FakePlatform {
        async fn upload_media(&self, _image: &ValidatedImage) -> Result<MediaHandle, PlatformError> {
            self.upload_calls.fetch_add(1, Ordering::SeqCst);
            self.uploads
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(PlatformError::Other("no scripted upload".into())))
        }

        async fn create_post(&self, text: &str, media: &MediaHandle) -> Result<CreatedPost, PlatformError> {
            self.post_calls.fetch_add(1, Ordering::SeqCst);
            *self.posted_text.lock().unwrap() = Some(text.to_string());
            match self.post_result.lock().unwrap().clone() {
                Some(err) => Err(err),
                None => Ok(CreatedPost {
                    id: format!("post-for-{}", media.media_id),
                    text: text.to_string(),
                }),
            }
        }

        async fn current_account(&self) -> Result<AccountIdentity, PlatformError> {
            Ok(AccountIdentity {
                id: "1".into(),
                username: "fake".into(),
                name: "Fake".into(),
            })
        }
    }

    pub(crate) fn ok_upload() -> Result<MediaHandle, PlatformError> {
        Ok(MediaHandle {
            media_id: "m1".to_string(),
        })
    }

    fn timeout(n: u32) -> Result<MediaHandle, PlatformError> {
        Err(PlatformError::Timeout(format!("attempt {n}")))
    }

    fn image() -> ValidatedImage {
        let mut data = vec![0u8; 2048];
        data[..3].copy_from_slice(&[0xFF, 0xD8, 0xFF]);
        ValidatedImage {
            source_url: "https://cdn.example.com/a.jpg".to_string(),
            data,
            format: ImageFormat::Jpeg,
            declared_type: Some("image/jpeg".to_string()),
        }
    }

    pub(crate) fn instant_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::ZERO,
        }
    }

    fn publisher(platform: FakePlatform) -> MediaPublisher<FakePlatform> {
        MediaPublisher::new(platform, instant_policy(), Duration::ZERO, 280)
    }

    #[tokio::test]
    async fn test_two_transient_failures_then_success() {
        let publisher = publisher(FakePlatform::with_uploads(vec![timeout(1), timeout(2), ok_upload()]));

        let outcome = publisher.publish("hello", &image()).await;
        assert_eq!(
            outcome,
            PublishOutcome::Published {
                post_id: "post-for-m1".to_string(),
                post_url: "https://x.com/i/web/status/post-for-m1".to_string(),
                title: String::new(),
                upload_attempts: 3,
            }
        );
        assert_eq!(publisher.platform().uploads(), 3);
        assert_eq!(publisher.platform().posts(), 1);
    }

    #[tokio::test]
    async fn test_three_transient_failures_stop_without_fourth_attempt() {
        let publisher = publisher(FakePlatform::with_uploads(vec![
            timeout(1),
            timeout(2),
            timeout(3),
            ok_upload(),
        ]));

        let outcome = publisher.publish("hello", &image()).await;
        match outcome {
            PublishOutcome::Failed { reason, message, diagnostic } => {
                assert_eq!(reason, FailureReason::MediaUpload);
                assert_eq!(message, "request timed out: attempt 3");
                let diagnostic = diagnostic.unwrap();
                assert_eq!(diagnostic["attempts"], 3);
                assert_eq!(diagnostic["class"], "transient");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(publisher.platform().uploads(), 3);
        assert_eq!(publisher.platform().posts(), 0);
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let auth = Err(PlatformError::Api {
            status: 401,
            payload: serde_json::json!({"title": "Unauthorized"}),
        });
        let publisher = publisher(FakePlatform::with_uploads(vec![auth, ok_upload()]));

        let outcome = publisher.publish("hello", &image()).await;
        match outcome {
            PublishOutcome::Failed { reason, diagnostic, .. } => {
                assert_eq!(reason, FailureReason::MediaUpload);
                let diagnostic = diagnostic.unwrap();
                assert_eq!(diagnostic["class"], "permanent");
                assert_eq!(diagnostic["response"]["status"], 401);
                assert_eq!(diagnostic["response"]["body"]["title"], "Unauthorized");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(publisher.platform().uploads(), 1);
    }

    #[tokio::test]
    async fn test_unknown_failure_is_not_retried() {
        let server_error = Err(PlatformError::Api {
            status: 500,
            payload: serde_json::Value::Null,
        });
        let platform = FakePlatform::with_uploads(vec![server_error, ok_upload()]);

        let report = upload_with_retry(&platform, &image(), &instant_policy()).await;
        assert!(report.result.is_err());
        assert_eq!(report.attempts, 1);
        assert_eq!(platform.uploads(), 1);
    }

    #[tokio::test]
    async fn test_post_creation_failure_after_upload() {
        let platform = FakePlatform::with_uploads(vec![ok_upload()]).failing_post(PlatformError::Api {
            status: 403,
            payload: serde_json::json!({"detail": "duplicate content"}),
        });
        let publisher = publisher(platform);

        let outcome = publisher.publish("hello", &image()).await;
        assert!(matches!(
            outcome,
            PublishOutcome::Failed {
                reason: FailureReason::PostCreation,
                ..
            }
        ));
        assert_eq!(publisher.platform().uploads(), 1);
        assert_eq!(publisher.platform().posts(), 1);
    }

    #[tokio::test]
    async fn test_over_budget_text_is_never_sent() {
        let publisher = publisher(FakePlatform::with_uploads(vec![ok_upload()]));

        let outcome = publisher.publish(&"x".repeat(281), &image()).await;
        assert!(matches!(
            outcome,
            PublishOutcome::Failed {
                reason: FailureReason::TextOverBudget,
                ..
            }
        ));
        assert_eq!(publisher.platform().uploads(), 0);
    }

    #[tokio::test]
    async fn test_settle_delay_between_phases() {
        let publisher = MediaPublisher::new(
            FakePlatform::with_uploads(vec![ok_upload()]),
            instant_policy(),
            Duration::from_millis(20),
            280,
        );

        let t0 = Instant::now();
        assert!(publisher.publish("hello", &image()).await.is_success());
        assert!(t0.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::from(&RetryConfig {
            max_attempts: 0,
            delay_ms: 150,
        });
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.delay, Duration::from_millis(150));
    }
}
