//! The publish-candidate pipeline: select, compose, publish.
//!
//! One run takes a batch already deduplicated against the content store and
//! produces exactly one [`PublishOutcome`]. Bookkeeping based on that outcome
//! (marking the article as published, etc.) is the caller's job.

use crate::api::SocialPlatform;
use crate::compose::{Composer, PostTail};
use crate::config::{PostStyle, PublisherConfig};
use crate::image::ValidateImage;
use crate::links::PublicLink;
use crate::models::{Article, ComposedPost, FailureReason, PublishOutcome, SelectedArticle};
use crate::publish::{MediaPublisher, RetryPolicy};
use crate::selector::{select_best, select_best_concurrent};
use itertools::Itertools;
use tracing::{info, instrument, warn};

/// A selected article and the text composed for it.
#[derive(Debug, Clone)]
pub struct PreparedPost {
    pub selected: SelectedArticle,
    pub post: ComposedPost,
}

/// Keep the first article for each title, compared trimmed and case-insensitively.
pub fn dedupe_by_title(articles: Vec<Article>) -> Vec<Article> {
    let before = articles.len();
    let unique: Vec<Article> = articles
        .into_iter()
        .unique_by(|a| a.title.trim().to_lowercase())
        .collect();
    if unique.len() < before {
        info!(dropped = before - unique.len(), "Dropped duplicate titles from batch");
    }
    unique
}

/// Wires the validator, composer and publisher together for one run.
#[derive(Debug)]
pub struct Pipeline<V, P, L> {
    validator: V,
    publisher: MediaPublisher<P>,
    links: L,
    composer: Composer,
    style: PostStyle,
    look_ahead: usize,
    parallel_image_checks: bool,
}

impl<V, P, L> Pipeline<V, P, L>
where
    V: ValidateImage,
    P: SocialPlatform,
    L: PublicLink,
{
    pub fn new(config: &PublisherConfig, validator: V, platform: P, links: L) -> Self {
        let publisher = MediaPublisher::new(
            platform,
            RetryPolicy::from(&config.retry),
            config.media_settle(),
            config.char_budget,
        );
        Self {
            validator,
            publisher,
            links,
            composer: Composer::new(config.char_budget),
            style: config.post_style,
            look_ahead: config.look_ahead,
            parallel_image_checks: config.parallel_image_checks,
        }
    }

    pub fn publisher(&self) -> &MediaPublisher<P> {
        &self.publisher
    }

    /// Select the best candidate and compose its post. No platform calls.
    #[instrument(level = "info", skip_all, fields(batch = articles.len()))]
    pub async fn prepare(&self, articles: Vec<Article>) -> Option<PreparedPost> {
        let articles = dedupe_by_title(articles);
        let selected = match self.parallel_image_checks {
            true => select_best_concurrent(&articles, &self.validator, self.look_ahead).await,
            false => select_best(&articles, &self.validator, self.look_ahead).await,
        };
        let selected = selected?;

        let link = self.links.public_link(&selected.article).await;
        let tail = PostTail::for_article(self.style, &selected.article, &link);
        let post = self.composer.compose(&selected.article, &tail);
        info!(
            title = %selected.article.title,
            chars = post.char_len(),
            level = ?post.level,
            "Composed post"
        );
        Some(PreparedPost { selected, post })
    }

    /// Run the whole pipeline and publish.
    #[instrument(level = "info", skip_all)]
    pub async fn run(&self, articles: Vec<Article>) -> PublishOutcome {
        let Some(prepared) = self.prepare(articles).await else {
            warn!("Nothing to publish this run");
            return no_candidate();
        };

        let outcome = self
            .publisher
            .publish(&prepared.post.text, &prepared.selected.image)
            .await;
        outcome.with_title(&prepared.selected.article.title)
    }

    /// Select and compose, but report the text instead of publishing it.
    #[instrument(level = "info", skip_all)]
    pub async fn dry_run(&self, articles: Vec<Article>) -> PublishOutcome {
        match self.prepare(articles).await {
            Some(prepared) => PublishOutcome::DryRun {
                title: prepared.selected.article.title,
                text: prepared.post.text,
            },
            None => no_candidate(),
        }
    }
}

fn no_candidate() -> PublishOutcome {
    PublishOutcome::failed(
        FailureReason::NoCandidate,
        "no candidate in the look-ahead window has a valid image",
    )
}
