//! Best-candidate selection.
//!
//! Selection happens in three stages:
//!
//! 1. **Filter**: keep articles with a title, some body or description text, and
//!    an absolute image URL. No network access.
//! 2. **Rank**: sort by content length, longest first. The sort is stable, so
//!    ties keep their input order.
//! 3. **Validate**: walk the top `look_ahead` candidates and return the first one
//!    whose image validates. Candidates past the window are never considered.
//!
//! Ranking uses content length only. Recency, source trust and topic relevance
//! are not signals here.

use crate::image::{ValidateImage, parse_image_url};
use crate::models::{Article, SelectedArticle};
use futures::stream::{self, StreamExt};
use std::cmp::Reverse;
use tracing::{debug, info, instrument, warn};

/// Why an article did not make it into the candidate set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligible {
    MissingTitle,
    MissingContent,
    MissingImage,
    MalformedImageUrl,
}

/// Check the completeness requirements for a single article.
pub fn check_candidate(article: &Article) -> Result<(), Ineligible> {
    if article.title.trim().is_empty() {
        return Err(Ineligible::MissingTitle);
    }
    if article.content_text().is_none() {
        return Err(Ineligible::MissingContent);
    }
    let image_url = article
        .image_url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .ok_or(Ineligible::MissingImage)?;
    parse_image_url(image_url).map_err(|_| Ineligible::MalformedImageUrl)?;
    Ok(())
}

/// Filter and rank a batch. Returns candidates best-first.
#[instrument(level = "info", skip_all, fields(batch = articles.len()))]
pub fn rank_candidates(articles: &[Article]) -> Vec<&Article> {
    let mut candidates: Vec<&Article> = articles
        .iter()
        .filter(|article| match check_candidate(article) {
            Ok(()) => true,
            Err(reason) => {
                debug!(title = %article.title, ?reason, "Article excluded from candidates");
                false
            }
        })
        .collect();

    candidates.sort_by_key(|a| Reverse(a.content_len()));
    info!(candidates = candidates.len(), "Ranked candidates");
    candidates
}

/// Pick the best article whose image validates.
///
/// Checks at most `look_ahead` candidates, one at a time. Returns `None` for an
/// empty batch, an all-invalid batch, or when no image in the window validates.
#[instrument(level = "info", skip_all, fields(batch = articles.len(), look_ahead = look_ahead))]
pub async fn select_best<V: ValidateImage>(
    articles: &[Article],
    validator: &V,
    look_ahead: usize,
) -> Option<SelectedArticle> {
    for (rank, article) in rank_candidates(articles).into_iter().take(look_ahead).enumerate() {
        let Some(url) = article.image_url.as_deref() else {
            continue;
        };
        match validator.validate(url).await {
            Ok(image) => {
                info!(rank, title = %article.title, bytes = image.byte_len(), "Selected article");
                return Some(SelectedArticle {
                    article: article.clone(),
                    image,
                });
            }
            Err(reason) => {
                warn!(rank, title = %article.title, %url, %reason, "Candidate image rejected");
            }
        }
    }

    warn!("No candidate in the look-ahead window has a valid image");
    None
}

/// Same contract as [`select_best`], but the whole window is validated
/// concurrently. The winner is still the best-ranked valid candidate.
#[instrument(level = "info", skip_all, fields(batch = articles.len(), look_ahead = look_ahead))]
pub async fn select_best_concurrent<V: ValidateImage>(
    articles: &[Article],
    validator: &V,
    look_ahead: usize,
) -> Option<SelectedArticle> {
    let window: Vec<&Article> = rank_candidates(articles).into_iter().take(look_ahead).collect();
    let concurrency = window.len().max(1);

    // `buffered` keeps the results in rank order.
    let results: Vec<_> = stream::iter(window)
        .map(|article| async move {
            let url = article.image_url.as_deref().unwrap_or_default();
            (article, validator.validate(url).await)
        })
        .buffered(concurrency)
        .collect()
        .await;

    for (rank, (article, result)) in results.into_iter().enumerate() {
        match result {
            Ok(image) => {
                info!(rank, title = %article.title, bytes = image.byte_len(), "Selected article");
                return Some(SelectedArticle {
                    article: article.clone(),
                    image,
                });
            }
            Err(reason) => {
                warn!(rank, title = %article.title, %reason, "Candidate image rejected");
            }
        }
    }

    warn!("No candidate in the look-ahead window has a valid image");
    None
}
