//! Destination link canonicalization.
//!
//! Shortening services live outside this crate. The pipeline only needs
//! something that maps an article to the link readers should follow, falling
//! back to the original link when anything goes wrong.

use crate::models::Article;

/// Produces the public link placed in a post.
pub trait PublicLink {
    async fn public_link(&self, article: &Article) -> String;
}

/// Uses the article's own link unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughLink;

impl PublicLink for PassThroughLink {
    async fn public_link(&self, article: &Article) -> String {
        article.link.trim().to_string()
    }
}
