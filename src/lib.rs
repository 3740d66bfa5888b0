//! # Awful News Poster
//!
//! Picks the single best article from a batch of fresh news, makes sure it has
//! a real, reachable image, composes a post that fits the platform's character
//! budget and publishes it with the image attached.
//!
//! ## Architecture
//!
//! 1. **Selection** ([`selector`]): filter ineligible articles, rank by content
//!    length, validate images in the look-ahead window ([`image`])
//! 2. **Composition** ([`compose`]): title, snippet and tail under the budget
//! 3. **Publishing** ([`publish`]): media upload with bounded retries, then
//!    post creation through a [`api::SocialPlatform`]
//!
//! [`pipeline::Pipeline`] ties the three together and always yields one
//! [`models::PublishOutcome`].

pub mod api;
pub mod compose;
pub mod config;
pub mod error;
pub mod image;
pub mod links;
pub mod models;
pub mod pipeline;
pub mod publish;
pub mod selector;
pub mod utils;

pub use config::PublisherConfig;
pub use models::{Article, PublishOutcome};
pub use pipeline::Pipeline;
