#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Satellite fire feed client.
//!
//! The [`FireFeed`] trait is the seam between ingestion and the upstream
//! feed: given a product, an area and a day window it yields parsed
//! [`FireCandidate`]s. [`firms::FirmsClient`] is the NASA FIRMS
//! implementation; tests substitute their own.

pub mod firms;
pub mod parse;

use async_trait::async_trait;
use fire_map_fire_models::FeedProduct;
use fire_map_geography_models::BoundingBox;
use fire_map_source_models::{FeedWindow, FireCandidate};

pub use firms::{FirmsClient, FirmsConfig};

/// Errors that can occur while talking to a satellite feed.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The feed is not usable with the current configuration (e.g. no API
    /// key).
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of what is missing.
        message: String,
    },

    /// The upstream answered with a non-success status.
    #[error("Upstream unavailable: {product} returned HTTP {status}")]
    Upstream {
        /// Product that was requested.
        product: FeedProduct,
        /// HTTP status code.
        status: u16,
    },

    /// The request could not be completed (connect failure, timeout, body
    /// read). The request URL is stripped since it carries the API key.
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.without_url())
    }
}

impl SourceError {
    /// Whether this error means the feed can never succeed until the
    /// configuration changes.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

/// A source of satellite fire detections.
#[async_trait]
pub trait FireFeed: Send + Sync {
    /// Fetches and parses every detection of `product` inside `area` for
    /// the given day window. An upstream "no data" answer is an empty
    /// list, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the feed is misconfigured or the
    /// upstream request fails.
    async fn fetch_candidates(
        &self,
        product: FeedProduct,
        area: &BoundingBox,
        window: FeedWindow,
    ) -> Result<Vec<FireCandidate>, SourceError>;
}
