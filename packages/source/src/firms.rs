//! NASA FIRMS area API client.
//!
//! One GET per (product, area, window):
//! `{base}/api/area/csv/{KEY}/{PRODUCT}/{west,south,east,north}/{days}[/{date}]`.
//! HTTP 404 means "no data" and yields an empty body. Requests are not
//! retried; the caller decides what a failed product means for its sync.

use std::time::Duration;

use async_trait::async_trait;
use fire_map_fire_models::FeedProduct;
use fire_map_geography_models::BoundingBox;
use fire_map_source_models::{FeedWindow, FireCandidate};

use crate::{FireFeed, SourceError, parse};

/// Default FIRMS host.
pub const DEFAULT_BASE_URL: &str = "https://firms.modaps.eosdis.nasa.gov";

/// Value shipped in example env files; treated the same as no key.
pub const PLACEHOLDER_API_KEY: &str = "your_nasa_firms_api_key_here";

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("fire-map/", env!("CARGO_PKG_VERSION"));

/// Maximum length of the response body preview included in logs.
const BODY_PREVIEW_LEN: usize = 100;

/// Connection settings for the FIRMS API.
#[derive(Debug, Clone)]
pub struct FirmsConfig {
    /// Map key issued by FIRMS. `None` disables fetching.
    pub api_key: Option<String>,
    /// Scheme and host, without a trailing slash.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for FirmsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: REQUEST_TIMEOUT,
        }
    }
}

impl FirmsConfig {
    /// Reads `NASA_FIRMS_API_KEY` and `NASA_FIRMS_BASE_URL`.
    #[must_use]
    pub fn from_env() -> Self {
        let api_key = std::env::var("NASA_FIRMS_API_KEY").ok();
        let base_url = std::env::var("NASA_FIRMS_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Self {
            api_key,
            base_url,
            ..Self::default()
        }
    }

    /// Returns the usable API key.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Configuration`] if the key is missing, blank
    /// or still the placeholder value.
    pub fn api_key(&self) -> Result<&str, SourceError> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() && key != PLACEHOLDER_API_KEY => Ok(key),
            _ => Err(SourceError::Configuration {
                message: "NASA_FIRMS_API_KEY is not configured".to_string(),
            }),
        }
    }

    /// Whether a usable API key is present.
    #[must_use]
    pub fn has_api_key(&self) -> bool {
        self.api_key().is_ok()
    }
}

/// HTTP client for the FIRMS area API.
#[derive(Debug, Clone)]
pub struct FirmsClient {
    config: FirmsConfig,
    http: reqwest::Client,
}

impl FirmsClient {
    /// Builds a client.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Configuration`] if no usable API key is set,
    /// or [`SourceError::Http`] if the HTTP client cannot be constructed.
    pub fn new(config: FirmsConfig) -> Result<Self, SourceError> {
        config.api_key()?;

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()?;

        Ok(Self { config, http })
    }

    /// Builds the area CSV URL for a request.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Configuration`] if no usable API key is set.
    pub fn area_url(
        &self,
        product: FeedProduct,
        area: &BoundingBox,
        window: FeedWindow,
    ) -> Result<String, SourceError> {
        Ok(format!(
            "{}/api/area/csv/{}/{}/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.api_key()?,
            product.as_ref(),
            area.area_string(),
            window.path_segment(),
        ))
    }

    /// Fetches the raw CSV text. A 404 yields an empty string.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Upstream`] for any other non-success status
    /// and [`SourceError::Http`] if the request itself fails.
    pub async fn fetch_raw(
        &self,
        product: FeedProduct,
        area: &BoundingBox,
        window: FeedWindow,
    ) -> Result<String, SourceError> {
        let url = self.area_url(product, area, window)?;
        log::debug!(
            "[{product}] GET area={} window={}",
            area.area_string(),
            window.path_segment()
        );

        let response = self.http.get(&url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            log::info!("[{product}] no data for the requested area/window");
            return Ok(String::new());
        }

        if !status.is_success() {
            return Err(SourceError::Upstream {
                product,
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        log::debug!("[{product}] HTTP {status}, {} bytes", text.len());
        if text.len() < BODY_PREVIEW_LEN {
            log::debug!("[{product}] body: {}", text.trim());
        }

        Ok(text)
    }
}

#[async_trait]
impl FireFeed for FirmsClient {
    async fn fetch_candidates(
        &self,
        product: FeedProduct,
        area: &BoundingBox,
        window: FeedWindow,
    ) -> Result<Vec<FireCandidate>, SourceError> {
        let raw = self.fetch_raw(product, area, window).await?;
        Ok(parse::parse_feed(&raw, product))
    }
}
