#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the fire map server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the database row types to allow independent evolution of the API
//! contract. Prediction payloads keep the `snake_case` keys the map
//! frontend already reads; sync payloads are `camelCase`.

use chrono::{DateTime, NaiveDate, Utc};
use fire_map_database_models::PredictionRow;
use fire_map_fire_models::RiskTier;
use fire_map_ingest_models::MergeCounts;
use serde::{Deserialize, Serialize};

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable description.
    pub error: String,
}

impl ApiError {
    /// Wraps a message.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHealth {
    /// `healthy` or `unhealthy`.
    pub status: String,
    /// When the check ran.
    pub timestamp: DateTime<Utc>,
    /// `connected` or `disconnected`.
    pub database: String,
    /// Service version.
    pub version: String,
    /// Present when unhealthy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `format` parameter of the export endpoint. The remaining export
/// parameters are the shared fire filters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportFormatParams {
    /// `csv`, `json` or `geojson`.
    pub format: Option<String>,
}

/// Query parameters for `GET /api/sync`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncStatsParams {
    /// Region id; omitted means all regions.
    pub region: Option<String>,
}

/// Inclusive date range of a historical sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalRange {
    /// First day (`YYYY-MM-DD`).
    pub start_date: Option<String>,
    /// Last day (`YYYY-MM-DD`).
    pub end_date: Option<String>,
}

/// Body of `POST /api/sync`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    /// Region id, `both` or `all`. Defaults to `both`.
    #[serde(default)]
    pub region: Option<String>,
    /// Day to sync; defaults to today (UTC).
    #[serde(default)]
    pub date: Option<String>,
    /// When both ends are present, a backfill runs instead of a single day.
    #[serde(default)]
    pub historical: Option<HistoricalRange>,
}

/// Response of `POST /api/sync`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSyncResponse {
    /// Whether the run completed (individual fetches may still have
    /// failed).
    pub success: bool,
    /// Summary sentence.
    pub message: String,
    /// Merge counters over the whole run.
    pub totals: MergeCounts,
    /// Products whose fetch failed, as `region/PRODUCT`. Backfill entries
    /// are prefixed with the day (`YYYY-MM-DD region/PRODUCT`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_products: Vec<String>,
    /// Backfill days on which every fetch failed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_days: Vec<NaiveDate>,
}

/// Query parameters for `GET /api/predictions`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictionQueryParams {
    /// Region id.
    pub region: Option<String>,
    /// Prediction date (`YYYY-MM-DD`); defaults to today (UTC).
    pub date: Option<String>,
    /// Horizon in days; defaults to 7.
    pub horizon: Option<i64>,
}

/// Body of `POST /api/predictions`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionRequest {
    /// Region id.
    #[serde(default)]
    pub region: Option<String>,
    /// Prediction date; defaults to today (UTC).
    #[serde(default)]
    pub date: Option<String>,
    /// Horizon in days; defaults to 7.
    #[serde(default)]
    pub horizon: Option<i64>,
}

/// A grid prediction as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiPrediction {
    /// Prediction id.
    pub id: String,
    /// Region id.
    pub region: String,
    /// Cell centre latitude.
    pub grid_lat: f64,
    /// Cell centre longitude.
    pub grid_lng: f64,
    /// Probability of fire within the horizon.
    pub probability: f64,
    /// Model confidence.
    pub confidence: f64,
    /// Tier of `probability`.
    pub risk_level: RiskTier,
    /// Prediction date.
    pub prediction_date: String,
    /// Horizon in days.
    pub prediction_horizon: i32,
    /// Model that produced it.
    pub model_version: String,
    /// Model inputs for this cell.
    pub features: serde_json::Value,
    /// When it was generated.
    pub created_at: DateTime<Utc>,
}

impl From<PredictionRow> for ApiPrediction {
    fn from(row: PredictionRow) -> Self {
        let features = serde_json::from_str(&row.features).unwrap_or(serde_json::Value::Null);
        Self {
            risk_level: RiskTier::from_probability(row.probability),
            id: row.id,
            region: row.region,
            grid_lat: row.grid_lat,
            grid_lng: row.grid_lng,
            probability: row.probability,
            confidence: row.confidence,
            prediction_date: row.prediction_date,
            prediction_horizon: row.prediction_horizon,
            model_version: row.model_version,
            features,
            created_at: row.created_at,
        }
    }
}

/// Summary attached to prediction responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiPredictionMetadata {
    /// Region id.
    pub region: String,
    /// Prediction date.
    pub prediction_date: String,
    /// Horizon in days.
    pub prediction_horizon: u32,
    /// Number of predictions stored.
    pub total_predictions: usize,
    /// Predictions above 0.7 (GET only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_risk_count: Option<usize>,
    /// Predictions above 0.4 and at most 0.7 (GET only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medium_risk_count: Option<usize>,
    /// Predictions at most 0.4 (GET only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_risk_count: Option<usize>,
}

/// Response of `GET /api/predictions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiPredictions {
    /// Every prediction, highest probability first.
    pub predictions: Vec<ApiPrediction>,
    /// Summary with tier counts.
    pub metadata: ApiPredictionMetadata,
}

/// Response of `POST /api/predictions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiGeneratedPredictions {
    /// Always `true`; failures use [`ApiError`].
    pub success: bool,
    /// Summary sentence.
    pub message: String,
    /// The highest-probability predictions.
    pub predictions: Vec<ApiPrediction>,
    /// Summary without tier counts.
    pub metadata: ApiPredictionMetadata,
}
