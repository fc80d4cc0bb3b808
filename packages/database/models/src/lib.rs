#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Database row types and query parameter definitions.
//!
//! These types represent the shapes of data as stored in and retrieved from
//! the `SQLite` store. Field names serialize in `snake_case` because the
//! export and query endpoints return rows as-is.

use chrono::{DateTime, NaiveDate, Utc};
use fire_map_fire_models::{DayNight, FireSource, Intensity};
use fire_map_geography_models::BoundingBox;
use serde::{Deserialize, Serialize};

/// A stored satellite fire detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireDetectionRow {
    /// UUID primary key.
    pub id: String,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Confidence, 0-100.
    pub confidence: f64,
    /// Brightness temperature (K, 4 µm).
    pub brightness: f64,
    /// Along-scan pixel size.
    pub scan: f64,
    /// Along-track pixel size.
    pub track: f64,
    /// `YYYY-MM-DD`.
    pub acq_date: String,
    /// `HHMM`.
    pub acq_time: String,
    /// Satellite as reported.
    pub satellite: String,
    /// Instrument as reported.
    pub instrument: String,
    /// Product collection version.
    pub version: String,
    /// Brightness temperature (K, 11 µm).
    pub bright_t31: f64,
    /// Fire radiative power (MW).
    pub frp: f64,
    /// Day or night overpass.
    pub daynight: DayNight,
    /// Product-specific detection type.
    #[serde(rename = "type")]
    pub detection_type: i32,
    /// Normalized source tag.
    pub source: FireSource,
    /// When first stored.
    pub created_at: DateTime<Utc>,
    /// When last updated by a higher-confidence sighting.
    pub updated_at: DateTime<Utc>,
}

/// A citizen fire report as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserReportRow {
    /// UUID primary key.
    pub id: String,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Observed intensity.
    pub intensity: Intensity,
    /// Whether smoke was visible.
    pub smoke_visibility: bool,
    /// Estimated burning area in hectares.
    pub estimated_area: f64,
    /// Free-text description.
    pub description: Option<String>,
    /// Reporter's name.
    pub reporter_name: Option<String>,
    /// Reporter's contact details.
    pub reporter_contact: Option<String>,
    /// Photo references, in submission order.
    pub photos: Vec<String>,
    /// Whether an operator has verified the report.
    pub verified: bool,
    /// When the report was submitted.
    pub created_at: DateTime<Utc>,
}

/// A citizen fire report as submitted, before it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUserReport {
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Observed intensity.
    pub intensity: Intensity,
    /// Whether smoke was visible.
    pub smoke_visibility: bool,
    /// Estimated burning area in hectares.
    pub estimated_area: f64,
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Reporter's name.
    #[serde(default)]
    pub reporter_name: Option<String>,
    /// Reporter's contact details.
    #[serde(default)]
    pub reporter_contact: Option<String>,
    /// Photo references.
    #[serde(default)]
    pub photos: Vec<String>,
}

impl NewUserReport {
    /// Checks the field invariants a stored report must satisfy.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated invariant.
    pub fn validate(&self) -> Result<(), String> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(format!("latitude {} is out of range", self.latitude));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(format!("longitude {} is out of range", self.longitude));
        }
        if !self.estimated_area.is_finite() || self.estimated_area <= 0.0 {
            return Err("estimated_area must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// First day.
    pub start: NaiveDate,
    /// Last day.
    pub end: NaiveDate,
}

/// Row ordering for detection queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionOrder {
    /// Most recently stored first.
    #[default]
    CreatedDesc,
    /// Most recently acquired first (`acq_date`, then `acq_time`).
    AcquiredDesc,
}

/// Parameters for querying fire detections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionQuery {
    /// Acquisition date range.
    pub date_range: Option<DateRange>,
    /// Inclusive rectangle filter.
    pub bounds: Option<BoundingBox>,
    /// Source tags to include; `None` means all, an empty set matches
    /// nothing.
    pub sources: Option<Vec<FireSource>>,
    /// Inclusive lower bound on confidence.
    pub min_confidence: f64,
    /// Result ordering.
    pub order: DetectionOrder,
    /// Maximum number of rows; `None` is unbounded.
    pub limit: Option<u32>,
}

/// Parameters for querying user reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserReportQuery {
    /// Submission date range, whole UTC days.
    pub date_range: Option<DateRange>,
    /// Inclusive rectangle filter.
    pub bounds: Option<BoundingBox>,
    /// Maximum number of rows; `None` is unbounded.
    pub limit: Option<u32>,
}

/// Aggregate detection counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FireStats {
    /// All matching detections.
    pub total: i64,
    /// Detections acquired today (UTC).
    pub today: i64,
    /// Detections acquired in the last 7 days.
    pub last_week: i64,
    /// Detections with confidence of at least 80.
    pub high_confidence: i64,
    /// Region name, or `all`.
    pub region: String,
}

/// Number of stored detections per source tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCount {
    /// Source tag.
    pub source: FireSource,
    /// Stored detections.
    pub count: i64,
}

/// A stored grid-cell risk prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    /// UUID primary key.
    pub id: String,
    /// Region the prediction was generated for.
    pub region: String,
    /// Cell latitude (south-west corner).
    pub grid_lat: f64,
    /// Cell longitude (south-west corner).
    pub grid_lng: f64,
    /// Probability of fire, 0-1.
    pub probability: f64,
    /// Model confidence in the probability, 0-1.
    pub confidence: f64,
    /// Date the prediction is for, `YYYY-MM-DD`.
    pub prediction_date: String,
    /// Days ahead the prediction covers.
    pub prediction_horizon: i32,
    /// Model identifier.
    pub model_version: String,
    /// JSON-encoded model inputs for the cell.
    pub features: String,
    /// When generated.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> NewUserReport {
        serde_json::from_str(
            r#"{"latitude":30.9,"longitude":75.85,"intensity":"HIGH",
                "smoke_visibility":true,"estimated_area":2.5}"#,
        )
        .unwrap()
    }

    #[test]
    fn new_report_defaults_optional_fields() {
        let report = report();
        assert_eq!(report.intensity, Intensity::High);
        assert!(report.photos.is_empty());
        assert!(report.description.is_none());
        assert!(report.validate().is_ok());
    }

    #[test]
    fn new_report_rejects_bad_fields() {
        let mut bad = report();
        bad.latitude = 95.0;
        assert!(bad.validate().is_err());

        let mut bad = report();
        bad.estimated_area = 0.0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn stats_serialize_camel_case() {
        let stats = FireStats {
            total: 3,
            today: 1,
            last_week: 2,
            high_confidence: 1,
            region: "punjab".to_string(),
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["lastWeek"], 2);
        assert_eq!(json["highConfidence"], 1);
    }
}
