#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Filtered reads over the fire store and file exports.
//!
//! [`filter::FilterParams`] turns loose query-string values into a
//! [`filter::ResolvedFilter`]. [`collect`] runs it against both tables and
//! [`render`] writes the result as CSV, JSON or `GeoJSON`.

pub mod filter;
pub mod render;

use fire_map_database::{DbError, detections, user_reports};
use fire_map_database_models::{DetectionOrder, FireDetectionRow, UserReportRow};
use switchy_database::Database;

pub use filter::{FilterParams, ResolvedFilter};
pub use render::ExportFormat;

/// Maximum number of rows returned by a live map query.
pub const LIVE_QUERY_LIMIT: u32 = 1000;

/// Errors that can occur while exporting.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// CSV writer error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error flushing the CSV writer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The CSV output was not valid UTF-8.
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// JSON encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Store error.
    #[error(transparent)]
    Database(#[from] DbError),
}

/// Everything matched by one export request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportData {
    /// Satellite detections, newest acquisition first.
    pub detections: Vec<FireDetectionRow>,
    /// User reports, newest first.
    pub user_reports: Vec<UserReportRow>,
}

impl ExportData {
    /// Number of records of both kinds.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.detections.len() + self.user_reports.len()
    }
}

/// Loads every detection and user report matching `filter` for export.
///
/// # Errors
///
/// Returns [`ExportError::Database`] if either query fails.
pub async fn collect(db: &dyn Database, filter: &ResolvedFilter) -> Result<ExportData, ExportError> {
    let detections =
        detections::query(db, &filter.detection_query(DetectionOrder::AcquiredDesc, None)).await?;
    let user_reports = user_reports::query(db, &filter.user_report_query(None)).await?;

    log::debug!(
        "Export matched {} detection(s) and {} user report(s)",
        detections.len(),
        user_reports.len()
    );

    Ok(ExportData {
        detections,
        user_reports,
    })
}

/// Loads the newest detections matching `filter` for the live map, capped
/// at [`LIVE_QUERY_LIMIT`].
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn live_detections(
    db: &dyn Database,
    filter: &ResolvedFilter,
) -> Result<Vec<FireDetectionRow>, DbError> {
    detections::query(
        db,
        &filter.detection_query(DetectionOrder::CreatedDesc, Some(LIVE_QUERY_LIMIT)),
    )
    .await
}

/// Loads every user report matching `filter` for the live map, newest
/// first. Unlike detections, reports are not capped.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn live_user_reports(
    db: &dyn Database,
    filter: &ResolvedFilter,
) -> Result<Vec<UserReportRow>, DbError> {
    user_reports::query(db, &filter.user_report_query(None)).await
}

#[cfg(test)]
pub(crate) mod test_utils {
    use std::path::PathBuf;

    use chrono::{DateTime, TimeZone as _, Utc};
    use fire_map_database::{db, detections};
    use fire_map_fire_models::{DayNight, FireSource};
    use fire_map_source_models::FireCandidate;
    use switchy_database::Database;

    pub async fn temp_db(name: &str) -> (Box<dyn Database>, PathBuf) {
        let path = std::env::temp_dir().join(format!(
            "fire_map_export_{name}_{}.db",
            uuid::Uuid::new_v4().simple()
        ));
        let db = db::open(&path).await.unwrap();
        (db, path)
    }

    pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, day, hour, 0, 0).unwrap()
    }

    pub fn candidate(
        lat: f64,
        lng: f64,
        confidence: f64,
        source: FireSource,
        acq_date: &str,
    ) -> FireCandidate {
        FireCandidate {
            latitude: lat,
            longitude: lng,
            brightness: 330.5,
            scan: 1.0,
            track: 1.0,
            acq_date: acq_date.to_string(),
            acq_time: "0530".to_string(),
            satellite: "Terra".to_string(),
            instrument: source.to_string(),
            confidence,
            version: "6.1NRT".to_string(),
            bright_t31: 295.0,
            frp: 12.5,
            daynight: DayNight::Day,
            detection_type: 0,
            source,
        }
    }

    pub async fn store(db: &dyn Database, candidate: &FireCandidate) {
        detections::insert(db, candidate, at(15, 8)).await.unwrap();
    }
}

#[cfg(test)]
mod tests {
    use fire_map_database::{detections, user_reports};
    use fire_map_database_models::NewUserReport;
    use fire_map_fire_models::{FireSource, Intensity};
    use fire_map_geography::RegionTable;

    use super::*;
    use crate::test_utils::{at, candidate, store, temp_db};

    fn report(lat: f64, lng: f64) -> NewUserReport {
        NewUserReport {
            latitude: lat,
            longitude: lng,
            intensity: Intensity::Medium,
            smoke_visibility: true,
            estimated_area: 2.5,
            description: None,
            reporter_name: None,
            reporter_contact: None,
            photos: vec![],
        }
    }

    #[tokio::test]
    async fn punjab_modis_confidence_filter_selects_one_detection() {
        let (db, path) = temp_db("scenario").await;
        let db = db.as_ref();

        // Inside Punjab, MODIS, confident.
        store(db, &candidate(30.9, 75.8, 85.0, FireSource::Modis, "2024-10-15")).await;
        // Inside Punjab but VIIRS.
        store(db, &candidate(31.2, 75.1, 90.0, FireSource::Viirs, "2024-10-15")).await;
        // Inside Punjab but below the floor.
        store(db, &candidate(30.1, 74.9, 50.0, FireSource::Modis, "2024-10-15")).await;
        // Haryana only.
        store(db, &candidate(28.5, 77.2, 95.0, FireSource::Modis, "2024-10-15")).await;

        let filter = FilterParams {
            region: Some("punjab".to_string()),
            sources: Some("MODIS".to_string()),
            confidence: Some("80".to_string()),
            ..FilterParams::default()
        }
        .resolve(&RegionTable::embedded());

        let data = collect(db, &filter).await.unwrap();
        assert_eq!(data.detections.len(), 1);
        assert!((data.detections[0].latitude - 30.9).abs() < f64::EPSILON);

        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn export_orders_by_acquisition_and_filters_reports_by_area() {
        let (db, path) = temp_db("collect").await;
        let db = db.as_ref();

        store(db, &candidate(30.9, 75.8, 85.0, FireSource::Modis, "2024-10-13")).await;
        store(db, &candidate(30.8, 75.7, 85.0, FireSource::Modis, "2024-10-15")).await;
        user_reports::insert(db, &report(30.7, 75.6), at(15, 9)).await.unwrap();
        user_reports::insert(db, &report(28.0, 77.0), at(15, 10)).await.unwrap();

        let filter = FilterParams {
            region: Some("punjab".to_string()),
            ..FilterParams::default()
        }
        .resolve(&RegionTable::embedded());

        let data = collect(db, &filter).await.unwrap();
        assert_eq!(data.detections[0].acq_date, "2024-10-15");
        assert_eq!(data.detections[1].acq_date, "2024-10-13");
        assert_eq!(data.user_reports.len(), 1);
        assert_eq!(data.total_count(), 3);

        let everything = collect(db, &ResolvedFilter::default()).await.unwrap();
        assert_eq!(everything.total_count(), 4);

        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn live_query_keeps_confident_punjab_modis_newest_first() {
        let (db, path) = temp_db("live").await;
        let db = db.as_ref();

        for (hour, confidence) in [(6, 60.0), (7, 85.0), (8, 90.0)] {
            let lng = 75.0 + f64::from(hour) / 10.0;
            let fire = candidate(30.9, lng, confidence, FireSource::Modis, "2024-10-15");
            detections::insert(db, &fire, at(15, hour)).await.unwrap();
        }

        let filter = FilterParams {
            region: Some("punjab".to_string()),
            sources: Some("MODIS".to_string()),
            confidence: Some("80".to_string()),
            ..FilterParams::default()
        }
        .resolve(&RegionTable::embedded());

        let rows = live_detections(db, &filter).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!((rows[0].confidence - 90.0).abs() < f64::EPSILON);
        assert!((rows[1].confidence - 85.0).abs() < f64::EPSILON);
        assert!(rows[0].created_at > rows[1].created_at);

        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn unknown_source_tags_match_no_detections() {
        let (db, path) = temp_db("goes").await;
        let db = db.as_ref();

        store(db, &candidate(30.9, 75.8, 85.0, FireSource::Modis, "2024-10-15")).await;
        store(db, &candidate(31.2, 75.1, 90.0, FireSource::Viirs, "2024-10-15")).await;

        let filter = FilterParams {
            sources: Some("GOES".to_string()),
            ..FilterParams::default()
        }
        .resolve(&RegionTable::embedded());

        assert!(live_detections(db, &filter).await.unwrap().is_empty());
        assert!(collect(db, &filter).await.unwrap().detections.is_empty());

        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn live_user_reports_are_not_capped() {
        let (db, path) = temp_db("uncapped").await;
        let db = db.as_ref();

        let extra = LIVE_QUERY_LIMIT + 5;
        for i in 0..extra {
            let offset = f64::from(i) * 0.001;
            user_reports::insert(db, &report(29.0 + offset, 75.0), at(15, 9))
                .await
                .unwrap();
        }

        let rows = live_user_reports(db, &ResolvedFilter::default()).await.unwrap();
        assert_eq!(rows.len(), usize::try_from(extra).unwrap());

        std::fs::remove_file(path).ok();
    }
}
