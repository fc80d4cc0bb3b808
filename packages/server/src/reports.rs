//! Citizen fire report submission.
//!
//! A report is rejected when another report within
//! [`NEARBY_TOLERANCE_DEGREES`](fire_map_database::user_reports::NEARBY_TOLERANCE_DEGREES)
//! on both axes was submitted inside the trailing window. Like detection
//! dedup, the check and the insert are separate statements.

use chrono::{DateTime, TimeDelta, Utc};
use fire_map_database::{DbError, user_reports};
use fire_map_database_models::{NewUserReport, UserReportRow};
use switchy_database::Database;

/// Default duplicate window.
pub const DEFAULT_REPORT_WINDOW_HOURS: i64 = 2;

/// Why a report was not stored.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The report breaks a field invariant.
    #[error("Invalid fire report: {message}")]
    Invalid {
        /// First violated invariant.
        message: String,
    },

    /// A nearby report was submitted recently.
    #[error("A fire has already been reported at this location recently")]
    Duplicate {
        /// Id of the earlier report.
        existing_id: String,
    },

    /// Store error.
    #[error(transparent)]
    Database(#[from] DbError),
}

/// Validates and stores a report unless a nearby one exists within
/// `window` before `now`.
///
/// # Errors
///
/// * [`SubmitError::Invalid`] if a field is out of range
/// * [`SubmitError::Duplicate`] if a nearby report is too recent
/// * [`SubmitError::Database`] if the store fails
pub async fn submit(
    db: &dyn Database,
    report: &NewUserReport,
    window: TimeDelta,
    now: DateTime<Utc>,
) -> Result<UserReportRow, SubmitError> {
    report
        .validate()
        .map_err(|message| SubmitError::Invalid { message })?;

    if let Some(existing) =
        user_reports::find_recent_nearby(db, report.latitude, report.longitude, now - window)
            .await?
    {
        log::info!(
            "Rejecting report at ({}, {}): duplicate of {}",
            report.latitude,
            report.longitude,
            existing.id
        );
        return Err(SubmitError::Duplicate {
            existing_id: existing.id,
        });
    }

    let stored = user_reports::insert(db, report, now).await?;
    log::info!(
        "Stored {} fire report {} at ({}, {})",
        stored.intensity,
        stored.id,
        stored.latitude,
        stored.longitude
    );
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use fire_map_fire_models::Intensity;

    use super::*;
    use crate::test_utils::temp_db;

    fn report(lat: f64, lng: f64) -> NewUserReport {
        NewUserReport {
            latitude: lat,
            longitude: lng,
            intensity: Intensity::High,
            smoke_visibility: true,
            estimated_area: 1.5,
            description: Some("Paddy stubble".to_string()),
            reporter_name: Some("Gurpreet".to_string()),
            reporter_contact: None,
            photos: vec!["photo-1.jpg".to_string()],
        }
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 15, hour, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn rejects_nearby_report_inside_window_only() {
        let (db, path) = temp_db("submit").await;
        let db = db.as_ref();
        let window = TimeDelta::hours(DEFAULT_REPORT_WINDOW_HOURS);

        let first = submit(db, &report(30.9, 75.8), window, at(10, 0))
            .await
            .unwrap();
        assert!(!first.verified);

        let err = submit(db, &report(30.9005, 75.8005), window, at(11, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Duplicate { ref existing_id } if *existing_id == first.id));

        // Far enough away.
        submit(db, &report(30.91, 75.8), window, at(11, 0))
            .await
            .unwrap();

        // Same spot after the window has passed.
        submit(db, &report(30.9, 75.8), window, at(12, 30))
            .await
            .unwrap();

        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn rejects_invalid_reports_before_touching_the_store() {
        let (db, path) = temp_db("invalid").await;
        let db = db.as_ref();
        let window = TimeDelta::hours(DEFAULT_REPORT_WINDOW_HOURS);

        let mut bad = report(95.0, 75.8);
        assert!(matches!(
            submit(db, &bad, window, at(10, 0)).await,
            Err(SubmitError::Invalid { .. })
        ));

        bad = report(30.9, 75.8);
        bad.estimated_area = 0.0;
        assert!(matches!(
            submit(db, &bad, window, at(10, 0)).await,
            Err(SubmitError::Invalid { .. })
        ));

        std::fs::remove_file(path).ok();
    }
}
