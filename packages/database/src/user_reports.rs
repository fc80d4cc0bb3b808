//! Citizen fire report queries.

use chrono::{DateTime, Utc};
use fire_map_database_models::{NewUserReport, UserReportQuery, UserReportRow};
use fire_map_fire_models::Intensity;
use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue};

use crate::{DbError, Filter, format_timestamp, parse_timestamp};

/// Maximum coordinate difference (degrees, per axis) for two reports to
/// be considered the same fire (~100 m).
pub const NEARBY_TOLERANCE_DEGREES: f64 = 0.001;

const COLUMNS: &str = "id, latitude, longitude, intensity, smoke_visibility, estimated_area,
    description, reporter_name, reporter_contact, photos, verified, created_at";

/// Finds a report within [`NEARBY_TOLERANCE_DEGREES`] of the point that
/// was submitted at or after `since`.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn find_recent_nearby(
    db: &dyn Database,
    latitude: f64,
    longitude: f64,
    since: DateTime<Utc>,
) -> Result<Option<UserReportRow>, DbError> {
    let rows = db
        .query_raw_params(
            &format!(
                "SELECT {COLUMNS} FROM user_reported_fires
                 WHERE latitude BETWEEN $1 AND $2
                   AND longitude BETWEEN $3 AND $4
                   AND created_at >= $5
                 LIMIT 1"
            ),
            &[
                DatabaseValue::Real64(latitude - NEARBY_TOLERANCE_DEGREES),
                DatabaseValue::Real64(latitude + NEARBY_TOLERANCE_DEGREES),
                DatabaseValue::Real64(longitude - NEARBY_TOLERANCE_DEGREES),
                DatabaseValue::Real64(longitude + NEARBY_TOLERANCE_DEGREES),
                DatabaseValue::String(format_timestamp(since)),
            ],
        )
        .await?;

    rows.first().map(report_from_row).transpose()
}

/// Stores a report, unverified, and returns the stored row.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn insert(
    db: &dyn Database,
    report: &NewUserReport,
    now: DateTime<Utc>,
) -> Result<UserReportRow, DbError> {
    let id = uuid::Uuid::new_v4().to_string();
    let photos = serde_json::to_string(&report.photos)?;

    db.exec_raw_params(
        "INSERT INTO user_reported_fires (
            id, latitude, longitude, intensity, smoke_visibility, estimated_area,
            description, reporter_name, reporter_contact, photos, verified, created_at
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        &[
            DatabaseValue::String(id.clone()),
            DatabaseValue::Real64(report.latitude),
            DatabaseValue::Real64(report.longitude),
            DatabaseValue::String(report.intensity.to_string()),
            DatabaseValue::Int64(i64::from(report.smoke_visibility)),
            DatabaseValue::Real64(report.estimated_area),
            opt_string(report.description.as_deref()),
            opt_string(report.reporter_name.as_deref()),
            opt_string(report.reporter_contact.as_deref()),
            DatabaseValue::String(photos),
            DatabaseValue::Int64(0),
            DatabaseValue::String(format_timestamp(now)),
        ],
    )
    .await?;

    Ok(UserReportRow {
        id,
        latitude: report.latitude,
        longitude: report.longitude,
        intensity: report.intensity,
        smoke_visibility: report.smoke_visibility,
        estimated_area: report.estimated_area,
        description: report.description.clone(),
        reporter_name: report.reporter_name.clone(),
        reporter_contact: report.reporter_contact.clone(),
        photos: report.photos.clone(),
        verified: false,
        created_at: parse_timestamp(&format_timestamp(now)),
    })
}

/// Queries reports, newest first.
///
/// A date range covers whole UTC days: from `start` 00:00:00.000 through
/// `end` 23:59:59.999.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn query(
    db: &dyn Database,
    query: &UserReportQuery,
) -> Result<Vec<UserReportRow>, DbError> {
    let mut filter = Filter::default();

    if let Some(range) = &query.date_range {
        let start = filter.bind(DatabaseValue::String(format!(
            "{}T00:00:00.000Z",
            range.start.format("%Y-%m-%d")
        )));
        let end = filter.bind(DatabaseValue::String(format!(
            "{}T23:59:59.999Z",
            range.end.format("%Y-%m-%d")
        )));
        filter.and(format!("created_at >= {start} AND created_at <= {end}"));
    }

    if let Some(bounds) = &query.bounds {
        filter.within(bounds);
    }

    let mut sql = format!(
        "SELECT {COLUMNS} FROM user_reported_fires{} ORDER BY created_at DESC",
        filter.where_sql()
    );

    if let Some(limit) = query.limit {
        let p = filter.bind(DatabaseValue::Int64(i64::from(limit)));
        sql.push_str(&format!(" LIMIT {p}"));
    }

    let rows = db.query_raw_params(&sql, filter.params()).await?;

    rows.iter().map(report_from_row).collect()
}

fn opt_string(value: Option<&str>) -> DatabaseValue {
    value.map_or(DatabaseValue::Null, |v| DatabaseValue::String(v.to_string()))
}

fn report_from_row(row: &switchy_database::Row) -> Result<UserReportRow, DbError> {
    let intensity: String = row.to_value("intensity").unwrap_or_default();
    let photos: String = row.to_value("photos").unwrap_or_default();
    let created_at: String = row.to_value("created_at").unwrap_or_default();
    let smoke: i64 = row.to_value("smoke_visibility").unwrap_or(0);
    let verified: i64 = row.to_value("verified").unwrap_or(0);

    Ok(UserReportRow {
        id: row.to_value("id").unwrap_or_default(),
        latitude: row.to_value("latitude").unwrap_or(0.0),
        longitude: row.to_value("longitude").unwrap_or(0.0),
        intensity: intensity.parse().map_err(|_| DbError::Conversion {
            message: format!("Unknown intensity '{intensity}'"),
        })?,
        smoke_visibility: smoke != 0,
        estimated_area: row.to_value("estimated_area").unwrap_or(0.0),
        description: row.to_value("description").unwrap_or(None),
        reporter_name: row.to_value("reporter_name").unwrap_or(None),
        reporter_contact: row.to_value("reporter_contact").unwrap_or(None),
        photos: if photos.is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&photos)?
        },
        verified: verified != 0,
        created_at: parse_timestamp(&created_at),
    })
}
