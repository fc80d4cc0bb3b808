//! Satellite fire detection queries.
//!
//! Deduplication is a read followed by a write with no transaction around
//! it. Two writers merging the same event at the same moment can both miss
//! each other and insert twice; ingestion runs one sync at a time so this
//! is accepted.

use chrono::{DateTime, Days, NaiveDate, Utc};
use fire_map_database_models::{
    DetectionOrder, DetectionQuery, FireDetectionRow, FireStats, SourceCount,
};
use fire_map_fire_models::{DayNight, FireSource};
use fire_map_geography_models::BoundingBox;
use fire_map_source_models::FireCandidate;
use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue};

use crate::{DbError, Filter, format_timestamp, parse_timestamp};

/// Maximum coordinate difference (degrees, per axis) for two sightings
/// to count as the same event (~10 m).
pub const DUPLICATE_TOLERANCE_DEGREES: f64 = 0.0001;

/// Confidence at or above which a detection counts as high confidence.
pub const HIGH_CONFIDENCE: f64 = 80.0;

const COLUMNS: &str = "id, latitude, longitude, confidence, brightness, scan, track,
    acq_date, acq_time, satellite, instrument, version, bright_t31, frp,
    daynight, detection_type, source, created_at, updated_at";

/// Finds a stored detection of the same event: same source, date and
/// time, within [`DUPLICATE_TOLERANCE_DEGREES`] on both axes.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn find_near_duplicate(
    db: &dyn Database,
    candidate: &FireCandidate,
) -> Result<Option<FireDetectionRow>, DbError> {
    let rows = db
        .query_raw_params(
            &format!(
                "SELECT {COLUMNS} FROM fire_detections
                 WHERE source = $1 AND acq_date = $2 AND acq_time = $3
                   AND latitude BETWEEN $4 AND $5
                   AND longitude BETWEEN $6 AND $7
                 LIMIT 1"
            ),
            &[
                DatabaseValue::String(candidate.source.to_string()),
                DatabaseValue::String(candidate.acq_date.clone()),
                DatabaseValue::String(candidate.acq_time.clone()),
                DatabaseValue::Real64(candidate.latitude - DUPLICATE_TOLERANCE_DEGREES),
                DatabaseValue::Real64(candidate.latitude + DUPLICATE_TOLERANCE_DEGREES),
                DatabaseValue::Real64(candidate.longitude - DUPLICATE_TOLERANCE_DEGREES),
                DatabaseValue::Real64(candidate.longitude + DUPLICATE_TOLERANCE_DEGREES),
            ],
        )
        .await?;

    Ok(rows.first().map(detection_from_row))
}

/// Stores a new detection and returns its id.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn insert(
    db: &dyn Database,
    candidate: &FireCandidate,
    now: DateTime<Utc>,
) -> Result<String, DbError> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = format_timestamp(now);

    db.exec_raw_params(
        "INSERT INTO fire_detections (
            id, latitude, longitude, confidence, brightness, scan, track,
            acq_date, acq_time, satellite, instrument, version, bright_t31,
            frp, daynight, detection_type, source, created_at, updated_at
         ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
            $11, $12, $13, $14, $15, $16, $17, $18, $19
         )",
        &[
            DatabaseValue::String(id.clone()),
            DatabaseValue::Real64(candidate.latitude),
            DatabaseValue::Real64(candidate.longitude),
            DatabaseValue::Real64(candidate.confidence),
            DatabaseValue::Real64(candidate.brightness),
            DatabaseValue::Real64(candidate.scan),
            DatabaseValue::Real64(candidate.track),
            DatabaseValue::String(candidate.acq_date.clone()),
            DatabaseValue::String(candidate.acq_time.clone()),
            DatabaseValue::String(candidate.satellite.clone()),
            DatabaseValue::String(candidate.instrument.clone()),
            DatabaseValue::String(candidate.version.clone()),
            DatabaseValue::Real64(candidate.bright_t31),
            DatabaseValue::Real64(candidate.frp),
            DatabaseValue::String(candidate.daynight.to_string()),
            DatabaseValue::Int32(candidate.detection_type),
            DatabaseValue::String(candidate.source.to_string()),
            DatabaseValue::String(now.clone()),
            DatabaseValue::String(now),
        ],
    )
    .await?;

    Ok(id)
}

/// Overwrites the confidence, brightness and FRP of a stored detection
/// with a better sighting and touches `updated_at`. Nothing else changes.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn update_readings(
    db: &dyn Database,
    id: &str,
    candidate: &FireCandidate,
    now: DateTime<Utc>,
) -> Result<u64, DbError> {
    Ok(db
        .exec_raw_params(
            "UPDATE fire_detections
             SET confidence = $1, brightness = $2, frp = $3, updated_at = $4
             WHERE id = $5",
            &[
                DatabaseValue::Real64(candidate.confidence),
                DatabaseValue::Real64(candidate.brightness),
                DatabaseValue::Real64(candidate.frp),
                DatabaseValue::String(format_timestamp(now)),
                DatabaseValue::String(id.to_string()),
            ],
        )
        .await?)
}

/// Looks up a detection by id.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn get(db: &dyn Database, id: &str) -> Result<Option<FireDetectionRow>, DbError> {
    let rows = db
        .query_raw_params(
            &format!("SELECT {COLUMNS} FROM fire_detections WHERE id = $1"),
            &[DatabaseValue::String(id.to_string())],
        )
        .await?;

    Ok(rows.first().map(detection_from_row))
}

/// Queries detections matching every set filter.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn query(
    db: &dyn Database,
    query: &DetectionQuery,
) -> Result<Vec<FireDetectionRow>, DbError> {
    let mut filter = Filter::default();

    if let Some(range) = &query.date_range {
        let start = filter.bind(DatabaseValue::String(range.start.to_string()));
        let end = filter.bind(DatabaseValue::String(range.end.to_string()));
        filter.and(format!("acq_date >= {start} AND acq_date <= {end}"));
    }

    if let Some(bounds) = &query.bounds {
        filter.within(bounds);
    }

    if let Some(sources) = &query.sources {
        if sources.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders: Vec<String> = sources
            .iter()
            .map(|s| filter.bind(DatabaseValue::String(s.to_string())))
            .collect();
        filter.and(format!("source IN ({})", placeholders.join(", ")));
    }

    if query.min_confidence > 0.0 {
        let p = filter.bind(DatabaseValue::Real64(query.min_confidence));
        filter.and(format!("confidence >= {p}"));
    }

    let order = match query.order {
        DetectionOrder::CreatedDesc => "created_at DESC",
        DetectionOrder::AcquiredDesc => "acq_date DESC, acq_time DESC",
    };

    let mut sql = format!(
        "SELECT {COLUMNS} FROM fire_detections{} ORDER BY {order}",
        filter.where_sql()
    );

    if let Some(limit) = query.limit {
        let p = filter.bind(DatabaseValue::Int64(i64::from(limit)));
        sql.push_str(&format!(" LIMIT {p}"));
    }

    let rows = db.query_raw_params(&sql, filter.params()).await?;

    Ok(rows.iter().map(detection_from_row).collect())
}

/// Computes the four aggregate counts, each with its own query.
///
/// `today` is the current UTC date; the last-week window starts seven days
/// before it.
///
/// # Errors
///
/// Returns [`DbError`] if any of the queries fails.
pub async fn stats(
    db: &dyn Database,
    bounds: Option<&BoundingBox>,
    region: &str,
    today: NaiveDate,
) -> Result<FireStats, DbError> {
    let week_ago = today
        .checked_sub_days(Days::new(7))
        .unwrap_or(NaiveDate::MIN);

    let total = count_where(db, bounds, None).await?;
    let today_count = count_where(
        db,
        bounds,
        Some(("acq_date =", DatabaseValue::String(today.to_string()))),
    )
    .await?;
    let last_week = count_where(
        db,
        bounds,
        Some(("acq_date >=", DatabaseValue::String(week_ago.to_string()))),
    )
    .await?;
    let high_confidence = count_where(
        db,
        bounds,
        Some(("confidence >=", DatabaseValue::Real64(HIGH_CONFIDENCE))),
    )
    .await?;

    Ok(FireStats {
        total,
        today: today_count,
        last_week,
        high_confidence,
        region: region.to_string(),
    })
}

async fn count_where(
    db: &dyn Database,
    bounds: Option<&BoundingBox>,
    condition: Option<(&str, DatabaseValue)>,
) -> Result<i64, DbError> {
    let mut filter = Filter::default();
    if let Some(bounds) = bounds {
        filter.within(bounds);
    }
    if let Some((lhs, value)) = condition {
        let p = filter.bind(value);
        filter.and(format!("{lhs} {p}"));
    }

    let rows = db
        .query_raw_params(
            &format!("SELECT COUNT(*) AS cnt FROM fire_detections{}", filter.where_sql()),
            filter.params(),
        )
        .await?;

    Ok(rows.first().map_or(0, |r| r.to_value("cnt").unwrap_or(0)))
}

/// Number of stored detections per source tag, every tag included.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn counts_by_source(db: &dyn Database) -> Result<Vec<SourceCount>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT source, COUNT(*) AS cnt FROM fire_detections GROUP BY source",
            &[],
        )
        .await?;

    let mut counts: Vec<SourceCount> = FireSource::all()
        .iter()
        .map(|&source| SourceCount { source, count: 0 })
        .collect();

    for row in &rows {
        let tag: String = row.to_value("source").unwrap_or_default();
        let source = tag.parse::<FireSource>().unwrap_or(FireSource::Other);
        let cnt: i64 = row.to_value("cnt").unwrap_or(0);
        if let Some(entry) = counts.iter_mut().find(|c| c.source == source) {
            entry.count += cnt;
        }
    }

    Ok(counts)
}

fn detection_from_row(row: &switchy_database::Row) -> FireDetectionRow {
    let daynight: String = row.to_value("daynight").unwrap_or_default();
    let source: String = row.to_value("source").unwrap_or_default();
    let created_at: String = row.to_value("created_at").unwrap_or_default();
    let updated_at: String = row.to_value("updated_at").unwrap_or_default();

    FireDetectionRow {
        id: row.to_value("id").unwrap_or_default(),
        latitude: row.to_value("latitude").unwrap_or(0.0),
        longitude: row.to_value("longitude").unwrap_or(0.0),
        confidence: row.to_value("confidence").unwrap_or(0.0),
        brightness: row.to_value("brightness").unwrap_or(0.0),
        scan: row.to_value("scan").unwrap_or(0.0),
        track: row.to_value("track").unwrap_or(0.0),
        acq_date: row.to_value("acq_date").unwrap_or_default(),
        acq_time: row.to_value("acq_time").unwrap_or_default(),
        satellite: row.to_value("satellite").unwrap_or_default(),
        instrument: row.to_value("instrument").unwrap_or_default(),
        version: row.to_value("version").unwrap_or_default(),
        bright_t31: row.to_value("bright_t31").unwrap_or(0.0),
        frp: row.to_value("frp").unwrap_or(0.0),
        daynight: daynight.parse().unwrap_or(DayNight::Day),
        detection_type: row.to_value("detection_type").unwrap_or(0),
        source: source.parse().unwrap_or(FireSource::Other),
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use fire_map_database_models::DateRange;

    use super::*;
    use crate::test_utils::temp_db;

    fn candidate(lat: f64, lng: f64, confidence: f64) -> FireCandidate {
        FireCandidate {
            latitude: lat,
            longitude: lng,
            brightness: 320.0,
            scan: 1.0,
            track: 1.0,
            acq_date: "2024-10-15".to_string(),
            acq_time: "0530".to_string(),
            satellite: "Terra".to_string(),
            instrument: "MODIS".to_string(),
            confidence,
            version: "6.1NRT".to_string(),
            bright_t31: 295.0,
            frp: 10.0,
            daynight: DayNight::Day,
            detection_type: 0,
            source: FireSource::Modis,
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 15, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn finds_duplicate_within_tolerance_only() {
        let (db, path) = temp_db("dup").await;
        let db = db.as_ref();
        insert(db, &candidate(30.9, 75.8, 60.0), at(6)).await.unwrap();

        let near = candidate(30.90005, 75.80005, 50.0);
        assert!(find_near_duplicate(db, &near).await.unwrap().is_some());

        let far = candidate(30.9005, 75.8, 50.0);
        assert!(find_near_duplicate(db, &far).await.unwrap().is_none());

        let mut other_time = candidate(30.9, 75.8, 50.0);
        other_time.acq_time = "0531".to_string();
        assert!(find_near_duplicate(db, &other_time).await.unwrap().is_none());

        let mut other_source = candidate(30.9, 75.8, 50.0);
        other_source.source = FireSource::Viirs;
        assert!(find_near_duplicate(db, &other_source).await.unwrap().is_none());

        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn update_touches_only_readings() {
        let (db, path) = temp_db("update").await;
        let db = db.as_ref();
        let id = insert(db, &candidate(30.9, 75.8, 60.0), at(6)).await.unwrap();

        let mut better = candidate(30.9, 75.8, 85.0);
        better.brightness = 340.0;
        better.frp = 22.0;
        better.satellite = "Aqua".to_string();
        update_readings(db, &id, &better, at(9)).await.unwrap();

        let row = get(db, &id).await.unwrap().unwrap();
        assert!((row.confidence - 85.0).abs() < f64::EPSILON);
        assert!((row.brightness - 340.0).abs() < f64::EPSILON);
        assert!((row.frp - 22.0).abs() < f64::EPSILON);
        assert_eq!(row.satellite, "Terra");
        assert_eq!(row.created_at, at(6));
        assert_eq!(row.updated_at, at(9));

        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn query_applies_all_filters() {
        let (db, path) = temp_db("query").await;
        let db = db.as_ref();

        insert(db, &candidate(30.9, 75.8, 85.0), at(1)).await.unwrap();
        insert(db, &candidate(30.8, 75.7, 50.0), at(2)).await.unwrap();
        let mut viirs = candidate(30.7, 75.6, 90.0);
        viirs.source = FireSource::Viirs;
        insert(db, &viirs, at(3)).await.unwrap();
        let mut outside = candidate(28.0, 77.0, 95.0);
        outside.acq_date = "2024-10-20".to_string();
        insert(db, &outside, at(4)).await.unwrap();

        let rows = query(
            db,
            &DetectionQuery {
                bounds: Some(BoundingBox::new(32.5, 29.5, 76.5, 73.5)),
                sources: Some(vec![FireSource::Modis]),
                min_confidence: 80.0,
                ..DetectionQuery::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert!((rows[0].latitude - 30.9).abs() < f64::EPSILON);

        let by_date = query(
            db,
            &DetectionQuery {
                date_range: Some(DateRange {
                    start: NaiveDate::from_ymd_opt(2024, 10, 16).unwrap(),
                    end: NaiveDate::from_ymd_opt(2024, 10, 20).unwrap(),
                }),
                ..DetectionQuery::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(by_date.len(), 1);

        let newest_first = query(
            db,
            &DetectionQuery {
                limit: Some(2),
                ..DetectionQuery::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(newest_first.len(), 2);
        assert_eq!(newest_first[0].created_at, at(4));

        let no_sources = query(
            db,
            &DetectionQuery {
                sources: Some(Vec::new()),
                ..DetectionQuery::default()
            },
        )
        .await
        .unwrap();
        assert!(no_sources.is_empty());

        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn stats_counts_each_bucket() {
        let (db, path) = temp_db("stats").await;
        let db = db.as_ref();
        let today = NaiveDate::from_ymd_opt(2024, 10, 15).unwrap();

        insert(db, &candidate(30.9, 75.8, 85.0), at(1)).await.unwrap();
        let mut old = candidate(30.8, 75.7, 50.0);
        old.acq_date = "2024-09-01".to_string();
        insert(db, &old, at(1)).await.unwrap();
        let mut haryana_only = candidate(28.0, 77.0, 90.0);
        haryana_only.acq_date = "2024-10-10".to_string();
        insert(db, &haryana_only, at(1)).await.unwrap();

        let all = stats(db, None, "all", today).await.unwrap();
        assert_eq!(all.total, 3);
        assert_eq!(all.today, 1);
        assert_eq!(all.last_week, 2);
        assert_eq!(all.high_confidence, 2);

        let punjab = BoundingBox::new(32.5, 29.5, 76.5, 73.5);
        let scoped = stats(db, Some(&punjab), "Punjab", today).await.unwrap();
        assert_eq!(scoped.total, 2);
        assert_eq!(scoped.high_confidence, 1);
        assert_eq!(scoped.region, "Punjab");

        let counts = counts_by_source(db).await.unwrap();
        let modis = counts.iter().find(|c| c.source == FireSource::Modis).unwrap();
        assert_eq!(modis.count, 3);
        assert_eq!(counts.len(), FireSource::all().len());

        std::fs::remove_file(path).ok();
    }
}
