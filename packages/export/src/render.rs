//! Export file rendering.

use chrono::{DateTime, SecondsFormat, Utc};
use fire_map_database_models::{FireDetectionRow, UserReportRow};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde_json::json;
use strum_macros::{AsRefStr, Display, EnumString};

use crate::{ExportData, ExportError};

/// CSV header row.
pub const CSV_HEADER: [&str; 11] = [
    "type",
    "latitude",
    "longitude",
    "confidence",
    "brightness",
    "date",
    "time",
    "satellite",
    "instrument",
    "source",
    "frp",
];

const DETECTION_TYPE: &str = "nasa_detection";
const USER_REPORT_TYPE: &str = "user_report";
const NOT_APPLICABLE: &str = "N/A";

/// Supported export file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ExportFormat {
    /// Comma-separated values, one row per record.
    Csv,
    /// Both record lists plus a count.
    Json,
    /// `FeatureCollection` of points.
    GeoJson,
}

impl ExportFormat {
    /// `Content-Type` of the rendered body.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Csv => "text/csv",
            Self::Json | Self::GeoJson => "application/json",
        }
    }

    /// Download file name, for formats served as attachments.
    #[must_use]
    pub const fn attachment_name(self) -> Option<&'static str> {
        match self {
            Self::Csv => Some("fire-data.csv"),
            Self::Json | Self::GeoJson => None,
        }
    }
}

/// Renders `data` in `format`.
///
/// # Errors
///
/// Returns [`ExportError`] if serialization fails.
pub fn render(
    format: ExportFormat,
    data: &ExportData,
    exported_at: DateTime<Utc>,
) -> Result<String, ExportError> {
    match format {
        ExportFormat::Csv => to_csv(data),
        ExportFormat::Json => Ok(serde_json::to_string(&to_json(data, exported_at)?)?),
        ExportFormat::GeoJson => Ok(serde_json::to_string(&to_geojson(data, exported_at))?),
    }
}

/// Writes one CSV row per detection followed by one per user report.
///
/// # Errors
///
/// Returns [`ExportError`] if the CSV writer fails.
pub fn to_csv(data: &ExportData) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(CSV_HEADER)?;

    for fire in &data.detections {
        writer.write_record([
            DETECTION_TYPE.to_string(),
            fire.latitude.to_string(),
            fire.longitude.to_string(),
            fire.confidence.to_string(),
            fire.brightness.to_string(),
            fire.acq_date.clone(),
            fire.acq_time.clone(),
            fire.satellite.clone(),
            fire.instrument.clone(),
            fire.source.to_string(),
            fire.frp.to_string(),
        ])?;
    }

    for report in &data.user_reports {
        writer.write_record([
            USER_REPORT_TYPE.to_string(),
            report.latitude.to_string(),
            report.longitude.to_string(),
            NOT_APPLICABLE.to_string(),
            NOT_APPLICABLE.to_string(),
            report.created_at.format("%Y-%m-%d").to_string(),
            report.created_at.format("%H:%M:%S").to_string(),
            "USER_REPORT".to_string(),
            report.intensity.to_string(),
            "USER".to_string(),
            NOT_APPLICABLE.to_string(),
        ])?;
    }

    let bytes = writer.into_inner().map_err(csv::IntoInnerError::into_error)?;
    Ok(String::from_utf8(bytes)?)
}

/// Both record lists as JSON with the export time and combined count.
///
/// # Errors
///
/// Returns [`ExportError::Json`] if a record cannot be serialized.
pub fn to_json(
    data: &ExportData,
    exported_at: DateTime<Utc>,
) -> Result<serde_json::Value, ExportError> {
    Ok(json!({
        "nasa_detections": serde_json::to_value(&data.detections)?,
        "user_reports": serde_json::to_value(&data.user_reports)?,
        "export_date": iso_timestamp(exported_at),
        "total_count": data.total_count(),
    }))
}

/// Every record as a point feature, with a `metadata` member summarizing
/// the export.
#[must_use]
pub fn to_geojson(data: &ExportData, exported_at: DateTime<Utc>) -> FeatureCollection {
    let features: Vec<Feature> = data
        .detections
        .iter()
        .map(detection_feature)
        .chain(data.user_reports.iter().map(user_report_feature))
        .collect();

    let mut metadata = JsonObject::new();
    metadata.insert(
        "metadata".to_string(),
        json!({
            "export_date": iso_timestamp(exported_at),
            "total_features": features.len(),
            "nasa_detections": data.detections.len(),
            "user_reports": data.user_reports.len(),
        }),
    );

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(metadata),
    }
}

fn point_feature(latitude: f64, longitude: f64, properties: serde_json::Value) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Point(vec![longitude, latitude]))),
        id: None,
        properties: match properties {
            serde_json::Value::Object(map) => Some(map),
            _ => None,
        },
        foreign_members: None,
    }
}

fn detection_feature(fire: &FireDetectionRow) -> Feature {
    point_feature(
        fire.latitude,
        fire.longitude,
        json!({
            "type": DETECTION_TYPE,
            "confidence": fire.confidence,
            "brightness": fire.brightness,
            "date": fire.acq_date,
            "time": fire.acq_time,
            "satellite": fire.satellite,
            "instrument": fire.instrument,
            "source": fire.source,
            "frp": fire.frp,
            "daynight": fire.daynight,
        }),
    )
}

fn user_report_feature(report: &UserReportRow) -> Feature {
    point_feature(
        report.latitude,
        report.longitude,
        json!({
            "type": USER_REPORT_TYPE,
            "intensity": report.intensity,
            "smoke_visibility": report.smoke_visibility,
            "estimated_area": report.estimated_area,
            "description": report.description,
            "reporter_name": report.reporter_name,
            "verified": report.verified,
            "created_at": iso_timestamp(report.created_at),
        }),
    )
}

fn iso_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
