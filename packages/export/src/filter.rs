//! Request filter parsing.
//!
//! Filters arrive as loose query-string values. Anything that cannot be
//! understood is logged and dropped instead of failing the request. A
//! source list whose tags are all unknown still narrows the result, to
//! nothing.

use chrono::NaiveDate;
use fire_map_database_models::{DateRange, DetectionOrder, DetectionQuery, UserReportQuery};
use fire_map_fire_models::FireSource;
use fire_map_geography::RegionTable;
use fire_map_geography_models::BoundingBox;
use serde::{Deserialize, Serialize};

/// Region value that selects the `bounds` parameter instead of a named
/// region.
pub const CUSTOM_REGION: &str = "custom";

/// Raw filter parameters as received on the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterParams {
    /// First day, `YYYY-MM-DD`.
    pub start_date: Option<String>,
    /// Last day, `YYYY-MM-DD`.
    pub end_date: Option<String>,
    /// Region id, or `custom`.
    pub region: Option<String>,
    /// Comma-separated source tags.
    pub sources: Option<String>,
    /// Minimum confidence.
    pub confidence: Option<String>,
    /// JSON `{north,south,east,west}` used with `region=custom`.
    pub bounds: Option<String>,
}

/// Filters after parsing and region lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedFilter {
    /// Set only when both ends were given and parsed.
    pub date_range: Option<DateRange>,
    /// Rectangle to restrict to.
    pub bounds: Option<BoundingBox>,
    /// Source tags to include; `None` means all.
    pub sources: Option<Vec<FireSource>>,
    /// Inclusive confidence floor.
    pub min_confidence: f64,
}

impl FilterParams {
    /// Parses every parameter against the region table.
    #[must_use]
    pub fn resolve(&self, regions: &RegionTable) -> ResolvedFilter {
        ResolvedFilter {
            date_range: self.date_range(),
            bounds: self.bounds(regions),
            sources: self.sources(),
            min_confidence: self.min_confidence(),
        }
    }

    fn date_range(&self) -> Option<DateRange> {
        let start = parse_date(self.start_date.as_deref()?, "startDate")?;
        let end = parse_date(self.end_date.as_deref()?, "endDate")?;
        Some(DateRange { start, end })
    }

    fn bounds(&self, regions: &RegionTable) -> Option<BoundingBox> {
        let region = self.region.as_deref().map(str::trim).filter(|r| !r.is_empty())?;

        if region.eq_ignore_ascii_case(CUSTOM_REGION) {
            return parse_custom_bounds(self.bounds.as_deref()?);
        }

        if let Some(found) = regions.get(region) {
            return Some(found.bounds);
        }

        if !matches!(region.to_ascii_lowercase().as_str(), "both" | "all") {
            log::warn!("Ignoring unknown region {region:?}");
        }
        None
    }

    fn sources(&self) -> Option<Vec<FireSource>> {
        let list = self.sources.as_deref().filter(|s| !s.trim().is_empty())?;

        let sources = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|tag| {
                tag.parse::<FireSource>()
                    .inspect_err(|_| log::warn!("Ignoring unknown source {tag:?}"))
                    .ok()
            })
            .collect();
        Some(sources)
    }

    fn min_confidence(&self) -> f64 {
        let Some(value) = self.confidence.as_deref().map(str::trim).filter(|v| !v.is_empty())
        else {
            return 0.0;
        };

        match value.parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => {
                log::warn!("Ignoring invalid confidence {value:?}");
                0.0
            }
        }
    }
}

impl ResolvedFilter {
    /// Detection query for these filters.
    #[must_use]
    pub fn detection_query(&self, order: DetectionOrder, limit: Option<u32>) -> DetectionQuery {
        DetectionQuery {
            date_range: self.date_range,
            bounds: self.bounds,
            sources: self.sources.clone(),
            min_confidence: self.min_confidence,
            order,
            limit,
        }
    }

    /// User report query for these filters. Source and confidence do not
    /// apply to reports.
    #[must_use]
    pub const fn user_report_query(&self, limit: Option<u32>) -> UserReportQuery {
        UserReportQuery {
            date_range: self.date_range,
            bounds: self.bounds,
            limit,
        }
    }
}

/// Parses a custom-bounds JSON payload. Malformed or inverted bounds are
/// logged and yield `None`.
#[must_use]
pub fn parse_custom_bounds(raw: &str) -> Option<BoundingBox> {
    match serde_json::from_str::<BoundingBox>(raw) {
        Ok(bounds) if bounds.is_well_formed() => Some(bounds),
        Ok(bounds) => {
            log::warn!("Ignoring inverted custom bounds {bounds:?}");
            None
        }
        Err(e) => {
            log::warn!("Ignoring malformed custom bounds {raw:?}: {e}");
            None
        }
    }
}

/// Parses a `YYYY-MM-DD` date, also accepting a full ISO timestamp.
fn parse_date(raw: &str, name: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let day = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .inspect_err(|e| log::warn!("Ignoring invalid {name} {raw:?}: {e}"))
        .ok()
}
