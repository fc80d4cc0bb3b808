//! FIRMS area CSV parsing.
//!
//! MODIS and VIIRS products share the same column positions:
//!
//! | idx | MODIS        | VIIRS        |
//! |-----|--------------|--------------|
//! | 0   | latitude     | latitude     |
//! | 1   | longitude    | longitude    |
//! | 2   | brightness   | bright_ti4   |
//! | 3   | scan         | scan         |
//! | 4   | track        | track        |
//! | 5   | acq_date     | acq_date     |
//! | 6   | acq_time     | acq_time     |
//! | 7   | satellite    | satellite    |
//! | 8   | instrument   | instrument   |
//! | 9   | confidence   | confidence   |
//! | 10  | version      | version      |
//! | 11  | bright_t31   | bright_ti5   |
//! | 12  | frp          | frp          |
//! | 13  | daynight     | daynight     |
//! | 14  | type         | type         |
//!
//! Rows that cannot be turned into a valid [`FireCandidate`] are dropped
//! and logged at debug level. Parsing never fails as a whole.

use fire_map_fire_models::{DayNight, FeedProduct};
use fire_map_source_models::FireCandidate;

/// Minimum number of columns a data row must have.
pub const MIN_COLUMNS: usize = 14;

/// Parses a raw feed body into candidates. Empty and header-only input
/// yield an empty list.
#[must_use]
pub fn parse_feed(raw: &str, product: FeedProduct) -> Vec<FireCandidate> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(raw.as_bytes());

    let mut candidates = Vec::new();

    for (i, result) in reader.records().enumerate() {
        // +2: one for the header, one for 1-based line numbers
        let line = i + 2;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                log::debug!("[{product}] line {line}: unreadable row: {e}");
                continue;
            }
        };

        match parse_row(&record, product) {
            Ok(candidate) => candidates.push(candidate),
            Err(reason) => log::debug!("[{product}] line {line}: skipped ({reason})"),
        }
    }

    log::debug!("[{product}] parsed {} candidate(s)", candidates.len());
    candidates
}

fn parse_row(record: &csv::StringRecord, product: FeedProduct) -> Result<FireCandidate, String> {
    if record.len() < MIN_COLUMNS {
        return Err(format!("only {} columns", record.len()));
    }

    let field = |idx: usize| record.get(idx).unwrap_or_default();

    let latitude = parse_number(field(0), "latitude")?;
    let longitude = parse_number(field(1), "longitude")?;
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(format!("coordinates out of range ({latitude}, {longitude})"));
    }

    let daynight = field(13)
        .to_ascii_uppercase()
        .parse::<DayNight>()
        .map_err(|_| format!("invalid daynight '{}'", field(13)))?;

    Ok(FireCandidate {
        latitude,
        longitude,
        brightness: parse_number(field(2), "brightness")?,
        scan: parse_number(field(3), "scan")?,
        track: parse_number(field(4), "track")?,
        acq_date: field(5).to_string(),
        acq_time: pad_acq_time(field(6)),
        satellite: field(7).to_string(),
        instrument: field(8).to_string(),
        confidence: parse_confidence(field(9)).ok_or_else(|| {
            format!("invalid confidence '{}'", field(9))
        })?,
        version: field(10).to_string(),
        bright_t31: field(11).parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0),
        frp: parse_number(field(12), "frp")?,
        daynight,
        detection_type: record
            .get(14)
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(0),
        source: product.source(),
    })
}

fn parse_number(value: &str, name: &str) -> Result<f64, String> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("invalid {name} '{value}'"))
}

/// Converts a feed confidence value to the 0-100 scale.
///
/// MODIS reports a percentage; VIIRS reports `l`/`n`/`h` (low, nominal,
/// high), which map to 30, 60 and 90.
#[must_use]
pub fn parse_confidence(value: &str) -> Option<f64> {
    match value.to_ascii_lowercase().as_str() {
        "l" | "low" => Some(30.0),
        "n" | "nominal" => Some(60.0),
        "h" | "high" => Some(90.0),
        other => other.parse::<f64>().ok().filter(|v| v.is_finite()),
    }
}

/// Left-pads an acquisition time to four digits (`630` → `0630`).
#[must_use]
pub fn pad_acq_time(value: &str) -> String {
    format!("{value:0>4}")
}

#[cfg(test)]
mod tests {
    use fire_map_fire_models::FireSource;

    use super::*;

    const MODIS_HEADER: &str = "latitude,longitude,brightness,scan,track,acq_date,acq_time,satellite,instrument,confidence,version,bright_t31,frp,daynight,type";
    const VIIRS_HEADER: &str = "latitude,longitude,bright_ti4,scan,track,acq_date,acq_time,satellite,instrument,confidence,version,bright_ti5,frp,daynight,type";

    #[test]
    fn parses_modis_rows() {
        let raw = format!(
            "{MODIS_HEADER}\n\
             30.9,75.8,320.5,1.0,1.0,2024-10-15,530,Terra,MODIS,85,6.1NRT,295.2,12.3,D,0\n"
        );

        let fires = parse_feed(&raw, FeedProduct::ModisNrt);

        assert_eq!(fires.len(), 1);
        let fire = &fires[0];
        assert!((fire.latitude - 30.9).abs() < f64::EPSILON);
        assert!((fire.confidence - 85.0).abs() < f64::EPSILON);
        assert_eq!(fire.acq_time, "0530");
        assert_eq!(fire.daynight, DayNight::Day);
        assert_eq!(fire.source, FireSource::Modis);
    }

    #[test]
    fn scales_viirs_confidence_letters() {
        let raw = format!(
            "{VIIRS_HEADER}\n\
             30.1,75.1,330.0,0.4,0.4,2024-10-15,0812,N,VIIRS,l,2.0NRT,290.0,3.1,D,0\n\
             30.2,75.2,331.0,0.4,0.4,2024-10-15,0812,N,VIIRS,n,2.0NRT,290.0,3.1,D,0\n\
             30.3,75.3,332.0,0.4,0.4,2024-10-15,0812,N,VIIRS,h,2.0NRT,290.0,3.1,N,0\n"
        );

        let confidences: Vec<f64> = parse_feed(&raw, FeedProduct::ViirsNoaa20Nrt)
            .iter()
            .map(|f| f.confidence)
            .collect();

        assert_eq!(confidences, vec![30.0, 60.0, 90.0]);
    }

    #[test]
    fn header_only_and_empty_input_yield_nothing() {
        assert!(parse_feed("", FeedProduct::ModisNrt).is_empty());
        assert!(parse_feed(MODIS_HEADER, FeedProduct::ModisNrt).is_empty());
        assert!(parse_feed(&format!("{MODIS_HEADER}\n"), FeedProduct::ModisNrt).is_empty());
    }

    #[test]
    fn drops_short_rows() {
        let raw = format!("{MODIS_HEADER}\n30.9,75.8,320.5,1.0,1.0,2024-10-15,0530,Terra,MODIS,85,6.1NRT,295.2,12.3\n");
        assert!(parse_feed(&raw, FeedProduct::ModisNrt).is_empty());
    }

    #[test]
    fn drops_out_of_range_coordinates() {
        let raw = format!(
            "{MODIS_HEADER}\n\
             91.0,75.8,320.5,1.0,1.0,2024-10-15,0530,Terra,MODIS,85,6.1NRT,295.2,12.3,D,0\n\
             30.0,-181.0,320.5,1.0,1.0,2024-10-15,0530,Terra,MODIS,85,6.1NRT,295.2,12.3,D,0\n\
             -90.0,180.0,320.5,1.0,1.0,2024-10-15,0530,Terra,MODIS,85,6.1NRT,295.2,12.3,D,0\n"
        );

        let fires = parse_feed(&raw, FeedProduct::ModisNrt);

        assert_eq!(fires.len(), 1);
        assert!((fires[0].latitude - -90.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unparsable_numerics_drop_row_but_optional_columns_default() {
        let raw = format!(
            "{MODIS_HEADER}\n\
             abc,75.8,320.5,1.0,1.0,2024-10-15,0530,Terra,MODIS,85,6.1NRT,295.2,12.3,D,0\n\
             30.9,75.8,320.5,1.0,1.0,2024-10-15,0530,Terra,MODIS,85,6.1NRT,,12.3,D\n"
        );

        let fires = parse_feed(&raw, FeedProduct::ModisNrt);

        assert_eq!(fires.len(), 1);
        assert!(fires[0].bright_t31.abs() < f64::EPSILON);
        assert_eq!(fires[0].detection_type, 0);
    }

    #[test]
    fn drops_invalid_daynight() {
        let raw = format!(
            "{MODIS_HEADER}\n30.9,75.8,320.5,1.0,1.0,2024-10-15,0530,Terra,MODIS,85,6.1NRT,295.2,12.3,X,0\n"
        );
        assert!(parse_feed(&raw, FeedProduct::ModisNrt).is_empty());
    }

    #[test]
    fn pads_acq_time() {
        assert_eq!(pad_acq_time("5"), "0005");
        assert_eq!(pad_acq_time("0630"), "0630");
        assert_eq!(pad_acq_time("1245"), "1245");
    }
}
