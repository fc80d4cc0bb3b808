#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Feed request windows and the typed candidate record a satellite feed
//! row parses into.
//!
//! A [`FireCandidate`] is what the feed client hands to ingestion. It has
//! no id or timestamps yet; those are assigned when it is first stored.

use chrono::NaiveDate;
use fire_map_fire_models::{DayNight, FireSource};
use serde::{Deserialize, Serialize};

/// The day window of a single feed request.
///
/// The FIRMS area API accepts between 1 and 10 trailing days, optionally
/// anchored on an explicit date instead of "today".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedWindow {
    days: u8,
    date: Option<NaiveDate>,
}

impl FeedWindow {
    /// Largest day count the upstream API accepts.
    pub const MAX_DAYS: u8 = 10;

    /// A one-day window anchored on `date`.
    #[must_use]
    pub const fn day(date: NaiveDate) -> Self {
        Self {
            days: 1,
            date: Some(date),
        }
    }

    /// The trailing `days` days ending today. Returns `None` outside
    /// `1..=MAX_DAYS`.
    #[must_use]
    pub const fn trailing(days: u8) -> Option<Self> {
        if days == 0 || days > Self::MAX_DAYS {
            return None;
        }
        Some(Self { days, date: None })
    }

    /// Number of days covered.
    #[must_use]
    pub const fn days(&self) -> u8 {
        self.days
    }

    /// Anchor date, if any.
    #[must_use]
    pub const fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    /// URL path suffix: `{days}` or `{days}/{YYYY-MM-DD}`.
    #[must_use]
    pub fn path_segment(&self) -> String {
        self.date.map_or_else(
            || self.days.to_string(),
            |date| format!("{}/{}", self.days, date.format("%Y-%m-%d")),
        )
    }
}

/// A satellite fire detection parsed from a feed row, not yet stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireCandidate {
    /// Latitude (WGS84), always within `[-90, 90]`.
    pub latitude: f64,
    /// Longitude (WGS84), always within `[-180, 180]`.
    pub longitude: f64,
    /// Brightness temperature (Kelvin, 4 µm channel).
    pub brightness: f64,
    /// Along-scan pixel size (degrees).
    pub scan: f64,
    /// Along-track pixel size (degrees).
    pub track: f64,
    /// Acquisition date, `YYYY-MM-DD`.
    pub acq_date: String,
    /// Acquisition time, four-digit `HHMM`.
    pub acq_time: String,
    /// Satellite identifier as reported (e.g. `Terra`, `N`).
    pub satellite: String,
    /// Instrument name as reported.
    pub instrument: String,
    /// Detection confidence on a 0-100 scale.
    pub confidence: f64,
    /// Product collection version.
    pub version: String,
    /// Brightness temperature (Kelvin, 11 µm channel); 0 when absent.
    pub bright_t31: f64,
    /// Fire radiative power (MW).
    pub frp: f64,
    /// Day or night overpass.
    pub daynight: DayNight,
    /// Product-specific detection type; 0 when absent.
    pub detection_type: i32,
    /// Normalized instrument family.
    pub source: FireSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_window_rejects_out_of_range() {
        assert!(FeedWindow::trailing(0).is_none());
        assert!(FeedWindow::trailing(11).is_none());
        assert_eq!(FeedWindow::trailing(3).unwrap().path_segment(), "3");
    }

    #[test]
    fn day_window_includes_date() {
        let date = NaiveDate::from_ymd_opt(2024, 11, 2).unwrap();
        let window = FeedWindow::day(date);
        assert_eq!(window.days(), 1);
        assert_eq!(window.path_segment(), "1/2024-11-02");
    }
}
