#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Fire detection classification types shared across the fire-map system.
//!
//! Satellite feeds identify themselves by a product id (e.g.
//! `VIIRS_NOAA20_NRT`). Every product collapses into one of a small closed
//! set of [`FireSource`] tags, which is what gets stored and filtered on.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Normalized instrument family of a satellite fire detection.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum FireSource {
    /// Moderate Resolution Imaging Spectroradiometer (Terra/Aqua)
    Modis,
    /// Visible Infrared Imaging Radiometer Suite (S-NPP, NOAA-20, NOAA-21)
    Viirs,
    /// Any product we don't recognise
    Other,
}

impl FireSource {
    /// Maps a raw feed/product identifier to its canonical source tag.
    ///
    /// Both the bare instrument names used by older tooling (`VIIRS_SNPP`)
    /// and the full product ids (`VIIRS_SNPP_NRT`) are accepted.
    #[must_use]
    pub fn from_feed_id(id: &str) -> Self {
        let id = id.trim().to_ascii_uppercase();

        if id.starts_with("MODIS") {
            Self::Modis
        } else if id.starts_with("VIIRS_SNPP")
            || id.starts_with("VIIRS_NOAA20")
            || id.starts_with("VIIRS_NOAA21")
        {
            Self::Viirs
        } else {
            Self::Other
        }
    }

    /// Human-readable instrument description.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Modis => "Moderate Resolution Imaging Spectroradiometer",
            Self::Viirs => "Visible Infrared Imaging Radiometer Suite",
            Self::Other => "Other satellite sources",
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Modis, Self::Viirs, Self::Other]
    }
}

/// A NASA FIRMS area-API product.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum FeedProduct {
    /// MODIS near real-time
    #[serde(rename = "MODIS_NRT")]
    #[strum(serialize = "MODIS_NRT")]
    ModisNrt,
    /// MODIS standard processing (archive)
    #[serde(rename = "MODIS_SP")]
    #[strum(serialize = "MODIS_SP")]
    ModisSp,
    /// VIIRS on Suomi NPP, near real-time
    #[serde(rename = "VIIRS_SNPP_NRT")]
    #[strum(serialize = "VIIRS_SNPP_NRT")]
    ViirsSnppNrt,
    /// VIIRS on NOAA-20, near real-time
    #[serde(rename = "VIIRS_NOAA20_NRT")]
    #[strum(serialize = "VIIRS_NOAA20_NRT")]
    ViirsNoaa20Nrt,
    /// VIIRS on NOAA-21, near real-time
    #[serde(rename = "VIIRS_NOAA21_NRT")]
    #[strum(serialize = "VIIRS_NOAA21_NRT")]
    ViirsNoaa21Nrt,
}

impl FeedProduct {
    /// The canonical source tag records from this product are stored under.
    #[must_use]
    pub fn source(self) -> FireSource {
        FireSource::from_feed_id(self.as_ref())
    }

    /// Products synced when nothing else is configured.
    #[must_use]
    pub const fn defaults() -> &'static [Self] {
        &[Self::ModisNrt, Self::ViirsSnppNrt, Self::ViirsNoaa20Nrt]
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::ModisNrt,
            Self::ModisSp,
            Self::ViirsSnppNrt,
            Self::ViirsNoaa20Nrt,
            Self::ViirsNoaa21Nrt,
        ]
    }
}

/// Day/night flag of a satellite overpass.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum DayNight {
    /// Daytime overpass
    #[serde(rename = "D")]
    #[strum(serialize = "D")]
    Day,
    /// Nighttime overpass
    #[serde(rename = "N")]
    #[strum(serialize = "N")]
    Night,
}

/// Reported intensity of a citizen-observed fire.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Intensity {
    /// Small, smouldering
    Low,
    /// Visible flames over a field section
    Medium,
    /// Large active burn
    High,
}

/// Risk bucket of a fire prediction.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    /// Probability at or below 0.4
    Low,
    /// Probability above 0.4 and at most 0.7
    Medium,
    /// Probability above 0.7
    High,
}

impl RiskTier {
    /// Lower (exclusive) probability bound of the high tier.
    pub const HIGH_THRESHOLD: f64 = 0.7;
    /// Lower (exclusive) probability bound of the medium tier.
    pub const MEDIUM_THRESHOLD: f64 = 0.4;

    /// Buckets a prediction probability.
    #[must_use]
    pub fn from_probability(probability: f64) -> Self {
        if probability > Self::HIGH_THRESHOLD {
            Self::High
        } else if probability > Self::MEDIUM_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }
}
