#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geographic types: bounding boxes and named regions.
//!
//! Regions are static configuration (see `fire_map_geography`), never
//! persisted. All geographic filtering in fire-map is a plain axis-aligned
//! rectangle test on these boxes.

use serde::{Deserialize, Serialize};

/// A geographic bounding box in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Northern latitude boundary.
    pub north: f64,
    /// Southern latitude boundary.
    pub south: f64,
    /// Eastern longitude boundary.
    pub east: f64,
    /// Western longitude boundary.
    pub west: f64,
}

impl BoundingBox {
    /// Creates a new bounding box from the given edges.
    #[must_use]
    pub const fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self {
            north,
            south,
            east,
            west,
        }
    }

    /// Inclusive rectangle test: `south <= lat <= north` and
    /// `west <= lng <= east`.
    #[must_use]
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.south..=self.north).contains(&latitude)
            && (self.west..=self.east).contains(&longitude)
    }

    /// Formats the box as the `west,south,east,north` area string the FIRMS
    /// area API expects.
    #[must_use]
    pub fn area_string(&self) -> String {
        format!("{},{},{},{}", self.west, self.south, self.east, self.north)
    }

    /// Whether all edges are finite and ordered (`south <= north`,
    /// `west <= east`).
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        [self.north, self.south, self.east, self.west]
            .iter()
            .all(|v| v.is_finite())
            && self.south <= self.north
            && self.west <= self.east
    }
}

/// A named rectangular region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Lowercase identifier used in API parameters (e.g. `"punjab"`).
    pub id: String,
    /// Display name (e.g. `"Punjab"`).
    pub name: String,
    /// Extent of the region.
    pub bounds: BoundingBox,
}

/// Which regions a sync or stats request targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionSelection {
    /// A single named region.
    One(String),
    /// Every configured region, each processed independently.
    All,
}

impl RegionSelection {
    /// Parses a request parameter. `"both"`, `"all"` and the empty string
    /// select every region; anything else names a single region.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let value = value.trim().to_ascii_lowercase();
        match value.as_str() {
            "" | "both" | "all" => Self::All,
            _ => Self::One(value),
        }
    }

    /// Label used in logs and API responses.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::One(id) => id,
            Self::All => "all",
        }
    }
}
