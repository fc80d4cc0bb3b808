#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Region registry. Loads the named bounding boxes from embedded TOML.
//!
//! Each `.toml` file in `packages/geography/regions/` is baked into the
//! binary at compile time via [`include_str!`]. The resulting
//! [`RegionTable`] is built once at start-up and handed out by shared
//! reference; nothing mutates it afterwards.

use std::collections::BTreeMap;

use fire_map_geography_models::{BoundingBox, Region, RegionSelection};
use serde::Deserialize;
use thiserror::Error;

/// TOML configs embedded at compile time.
const REGION_TOMLS: &[(&str, &str)] = &[
    ("punjab", include_str!("../regions/punjab.toml")),
    ("haryana", include_str!("../regions/haryana.toml")),
];

/// Errors that can occur while resolving regions.
#[derive(Debug, Error)]
pub enum GeoError {
    /// A region config could not be parsed.
    #[error("Invalid region config: {0}")]
    Toml(#[from] toml::de::Error),

    /// A region config parsed but describes an unusable box.
    #[error("Region '{id}' has malformed bounds")]
    MalformedBounds {
        /// Offending region id.
        id: String,
    },

    /// The requested region is not configured.
    #[error("Unknown region '{id}'. Available: {available}")]
    UnknownRegion {
        /// The requested id.
        id: String,
        /// Comma-separated configured ids.
        available: String,
    },
}

#[derive(Debug, Deserialize)]
struct RegionToml {
    id: String,
    name: String,
    bounds: BoundingBox,
}

/// Parses a single region definition.
///
/// # Errors
///
/// Returns [`GeoError`] if the TOML is malformed or the bounds are inverted.
pub fn parse_region_toml(toml_str: &str) -> Result<Region, GeoError> {
    let raw: RegionToml = toml::from_str(toml_str)?;
    if !raw.bounds.is_well_formed() {
        return Err(GeoError::MalformedBounds { id: raw.id });
    }
    Ok(Region {
        id: raw.id.to_ascii_lowercase(),
        name: raw.name,
        bounds: raw.bounds,
    })
}

/// Immutable lookup table of every configured region.
#[derive(Debug, Clone)]
pub struct RegionTable {
    regions: BTreeMap<String, Region>,
}

impl RegionTable {
    /// Builds a table from already-parsed regions.
    #[must_use]
    pub fn new(regions: impl IntoIterator<Item = Region>) -> Self {
        Self {
            regions: regions.into_iter().map(|r| (r.id.clone(), r)).collect(),
        }
    }

    /// Loads the regions embedded in the binary.
    ///
    /// # Panics
    ///
    /// Panics if any embedded TOML config is malformed (the configs ship
    /// with the binary, so this can only fail in development).
    #[must_use]
    pub fn embedded() -> Self {
        let regions = REGION_TOMLS.iter().map(|(name, toml)| {
            parse_region_toml(toml).unwrap_or_else(|e| panic!("Failed to parse {name}.toml: {e}"))
        });
        let table = Self::new(regions);
        log::debug!("Loaded {} region(s): {}", table.len(), table.ids_joined());
        table
    }

    /// Looks up a region by id (case-insensitive).
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Region> {
        self.regions.get(&id.trim().to_ascii_lowercase())
    }

    /// Looks up a region by id, failing with [`GeoError::UnknownRegion`].
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::UnknownRegion`] if no region has that id.
    pub fn require(&self, id: &str) -> Result<&Region, GeoError> {
        self.get(id).ok_or_else(|| GeoError::UnknownRegion {
            id: id.to_string(),
            available: self.ids_joined(),
        })
    }

    /// Expands a selection into the regions it covers, in id order.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::UnknownRegion`] for an unknown single region.
    pub fn resolve(&self, selection: &RegionSelection) -> Result<Vec<&Region>, GeoError> {
        match selection {
            RegionSelection::All => Ok(self.regions.values().collect()),
            RegionSelection::One(id) => Ok(vec![self.require(id)?]),
        }
    }

    /// Iterates regions in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.values()
    }

    /// Number of configured regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether no regions are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    fn ids_joined(&self) -> String {
        self.regions.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}
