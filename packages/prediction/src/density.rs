//! Recency-weighted detection density model (`density-v1`).
//!
//! The region is split into 0.1 degree cells. Every detection in the
//! lookback window adds `exp(-age / DECAY_DAYS)` to its cell, so a fire
//! seen today counts 1.0 and one seen a week ago about 0.37. The weighted
//! count is treated as a daily rate and turned into the probability of at
//! least one fire within the horizon:
//!
//! ```text
//! p = 1 - exp(-RATE_SCALE * weighted * horizon_days)
//! ```
//!
//! Confidence saturates with the number of samples and is scaled by their
//! mean detection confidence. Cells with no detections get no prediction.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use fire_map_database_models::FireDetectionRow;
use fire_map_geography_models::Region;
use serde_json::json;

use crate::{GridPrediction, PredictionModel};

/// Model identifier stored with every prediction.
pub const MODEL_VERSION: &str = "density-v1";

/// Grid cell edge, in degrees.
pub const CELL_DEGREES: f64 = 0.1;

/// Days of history considered.
pub const LOOKBACK_DAYS: u32 = 30;

/// Age (days) at which a detection's weight falls to `1/e`.
pub const DECAY_DAYS: f64 = 7.0;

const RATE_SCALE: f64 = 0.1;
const SAMPLE_SATURATION: f64 = 5.0;
const MAX_PROBABILITY: f64 = 0.99;

#[derive(Debug, Default)]
struct CellStats {
    samples: u32,
    weighted: f64,
    confidence_sum: f64,
    newest_age: Option<i64>,
}

/// The shipped heuristic model.
#[derive(Debug, Clone, Copy, Default)]
pub struct DensityModel;

impl PredictionModel for DensityModel {
    fn version(&self) -> &'static str {
        MODEL_VERSION
    }

    fn lookback_days(&self) -> u32 {
        LOOKBACK_DAYS
    }

    fn predict(
        &self,
        region: &Region,
        date: NaiveDate,
        horizon_days: u32,
        history: &[FireDetectionRow],
    ) -> Vec<GridPrediction> {
        let mut cells: BTreeMap<(i64, i64), CellStats> = BTreeMap::new();

        for fire in history {
            if !region.bounds.contains(fire.latitude, fire.longitude) {
                continue;
            }
            let Ok(acquired) = NaiveDate::parse_from_str(&fire.acq_date, "%Y-%m-%d") else {
                log::debug!("Skipping detection {} with bad acq_date", fire.id);
                continue;
            };
            let age = (date - acquired).num_days();
            if !(0..=i64::from(LOOKBACK_DAYS)).contains(&age) {
                continue;
            }

            let cell = cells
                .entry((cell_index(fire.latitude), cell_index(fire.longitude)))
                .or_default();
            cell.samples += 1;
            cell.weighted += recency_weight(age);
            cell.confidence_sum += fire.confidence;
            cell.newest_age = Some(cell.newest_age.map_or(age, |a| a.min(age)));
        }

        cells
            .into_iter()
            .map(|((lat_idx, lng_idx), stats)| {
                let samples = f64::from(stats.samples);
                let mean_confidence = stats.confidence_sum / samples;

                GridPrediction {
                    grid_lat: cell_center(lat_idx),
                    grid_lng: cell_center(lng_idx),
                    probability: probability(stats.weighted, horizon_days),
                    confidence: confidence(samples, mean_confidence),
                    features: json!({
                        "detections": stats.samples,
                        "weighted_count": stats.weighted,
                        "mean_confidence": mean_confidence,
                        "days_since_last": stats.newest_age,
                        "horizon_days": horizon_days,
                    }),
                }
            })
            .collect()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn cell_index(degrees: f64) -> i64 {
    (degrees / CELL_DEGREES).floor() as i64
}

#[allow(clippy::cast_precision_loss)]
fn cell_center(index: i64) -> f64 {
    let center = (index as f64 + 0.5) * CELL_DEGREES;
    (center * 100.0).round() / 100.0
}

#[allow(clippy::cast_precision_loss)]
fn recency_weight(age_days: i64) -> f64 {
    (-(age_days as f64) / DECAY_DAYS).exp()
}

fn probability(weighted: f64, horizon_days: u32) -> f64 {
    let p = 1.0 - (-RATE_SCALE * weighted * f64::from(horizon_days)).exp();
    p.clamp(0.0, MAX_PROBABILITY)
}

fn confidence(samples: f64, mean_detection_confidence: f64) -> f64 {
    let saturation = 1.0 - (-samples / SAMPLE_SATURATION).exp();
    (saturation * mean_detection_confidence / 100.0).clamp(0.0, 1.0)
}
