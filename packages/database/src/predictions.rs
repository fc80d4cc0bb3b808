//! Stored grid risk predictions.

use fire_map_database_models::PredictionRow;
use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue};

use crate::{DbError, format_timestamp, parse_timestamp};

/// Replaces every stored prediction for `(region, date, horizon)` with
/// `predictions`. Returns the number of rows inserted.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn replace(
    db: &dyn Database,
    region: &str,
    prediction_date: &str,
    horizon: i32,
    predictions: &[PredictionRow],
) -> Result<u64, DbError> {
    let removed = db
        .exec_raw_params(
            "DELETE FROM fire_predictions
             WHERE region = $1 AND prediction_date = $2 AND prediction_horizon = $3",
            &[
                DatabaseValue::String(region.to_string()),
                DatabaseValue::String(prediction_date.to_string()),
                DatabaseValue::Int32(horizon),
            ],
        )
        .await?;

    if removed > 0 {
        log::debug!("Replacing {removed} stored prediction(s) for {region} {prediction_date} +{horizon}d");
    }

    let mut inserted = 0u64;

    for p in predictions {
        inserted += db
            .exec_raw_params(
                "INSERT INTO fire_predictions (
                    id, region, grid_lat, grid_lng, probability, confidence,
                    prediction_date, prediction_horizon, model_version, features, created_at
                 ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
                &[
                    DatabaseValue::String(p.id.clone()),
                    DatabaseValue::String(p.region.clone()),
                    DatabaseValue::Real64(p.grid_lat),
                    DatabaseValue::Real64(p.grid_lng),
                    DatabaseValue::Real64(p.probability),
                    DatabaseValue::Real64(p.confidence),
                    DatabaseValue::String(p.prediction_date.clone()),
                    DatabaseValue::Int32(p.prediction_horizon),
                    DatabaseValue::String(p.model_version.clone()),
                    DatabaseValue::String(p.features.clone()),
                    DatabaseValue::String(format_timestamp(p.created_at)),
                ],
            )
            .await?;
    }

    Ok(inserted)
}

/// Loads stored predictions for `(region, date, horizon)`, highest
/// probability first.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn query(
    db: &dyn Database,
    region: &str,
    prediction_date: &str,
    horizon: i32,
) -> Result<Vec<PredictionRow>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT id, region, grid_lat, grid_lng, probability, confidence,
                    prediction_date, prediction_horizon, model_version, features, created_at
             FROM fire_predictions
             WHERE region = $1 AND prediction_date = $2 AND prediction_horizon = $3
             ORDER BY probability DESC, grid_lat, grid_lng",
            &[
                DatabaseValue::String(region.to_string()),
                DatabaseValue::String(prediction_date.to_string()),
                DatabaseValue::Int32(horizon),
            ],
        )
        .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let created_at: String = row.to_value("created_at").unwrap_or_default();
            PredictionRow {
                id: row.to_value("id").unwrap_or_default(),
                region: row.to_value("region").unwrap_or_default(),
                grid_lat: row.to_value("grid_lat").unwrap_or(0.0),
                grid_lng: row.to_value("grid_lng").unwrap_or(0.0),
                probability: row.to_value("probability").unwrap_or(0.0),
                confidence: row.to_value("confidence").unwrap_or(0.0),
                prediction_date: row.to_value("prediction_date").unwrap_or_default(),
                prediction_horizon: row.to_value("prediction_horizon").unwrap_or(0),
                model_version: row.to_value("model_version").unwrap_or_default(),
                features: row.to_value("features").unwrap_or_default(),
                created_at: parse_timestamp(&created_at),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone as _, Utc};

    use super::*;
    use crate::test_utils::temp_db;

    fn prediction(region: &str, lat: f64, probability: f64) -> PredictionRow {
        PredictionRow {
            id: uuid::Uuid::new_v4().to_string(),
            region: region.to_string(),
            grid_lat: lat,
            grid_lng: 75.8,
            probability,
            confidence: 0.5,
            prediction_date: "2024-10-16".to_string(),
            prediction_horizon: 7,
            model_version: "density-v1".to_string(),
            features: "{}".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 10, 15, 12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn replace_overwrites_same_key_only() {
        let (db, path) = temp_db("predictions").await;
        let db = db.as_ref();

        replace(
            db,
            "punjab",
            "2024-10-16",
            7,
            &[prediction("punjab", 30.9, 0.2), prediction("punjab", 31.0, 0.8)],
        )
        .await
        .unwrap();
        replace(db, "haryana", "2024-10-16", 7, &[prediction("haryana", 29.0, 0.5)])
            .await
            .unwrap();

        let rows = query(db, "punjab", "2024-10-16", 7).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!((rows[0].probability - 0.8).abs() < f64::EPSILON);

        replace(db, "punjab", "2024-10-16", 7, &[prediction("punjab", 30.5, 0.4)])
            .await
            .unwrap();
        assert_eq!(query(db, "punjab", "2024-10-16", 7).await.unwrap().len(), 1);
        assert_eq!(query(db, "haryana", "2024-10-16", 7).await.unwrap().len(), 1);
        assert!(query(db, "punjab", "2024-10-16", 3).await.unwrap().is_empty());

        std::fs::remove_file(path).ok();
    }
}
