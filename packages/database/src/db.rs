//! Database connection and schema.

use std::path::{Path, PathBuf};

use switchy_database::Database;
use switchy_database_connection::init_sqlite_rusqlite;

use crate::DbError;

/// Default location of the store, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "data/fire_map.db";

/// Returns the store path from `DATABASE_PATH`, or [`DEFAULT_DB_PATH`].
#[must_use]
pub fn path_from_env() -> PathBuf {
    std::env::var("DATABASE_PATH")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_DB_PATH), PathBuf::from)
}

/// Opens (or creates) the `SQLite` store and ensures the schema exists.
///
/// # Errors
///
/// Returns [`DbError`] if the file cannot be opened or schema creation
/// fails.
pub async fn open(path: &Path) -> Result<Box<dyn Database>, DbError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let db = init_sqlite_rusqlite(Some(path)).map_err(|e| DbError::Connection {
        message: format!("{}: {e}", path.display()),
    })?;

    ensure_schema(db.as_ref()).await?;
    log::debug!("Opened fire store at {}", path.display());

    Ok(db)
}

/// Opens the store at [`path_from_env`].
///
/// # Errors
///
/// Returns [`DbError`] if the file cannot be opened or schema creation
/// fails.
pub async fn open_from_env() -> Result<Box<dyn Database>, DbError> {
    open(&path_from_env()).await
}

/// Cheap round trip used by health checks.
///
/// # Errors
///
/// Returns [`DbError`] if the store cannot answer.
pub async fn ping(db: &dyn Database) -> Result<(), DbError> {
    db.query_raw_params("SELECT 1 AS ok", &[]).await?;
    Ok(())
}

async fn ensure_schema(db: &dyn Database) -> Result<(), DbError> {
    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS fire_detections (
            id              TEXT PRIMARY KEY,
            latitude        REAL NOT NULL,
            longitude       REAL NOT NULL,
            confidence      REAL NOT NULL,
            brightness      REAL NOT NULL,
            scan            REAL NOT NULL,
            track           REAL NOT NULL,
            acq_date        TEXT NOT NULL,
            acq_time        TEXT NOT NULL,
            satellite       TEXT NOT NULL,
            instrument      TEXT NOT NULL,
            version         TEXT NOT NULL,
            bright_t31      REAL NOT NULL DEFAULT 0,
            frp             REAL NOT NULL,
            daynight        TEXT NOT NULL,
            detection_type  INTEGER NOT NULL DEFAULT 0,
            source          TEXT NOT NULL,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        )",
    )
    .await?;

    db.exec_raw(
        "CREATE INDEX IF NOT EXISTS idx_fire_detections_event
         ON fire_detections (source, acq_date, acq_time, latitude, longitude)",
    )
    .await?;

    db.exec_raw(
        "CREATE INDEX IF NOT EXISTS idx_fire_detections_location
         ON fire_detections (latitude, longitude)",
    )
    .await?;

    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS user_reported_fires (
            id                TEXT PRIMARY KEY,
            latitude          REAL NOT NULL,
            longitude         REAL NOT NULL,
            intensity         TEXT NOT NULL,
            smoke_visibility  INTEGER NOT NULL,
            estimated_area    REAL NOT NULL,
            description       TEXT,
            reporter_name     TEXT,
            reporter_contact  TEXT,
            photos            TEXT NOT NULL DEFAULT '[]',
            verified          INTEGER NOT NULL DEFAULT 0,
            created_at        TEXT NOT NULL
        )",
    )
    .await?;

    db.exec_raw(
        "CREATE INDEX IF NOT EXISTS idx_user_reported_fires_created
         ON user_reported_fires (created_at)",
    )
    .await?;

    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS fire_predictions (
            id                  TEXT PRIMARY KEY,
            region              TEXT NOT NULL,
            grid_lat            REAL NOT NULL,
            grid_lng            REAL NOT NULL,
            probability         REAL NOT NULL,
            confidence          REAL NOT NULL,
            prediction_date     TEXT NOT NULL,
            prediction_horizon  INTEGER NOT NULL,
            model_version       TEXT NOT NULL,
            features            TEXT NOT NULL,
            created_at          TEXT NOT NULL
        )",
    )
    .await?;

    db.exec_raw(
        "CREATE INDEX IF NOT EXISTS idx_fire_predictions_lookup
         ON fire_predictions (region, prediction_date, prediction_horizon)",
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_is_idempotent() {
        let path = std::env::temp_dir().join(format!(
            "fire_map_open_{}.db",
            uuid::Uuid::new_v4().simple()
        ));

        let db = open(&path).await.unwrap();
        ping(db.as_ref()).await.unwrap();
        drop(db);

        let db = open(&path).await.unwrap();
        ping(db.as_ref()).await.unwrap();

        std::fs::remove_file(&path).ok();
    }
}
