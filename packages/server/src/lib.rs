#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the fire map application.
//!
//! Serves satellite detections and citizen reports for the map, file
//! exports, on-demand FIRMS syncs and grid risk predictions. Everything
//! lives under `/api` and is backed by one `SQLite` store.

mod handlers;
pub mod reports;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpResponse, HttpServer, error, middleware, web};
use chrono::TimeDelta;
use fire_map_database::db;
use fire_map_geography::RegionTable;
use fire_map_ingest::{FireSyncService, SyncConfig};
use fire_map_prediction::PredictionService;
use fire_map_server_models::ApiError;
use fire_map_source::{FirmsClient, FirmsConfig};
use switchy_database::Database;

pub use reports::DEFAULT_REPORT_WINDOW_HOURS;

/// Shared application state.
pub struct AppState {
    /// Fire store.
    pub db: Arc<dyn Database>,
    /// Configured regions.
    pub regions: Arc<RegionTable>,
    /// FIRMS sync, `None` when no API key is configured.
    pub sync: Option<FireSyncService>,
    /// Risk prediction service.
    pub predictions: PredictionService,
    /// Duplicate window for citizen reports.
    pub report_window: TimeDelta,
}

/// Reads `FIRE_MAP_REPORT_WINDOW_HOURS`, falling back to
/// [`DEFAULT_REPORT_WINDOW_HOURS`].
#[must_use]
pub fn report_window_from_env() -> TimeDelta {
    let hours = std::env::var("FIRE_MAP_REPORT_WINDOW_HOURS")
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|h| *h > 0)
        .unwrap_or(DEFAULT_REPORT_WINDOW_HOURS);
    TimeDelta::hours(hours)
}

/// Builds the sync service from `NASA_FIRMS_*` variables, or `None` if no
/// usable key is set.
#[must_use]
pub fn sync_service_from_env(regions: Arc<RegionTable>) -> Option<FireSyncService> {
    match FirmsClient::new(FirmsConfig::from_env()) {
        Ok(client) => Some(FireSyncService::new(
            Arc::new(client),
            regions,
            SyncConfig::from_env(),
        )),
        Err(e) => {
            log::warn!("Sync endpoints disabled: {e}");
            None
        }
    }
}

/// Registers the `/api` routes and JSON error handling.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        let response =
            HttpResponse::BadRequest().json(ApiError::new(format!("Invalid request body: {err}")));
        error::InternalError::from_response(err, response).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        let response =
            HttpResponse::BadRequest().json(ApiError::new(format!("Invalid query: {err}")));
        error::InternalError::from_response(err, response).into()
    }))
    .service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/fires", web::get().to(handlers::fires))
            .route("/user-fires", web::get().to(handlers::user_fires))
            .route("/user-fires", web::post().to(handlers::create_user_fire))
            .route("/export", web::get().to(handlers::export))
            .route("/sync", web::get().to(handlers::sync_stats))
            .route("/sync", web::post().to(handlers::sync))
            .route("/predictions", web::get().to(handlers::predictions))
            .route("/predictions", web::post().to(handlers::generate_predictions)),
    );
}

/// Starts the fire map API server.
///
/// Opens the store at `DATABASE_PATH`, builds the services from the
/// environment and serves on `BIND_ADDR:PORT`. This is a regular async
/// function; the caller provides the runtime (e.g. via
/// `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the store cannot be opened, or
/// the HTTP server fails to bind or encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    log::info!("Opening fire store...");
    let db_conn = db::open_from_env()
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    let regions = Arc::new(RegionTable::embedded());
    log::info!("Loaded {} region(s)", regions.len());

    let state = web::Data::new(AppState {
        db: Arc::from(db_conn),
        sync: sync_service_from_env(regions.clone()),
        predictions: PredictionService::density(regions.clone()),
        regions,
        report_window: report_window_from_env(),
    });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}

#[cfg(test)]
pub(crate) mod test_utils {
    use std::path::PathBuf;

    use fire_map_database::db;
    use switchy_database::Database;

    pub async fn temp_db(name: &str) -> (Box<dyn Database>, PathBuf) {
        let path = std::env::temp_dir().join(format!(
            "fire_map_server_{name}_{}.db",
            uuid::Uuid::new_v4().simple()
        ));
        let db = db::open(&path).await.unwrap();
        (db, path)
    }
}
