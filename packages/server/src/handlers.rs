//! HTTP handler functions for the fire map API.

use actix_web::{HttpResponse, http::StatusCode, web};
use chrono::{NaiveDate, Utc};
use fire_map_database::db;
use fire_map_database_models::NewUserReport;
use fire_map_export::{ExportFormat, FilterParams, render};
use fire_map_geography_models::RegionSelection;
use fire_map_ingest::{IngestError, fire_stats};
use fire_map_ingest_models::SyncReport;
use fire_map_prediction::{
    DEFAULT_HORIZON_DAYS, PredictionError, TierCounts, validate_horizon,
};
use fire_map_server_models::{
    ApiError, ApiGeneratedPredictions, ApiHealth, ApiPrediction, ApiPredictionMetadata,
    ApiPredictions, ApiSyncResponse, ExportFormatParams, PredictionQueryParams, PredictionRequest,
    SyncRequest, SyncStatsParams,
};

use crate::AppState;
use crate::reports::{self, SubmitError};

/// Number of predictions echoed back after generation.
const PREVIEW_LEN: usize = 10;

const MISSING_KEY: &str = "NASA FIRMS API key not configured";

fn error(status: StatusCode, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(ApiError::new(message))
}

/// Parses `YYYY-MM-DD`, also accepting a full ISO timestamp.
fn parse_day(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let day = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn day_or_today(raw: Option<&str>) -> Result<NaiveDate, HttpResponse> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(Utc::now().date_naive()),
        Some(raw) => parse_day(raw).ok_or_else(|| {
            error(
                StatusCode::BAD_REQUEST,
                format!("Invalid date '{raw}'. Expected YYYY-MM-DD"),
            )
        }),
    }
}

/// `GET /api/health`
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let version = env!("CARGO_PKG_VERSION").to_string();

    match db::ping(state.db.as_ref()).await {
        Ok(()) => HttpResponse::Ok().json(ApiHealth {
            status: "healthy".to_string(),
            timestamp: Utc::now(),
            database: "connected".to_string(),
            version,
            error: None,
        }),
        Err(e) => {
            log::error!("Health check failed: {e}");
            HttpResponse::ServiceUnavailable().json(ApiHealth {
                status: "unhealthy".to_string(),
                timestamp: Utc::now(),
                database: "disconnected".to_string(),
                version,
                error: Some("Database connection failed".to_string()),
            })
        }
    }
}

/// `GET /api/fires`
///
/// Newest satellite detections matching the filters, at most 1000.
pub async fn fires(state: web::Data<AppState>, params: web::Query<FilterParams>) -> HttpResponse {
    let filter = params.resolve(&state.regions);

    match fire_map_export::live_detections(state.db.as_ref(), &filter).await {
        Ok(rows) => HttpResponse::Ok().json(rows),
        Err(e) => {
            log::error!("Failed to query fire detections: {e}");
            error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch fire data")
        }
    }
}

/// `GET /api/user-fires`
///
/// Newest citizen reports matching the date and area filters.
pub async fn user_fires(
    state: web::Data<AppState>,
    params: web::Query<FilterParams>,
) -> HttpResponse {
    let filter = params.resolve(&state.regions);

    match fire_map_export::live_user_reports(state.db.as_ref(), &filter).await {
        Ok(rows) => HttpResponse::Ok().json(rows),
        Err(e) => {
            log::error!("Failed to query user reports: {e}");
            error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch user reported fires",
            )
        }
    }
}

/// `POST /api/user-fires`
pub async fn create_user_fire(
    state: web::Data<AppState>,
    body: web::Json<NewUserReport>,
) -> HttpResponse {
    match reports::submit(state.db.as_ref(), &body, state.report_window, Utc::now()).await {
        Ok(row) => HttpResponse::Created().json(row),
        Err(e @ SubmitError::Invalid { .. }) => error(StatusCode::BAD_REQUEST, e.to_string()),
        Err(e @ SubmitError::Duplicate { .. }) => error(StatusCode::CONFLICT, e.to_string()),
        Err(SubmitError::Database(e)) => {
            log::error!("Failed to store user report: {e}");
            error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create fire report",
            )
        }
    }
}

/// `GET /api/export`
///
/// Renders every matching detection and report as a CSV, JSON or
/// `GeoJSON` document.
pub async fn export(
    state: web::Data<AppState>,
    format: web::Query<ExportFormatParams>,
    params: web::Query<FilterParams>,
) -> HttpResponse {
    let Some(format) = format
        .format
        .as_deref()
        .and_then(|f| f.trim().parse::<ExportFormat>().ok())
    else {
        return error(
            StatusCode::BAD_REQUEST,
            "Invalid format. Must be csv, json, or geojson",
        );
    };

    let filter = params.resolve(&state.regions);

    let body = match fire_map_export::collect(state.db.as_ref(), &filter).await {
        Ok(data) => render::render(format, &data, Utc::now()),
        Err(e) => Err(e),
    };

    match body {
        Ok(body) => {
            let mut response = HttpResponse::Ok();
            response.content_type(format.content_type());
            if let Some(name) = format.attachment_name() {
                response.insert_header((
                    "Content-Disposition",
                    format!("attachment; filename=\"{name}\""),
                ));
            }
            response.body(body)
        }
        Err(e) => {
            log::error!("Failed to export {format}: {e}");
            error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to export data")
        }
    }
}

fn ingest_error(e: &IngestError, context: &str) -> HttpResponse {
    match e {
        IngestError::Geo(_) | IngestError::InvalidRequest { .. } => {
            error(StatusCode::BAD_REQUEST, e.to_string())
        }
        IngestError::Source(source) if source.is_configuration() => {
            error(StatusCode::INTERNAL_SERVER_ERROR, MISSING_KEY)
        }
        IngestError::Source(_) | IngestError::Database(_) => {
            log::error!("{context}: {e}");
            error(StatusCode::INTERNAL_SERVER_ERROR, context)
        }
    }
}

/// `GET /api/sync`
///
/// Aggregate detection counts. Requires a configured FIRMS key.
pub async fn sync_stats(
    state: web::Data<AppState>,
    params: web::Query<SyncStatsParams>,
) -> HttpResponse {
    if state.sync.is_none() {
        return error(StatusCode::INTERNAL_SERVER_ERROR, MISSING_KEY);
    }

    match fire_stats(
        state.db.as_ref(),
        &state.regions,
        params.region.as_deref(),
        Utc::now().date_naive(),
    )
    .await
    {
        Ok(stats) => HttpResponse::Ok().json(stats),
        Err(e) => ingest_error(&e, "Failed to get fire statistics"),
    }
}

/// `POST /api/sync`
///
/// Syncs one day, or every day of `historical` when both of its ends are
/// given.
pub async fn sync(state: web::Data<AppState>, body: web::Json<SyncRequest>) -> HttpResponse {
    let Some(service) = &state.sync else {
        return error(StatusCode::INTERNAL_SERVER_ERROR, MISSING_KEY);
    };

    let selection = RegionSelection::parse(body.region.as_deref().unwrap_or("both"));
    let label = selection.label().to_string();
    let db = state.db.as_ref();

    let range = body
        .historical
        .as_ref()
        .and_then(|h| Some((h.start_date.as_deref()?, h.end_date.as_deref()?)));

    if let Some((start, end)) = range {
        let (Some(start), Some(end)) = (parse_day(start), parse_day(end)) else {
            return error(
                StatusCode::BAD_REQUEST,
                "Invalid historical range. Expected YYYY-MM-DD dates",
            );
        };

        return match service.backfill(db, &selection, start, end).await {
            Ok(report) => HttpResponse::Ok().json(ApiSyncResponse {
                success: true,
                message: format!(
                    "Historical data sync completed for {label} from {start} to {end}"
                ),
                totals: report.totals(),
                failed_products: report
                    .days
                    .iter()
                    .flat_map(|day| {
                        let prefix = day.date.map(|d| format!("{d} ")).unwrap_or_default();
                        failed_products(day)
                            .into_iter()
                            .map(move |p| format!("{prefix}{p}"))
                    })
                    .collect(),
                failed_days: report.failed_days,
            }),
            Err(e) => ingest_error(&e, "Failed to sync fire data"),
        };
    }

    let date = match day_or_today(body.date.as_deref()) {
        Ok(date) => date,
        Err(response) => return response,
    };

    match service.sync_day(db, &selection, date).await {
        Ok(report) => HttpResponse::Ok().json(ApiSyncResponse {
            success: true,
            message: format!("Fire data synced successfully for {label} on {date}"),
            totals: report.totals(),
            failed_products: failed_products(&report),
            failed_days: Vec::new(),
        }),
        Err(e) => ingest_error(&e, "Failed to sync fire data"),
    }
}

/// Failed fetches of one sync as `region/PRODUCT`.
fn failed_products(report: &SyncReport) -> Vec<String> {
    report
        .regions
        .iter()
        .flat_map(|r| {
            r.failed_products
                .iter()
                .map(move |p| format!("{}/{}", r.region, p.as_ref()))
        })
        .collect()
}

fn prediction_error(e: &PredictionError, context: &str) -> HttpResponse {
    if e.is_invalid_request() {
        error(StatusCode::BAD_REQUEST, e.to_string())
    } else {
        log::error!("{context}: {e}");
        error(StatusCode::INTERNAL_SERVER_ERROR, context)
    }
}

struct PredictionArgs {
    region: String,
    date: NaiveDate,
    horizon: u32,
}

fn prediction_args(
    state: &AppState,
    region: Option<&str>,
    date: Option<&str>,
    horizon: Option<i64>,
) -> Result<PredictionArgs, HttpResponse> {
    let region = state
        .regions
        .require(region.unwrap_or_default())
        .map_err(|e| error(StatusCode::BAD_REQUEST, e.to_string()))?;
    let date = day_or_today(date)?;
    let horizon = validate_horizon(horizon.unwrap_or_else(|| i64::from(DEFAULT_HORIZON_DAYS)))
        .map_err(|e| error(StatusCode::BAD_REQUEST, e.to_string()))?;

    Ok(PredictionArgs {
        region: region.id.clone(),
        date,
        horizon,
    })
}

/// `GET /api/predictions`
///
/// Stored predictions with tier counts, generated on first request.
pub async fn predictions(
    state: web::Data<AppState>,
    params: web::Query<PredictionQueryParams>,
) -> HttpResponse {
    let args = match prediction_args(
        &state,
        params.region.as_deref(),
        params.date.as_deref(),
        params.horizon,
    ) {
        Ok(args) => args,
        Err(response) => return response,
    };

    match state
        .predictions
        .get_or_generate(
            state.db.as_ref(),
            &args.region,
            args.date,
            args.horizon,
            Utc::now(),
        )
        .await
    {
        Ok(rows) => {
            let tiers = TierCounts::from_predictions(&rows);
            HttpResponse::Ok().json(ApiPredictions {
                metadata: ApiPredictionMetadata {
                    region: args.region,
                    prediction_date: args.date.to_string(),
                    prediction_horizon: args.horizon,
                    total_predictions: rows.len(),
                    high_risk_count: Some(tiers.high),
                    medium_risk_count: Some(tiers.medium),
                    low_risk_count: Some(tiers.low),
                },
                predictions: rows.into_iter().map(ApiPrediction::from).collect(),
            })
        }
        Err(e) => prediction_error(&e, "Failed to fetch predictions"),
    }
}

/// `POST /api/predictions`
///
/// Regenerates predictions and returns the highest-probability cells.
pub async fn generate_predictions(
    state: web::Data<AppState>,
    body: web::Json<PredictionRequest>,
) -> HttpResponse {
    let args = match prediction_args(
        &state,
        body.region.as_deref(),
        body.date.as_deref(),
        body.horizon,
    ) {
        Ok(args) => args,
        Err(response) => return response,
    };

    log::info!("Generating predictions for {} on {}", args.region, args.date);

    match state
        .predictions
        .generate(
            state.db.as_ref(),
            &args.region,
            args.date,
            args.horizon,
            Utc::now(),
        )
        .await
    {
        Ok(rows) => HttpResponse::Ok().json(ApiGeneratedPredictions {
            success: true,
            message: format!("Generated {} predictions for {}", rows.len(), args.region),
            metadata: ApiPredictionMetadata {
                region: args.region,
                prediction_date: args.date.to_string(),
                prediction_horizon: args.horizon,
                total_predictions: rows.len(),
                high_risk_count: None,
                medium_risk_count: None,
                low_risk_count: None,
            },
            predictions: rows
                .into_iter()
                .take(PREVIEW_LEN)
                .map(ApiPrediction::from)
                .collect(),
        }),
        Err(e) => prediction_error(&e, "Failed to generate predictions"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{App, test};
    use async_trait::async_trait;
    use chrono::TimeDelta;
    use fire_map_fire_models::{DayNight, FeedProduct, FireSource};
    use fire_map_geography::RegionTable;
    use fire_map_geography_models::BoundingBox;
    use fire_map_ingest::{FireSyncService, SyncConfig};
    use fire_map_prediction::PredictionService;
    use fire_map_source::{FireFeed, SourceError};
    use fire_map_source_models::{FeedWindow, FireCandidate};
    use serde_json::{Value, json};

    use super::*;
    use crate::test_utils::temp_db;
    use crate::{DEFAULT_REPORT_WINDOW_HOURS, configure};

    /// Returns one detection at the centre of every requested area.
    struct CentreFeed;

    #[async_trait]
    impl FireFeed for CentreFeed {
        async fn fetch_candidates(
            &self,
            product: FeedProduct,
            area: &BoundingBox,
            window: FeedWindow,
        ) -> Result<Vec<FireCandidate>, SourceError> {
            if window.date() == NaiveDate::from_ymd_opt(2024, 10, 2) {
                return Err(SourceError::Upstream {
                    product,
                    status: 503,
                });
            }

            Ok(vec![FireCandidate {
                latitude: f64::midpoint(area.north, area.south),
                longitude: f64::midpoint(area.east, area.west),
                brightness: 330.0,
                scan: 1.0,
                track: 1.0,
                acq_date: window
                    .date()
                    .map_or_else(|| "2024-10-15".to_string(), |d| d.to_string()),
                acq_time: "0530".to_string(),
                satellite: "Terra".to_string(),
                instrument: "MODIS".to_string(),
                confidence: 85.0,
                version: "6.1NRT".to_string(),
                bright_t31: 295.0,
                frp: 12.0,
                daynight: DayNight::Day,
                detection_type: 0,
                source: product.source(),
            }])
        }
    }

    async fn state(name: &str, with_sync: bool) -> (web::Data<AppState>, std::path::PathBuf) {
        let (db, path) = temp_db(name).await;
        let regions = Arc::new(RegionTable::embedded());
        let sync = with_sync.then(|| {
            FireSyncService::new(
                Arc::new(CentreFeed),
                regions.clone(),
                SyncConfig {
                    products: vec![FeedProduct::ModisNrt],
                    day_delay: std::time::Duration::ZERO,
                },
            )
        });

        let state = web::Data::new(AppState {
            db: Arc::from(db),
            sync,
            predictions: PredictionService::density(regions.clone()),
            regions,
            report_window: TimeDelta::hours(DEFAULT_REPORT_WINDOW_HOURS),
        });
        (state, path)
    }

    fn report_body() -> Value {
        json!({
            "latitude": 30.9,
            "longitude": 75.8,
            "intensity": "MEDIUM",
            "smoke_visibility": true,
            "estimated_area": 2.0,
            "description": "Field fire near the canal"
        })
    }

    #[actix_web::test]
    async fn health_reports_connected_store() {
        let (state, path) = state("health", false).await;
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/api/health").to_request())
                .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], "connected");

        std::fs::remove_file(path).ok();
    }

    #[actix_web::test]
    async fn user_report_created_then_conflicts_then_rejects_bad_body() {
        let (state, path) = state("user_fires", false).await;
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let post = |body: Value| {
            test::TestRequest::post()
                .uri("/api/user-fires")
                .set_json(body)
                .to_request()
        };

        let resp = test::call_service(&app, post(report_body())).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(resp).await;
        assert_eq!(created["verified"], false);
        assert_eq!(created["intensity"], "MEDIUM");

        let resp = test::call_service(&app, post(report_body())).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = test::call_service(&app, post(json!({"latitude": "north"}))).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].is_string());

        let mut far_north = report_body();
        far_north["latitude"] = json!(91.0);
        let resp = test::call_service(&app, post(far_north)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/user-fires?region=punjab")
                .to_request(),
        )
        .await;
        let listed: Value = test::read_body_json(resp).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);

        std::fs::remove_file(path).ok();
    }

    #[actix_web::test]
    async fn sync_requires_key_then_fetches_each_region() {
        let (disabled, disabled_path) = state("sync_off", false).await;
        let app = test::init_service(App::new().app_data(disabled).configure(configure)).await;
        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/api/sync").to_request()).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], MISSING_KEY);

        let (enabled, path) = state("sync_on", true).await;
        let app = test::init_service(App::new().app_data(enabled).configure(configure)).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/sync")
                .set_json(json!({"region": "both", "date": "2024-10-15"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["totals"]["inserted"], 2);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/sync?region=punjab")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let stats: Value = test::read_body_json(resp).await;
        assert_eq!(stats["total"], 1);
        assert_eq!(stats["region"], "punjab");

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/sync")
                .set_json(json!({
                    "region": "punjab",
                    "historical": {"startDate": "2024-10-01", "endDate": "2024-10-03"}
                }))
                .to_request(),
        )
        .await;
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["totals"]["inserted"], 2);
        assert_eq!(body["failedDays"], json!(["2024-10-02"]));
        assert_eq!(body["failedProducts"], json!(["2024-10-02 punjab/MODIS_NRT"]));

        std::fs::remove_file(disabled_path).ok();
        std::fs::remove_file(path).ok();
    }

    #[actix_web::test]
    async fn export_validates_format_and_counts_records() {
        let (state, path) = state("export", false).await;
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/user-fires")
                .set_json(report_body())
                .to_request(),
        )
        .await;

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/export?format=xml")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/export?format=json&region=punjab")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["total_count"], 1);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/export?format=csv")
                .to_request(),
        )
        .await;
        assert_eq!(
            resp.headers().get("Content-Disposition").unwrap(),
            "attachment; filename=\"fire-data.csv\""
        );
        let body = test::read_body(resp).await;
        assert_eq!(std::str::from_utf8(&body).unwrap().lines().count(), 2);

        std::fs::remove_file(path).ok();
    }

    #[actix_web::test]
    async fn predictions_validate_region_and_summarize_tiers() {
        let (state, path) = state("predictions", true).await;
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/predictions?region=gujarat")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/sync")
                .set_json(json!({"region": "punjab", "date": "2024-10-15"}))
                .to_request(),
        )
        .await;

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/predictions?region=punjab&date=2024-10-16&horizon=7")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        let meta = &body["metadata"];
        assert_eq!(meta["total_predictions"], 1);
        let tiers = meta["high_risk_count"].as_u64().unwrap()
            + meta["medium_risk_count"].as_u64().unwrap()
            + meta["low_risk_count"].as_u64().unwrap();
        assert_eq!(tiers, 1);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/predictions")
                .set_json(json!({"region": "punjab", "date": "2024-10-16", "horizon": 0}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/predictions")
                .set_json(json!({"region": "punjab", "date": "2024-10-16"}))
                .to_request(),
        )
        .await;
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["metadata"]["total_predictions"], 1);
        assert!(body["metadata"].get("high_risk_count").is_none());

        std::fs::remove_file(path).ok();
    }
}
