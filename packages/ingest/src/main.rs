#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the fire data ingestion tool.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use fire_map_database::{db, detections};
use fire_map_geography::RegionTable;
use fire_map_geography_models::RegionSelection;
use fire_map_ingest::{FireSyncService, SyncConfig, fire_stats};
use fire_map_ingest_models::SyncReport;
use fire_map_source::{FirmsClient, FirmsConfig};

#[derive(Parser)]
#[command(name = "fire_map_ingest", about = "Satellite fire data ingestion tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync a single day (default: today, UTC)
    Sync {
        /// Region id, or `both`/`all` for every region
        #[arg(long, default_value = "both")]
        region: String,
        /// Day to sync (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Sync every day in an inclusive date range, one day at a time
    Backfill {
        /// First day (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
        /// Last day (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,
        /// Region id, or `both`/`all` for every region
        #[arg(long, default_value = "both")]
        region: String,
    },
    /// Sync the trailing N days in one request per product
    Recent {
        /// Region id, or `both`/`all` for every region
        #[arg(long, default_value = "both")]
        region: String,
        /// Number of days (1-10)
        #[arg(long, default_value = "3")]
        days: u8,
    },
    /// Print aggregate detection counts
    Stats {
        /// Region id (omit for all regions)
        #[arg(long)]
        region: Option<String>,
    },
    /// Print stored detection counts per source
    SourceCounts,
    /// List configured regions
    Regions,
}

fn print_sync_summary(report: &SyncReport) {
    let totals = report.totals();
    println!(
        "Fetched {}, new {}, updated {}, unchanged {}, failed {}",
        totals.fetched, totals.inserted, totals.updated, totals.unchanged, totals.failed
    );
    for region in &report.regions {
        if !region.failed_products.is_empty() {
            println!(
                "  {}: failed products: {}",
                region.region,
                region
                    .failed_products
                    .iter()
                    .map(AsRef::as_ref)
                    .collect::<Vec<&str>>()
                    .join(", ")
            );
        }
    }
}

fn sync_service(regions: Arc<RegionTable>) -> Result<FireSyncService, Box<dyn std::error::Error>> {
    let client = FirmsClient::new(FirmsConfig::from_env())?;
    Ok(FireSyncService::new(
        Arc::new(client),
        regions,
        SyncConfig::from_env(),
    ))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();
    let regions = Arc::new(RegionTable::embedded());

    match cli.command {
        Commands::Sync { region, date } => {
            let db = db::open_from_env().await?;
            let service = sync_service(regions)?;
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            let report = service
                .sync_day(db.as_ref(), &RegionSelection::parse(&region), date)
                .await?;
            print_sync_summary(&report);
        }
        Commands::Backfill { start, end, region } => {
            let db = db::open_from_env().await?;
            let service = sync_service(regions)?;
            let report = service
                .backfill(db.as_ref(), &RegionSelection::parse(&region), start, end)
                .await?;
            let totals = report.totals();
            println!(
                "{} day(s): fetched {}, new {}, updated {}",
                report.days.len(),
                totals.fetched,
                totals.inserted,
                totals.updated
            );
            if !report.failed_days.is_empty() {
                println!(
                    "Failed days: {}",
                    report
                        .failed_days
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
        }
        Commands::Recent { region, days } => {
            let db = db::open_from_env().await?;
            let service = sync_service(regions)?;
            let report = service
                .sync_recent(db.as_ref(), &RegionSelection::parse(&region), days)
                .await?;
            print_sync_summary(&report);
        }
        Commands::Stats { region } => {
            let db = db::open_from_env().await?;
            let stats = fire_stats(
                db.as_ref(),
                &regions,
                region.as_deref(),
                Utc::now().date_naive(),
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::SourceCounts => {
            let db = db::open_from_env().await?;
            let counts = detections::counts_by_source(db.as_ref()).await?;
            println!("{:<8} {:>10}  DESCRIPTION", "SOURCE", "COUNT");
            println!("{}", "-".repeat(70));
            for entry in &counts {
                println!(
                    "{:<8} {:>10}  {}",
                    entry.source.as_ref(),
                    entry.count,
                    entry.source.description()
                );
            }
        }
        Commands::Regions => {
            println!("{:<10} {:<12} BOUNDS (W,S,E,N)", "ID", "NAME");
            println!("{}", "-".repeat(50));
            for region in regions.iter() {
                println!(
                    "{:<10} {:<12} {}",
                    region.id,
                    region.name,
                    region.bounds.area_string()
                );
            }
        }
    }

    Ok(())
}
