//! Fetch food stores for a bounding box and print an access summary as JSON.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::io;
use std::sync::Arc;

use clap::Parser;
use food_access::config::FoodAccessSettings;
use food_access::domain::ports::{
    BoundaryRepository, CoverageRepository, MapDataSource, StoreRepository,
};
use food_access::domain::{
    AccessibilityReport, BoundingBox, Coordinate, FoodAccessService, IngestionOutcome,
    RequestContext, Store, StoreSummary, store_summary,
};
use food_access::domain::geometry::{CoverageStats, area_km2};
use food_access::outbound::memory::{
    InMemoryBoundaryRepository, InMemoryCoverageRepository, InMemoryStoreRepository,
};
use food_access::outbound::overpass::OverpassHttpSource;
use food_access::outbound::persistence::{
    DbPool, DieselBoundaryRepository, DieselCoverageRepository, DieselStoreRepository, PoolConfig,
};
use geo::MultiPolygon;
use mockable::{Clock, DefaultClock};
use ortho_config::OrthoConfig;
use serde::Serialize;
use tokio::runtime::Builder;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

/// `fetch-region` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "fetch-region",
    about = "Fetch food stores for a bounding box and report food access",
    version
)]
struct CliArgs {
    /// Region as `min_lng,min_lat,max_lng,max_lat`.
    #[arg(
        long = "bbox",
        value_name = "min_lng,min_lat,max_lng,max_lat",
        value_parser = parse_bbox
    )]
    bbox: BoundingBox,
    /// Optional point to analyse, as `lat,lon`.
    #[arg(long = "point", value_name = "lat,lon", value_parser = parse_point)]
    point: Option<Coordinate>,
    /// Report walking-distance coverage of the region.
    #[arg(long = "coverage")]
    coverage: bool,
    /// Database connection URL. Falls back to `FOOD_ACCESS_DATABASE_URL`,
    /// then to in-memory storage.
    #[arg(long = "database-url", value_name = "url")]
    database_url: Option<String>,
}

/// JSON document printed on success.
#[derive(Debug, Serialize)]
struct FetchReport {
    bbox: BoundingBox,
    ingestion: Option<IngestionOutcome>,
    summary: StoreSummary,
    stores: Vec<Store>,
    analysis: Option<AccessibilityReport>,
    coverage: Option<CoverageStats>,
}

fn main() -> io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .with_writer(io::stderr)
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| io::Error::other(format!("create Tokio runtime: {error}")))?;
    runtime.block_on(async_main())
}

async fn async_main() -> io::Result<()> {
    let args = CliArgs::try_parse().map_err(io::Error::other)?;
    let settings = FoodAccessSettings::load_from_iter([OsString::from("fetch-region")])
        .map_err(|error| io::Error::other(format!("load configuration: {error}")))?;

    let endpoint = settings.overpass_endpoint().map_err(io::Error::other)?;
    let source = Arc::new(
        OverpassHttpSource::with_identity(
            endpoint,
            settings.fetch_timeout(),
            settings.overpass_identity(),
        )
        .map_err(|error| io::Error::other(format!("create Overpass client: {error}")))?,
    );
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);

    let database_url = args
        .database_url
        .clone()
        .filter(|url| !url.trim().is_empty())
        .or_else(|| settings.database_url().map(str::to_owned));
    let report = match database_url {
        Some(url) => {
            let pool = DbPool::new(PoolConfig::new(url))
                .await
                .map_err(|error| io::Error::other(format!("create database pool: {error}")))?;
            let service = build_service(
                &settings,
                source,
                Arc::new(DieselStoreRepository::new(pool.clone())),
                Arc::new(DieselCoverageRepository::new(pool.clone())),
                Arc::new(DieselBoundaryRepository::new(pool)),
                clock,
            )?;
            run(&service, &args).await?
        }
        None => {
            let service = build_service(
                &settings,
                source,
                Arc::new(InMemoryStoreRepository::new(Arc::clone(&clock))),
                Arc::new(InMemoryCoverageRepository::new()),
                Arc::new(InMemoryBoundaryRepository::new()),
                clock,
            )?;
            run(&service, &args).await?
        }
    };

    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|error| io::Error::other(format!("render report: {error}")))?;
    println!("{rendered}");
    Ok(())
}

fn build_service<S, R, C, B>(
    settings: &FoodAccessSettings,
    source: Arc<S>,
    stores: Arc<R>,
    coverage: Arc<C>,
    boundaries: Arc<B>,
    clock: Arc<dyn Clock>,
) -> io::Result<FoodAccessService<S, R, C, B>> {
    let ingestion = settings.ingestion_settings().map_err(io::Error::other)?;
    let analysis = settings.analysis_settings().map_err(io::Error::other)?;
    Ok(FoodAccessService::new(
        source, stores, coverage, boundaries, clock, ingestion, analysis,
    ))
}

async fn run<S, R, C, B>(
    service: &FoodAccessService<S, R, C, B>,
    args: &CliArgs,
) -> io::Result<FetchReport>
where
    S: MapDataSource,
    R: StoreRepository,
    C: CoverageRepository,
    B: BoundaryRepository,
{
    let mut ctx = RequestContext::new("fetch-region");
    let stores = service
        .fetch_region(&mut ctx, args.bbox)
        .await
        .map_err(|error| io::Error::other(format!("fetch region failed: {error}")))?;

    let region = MultiPolygon::from(args.bbox.to_polygon());
    let area = area_km2(&region).map_err(|error| io::Error::other(error.to_string()))?;
    let analysis = match args.point {
        Some(point) => Some(
            service
                .analyze_point(&ctx, point.latitude, point.longitude, None)
                .await
                .map_err(|error| io::Error::other(format!("analyse point failed: {error}")))?,
        ),
        None => None,
    };
    let coverage = if args.coverage {
        Some(
            service
                .coverage_report(&ctx, Some(&region), None)
                .await
                .map_err(|error| io::Error::other(format!("coverage failed: {error}")))?,
        )
    } else {
        None
    };

    Ok(FetchReport {
        bbox: args.bbox,
        ingestion: ctx.last_ingestion.take(),
        summary: store_summary(&stores, area),
        stores,
        analysis,
        coverage,
    })
}

fn parse_numbers<const N: usize>(raw: &str, what: &str) -> Result<[f64; N], String> {
    let values = raw
        .split(',')
        .map(str::trim)
        .map(str::parse::<f64>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|error| format!("failed to parse {what} value: {error}"))?;
    values
        .try_into()
        .map_err(|_| format!("{what} must contain exactly {N} comma-separated numeric values"))
}

fn parse_bbox(raw: &str) -> Result<BoundingBox, String> {
    let [min_lng, min_lat, max_lng, max_lat] = parse_numbers::<4>(raw, "bbox")?;
    BoundingBox::try_new(min_lng, min_lat, max_lng, max_lat).map_err(|error| error.to_string())
}

fn parse_point(raw: &str) -> Result<Coordinate, String> {
    let [latitude, longitude] = parse_numbers::<2>(raw, "point")?;
    Coordinate::try_new(latitude, longitude).map_err(|error| error.to_string())
}
