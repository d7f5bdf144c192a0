//! Exposed food-access interface composing ingestion, repositories and
//! the accessibility analyser.

use std::sync::Arc;

use geo::MultiPolygon;
use mockable::Clock;
use tracing::{debug, info, warn};

use crate::domain::accessibility::{AccessibilityReport, analyze, coverage_percentage};
use crate::domain::geometry::{CoverageStats, DistanceMetric, point_in_polygon_filter};
use crate::domain::ingestion::{
    IngestionOutcome, IngestionPipeline, IngestionRequest, IngestionSettings,
};
use crate::domain::ports::{
    BoundaryRepository, CoverageRepository, MapDataSource, StoreRepository, StoreRepositoryError,
};
use crate::domain::{Boundary, BoundaryDraft, BoundingBox, Coordinate, Error, Store};

/// Caller-scoped state threaded through service calls.
///
/// Replaces any notion of process-wide "current region": each caller owns
/// its context and passes it explicitly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    /// Correlation id for logs.
    pub request_id: String,
    /// Region last fetched by this caller.
    pub region: Option<BoundingBox>,
    /// Boundary last fetched by this caller.
    pub boundary: Option<Boundary>,
    /// Outcome of the caller's most recent ingestion.
    pub last_ingestion: Option<IngestionOutcome>,
}

impl RequestContext {
    /// Fresh context with a correlation id.
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            ..Self::default()
        }
    }
}

/// Analysis defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisSettings {
    /// Walking distance used for coverage, metres.
    pub walk_radius_meters: f64,
    /// Default counting radius for point analysis, km.
    pub search_radius_km: f64,
    /// Candidate radius when no region is loaded, km.
    pub nearest_search_radius_km: f64,
    /// Metric for repository radius queries and for point analysis.
    pub distance_metric: DistanceMetric,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            walk_radius_meters: 1000.0,
            search_radius_km: 1.0,
            nearest_search_radius_km: 10.0,
            distance_metric: DistanceMetric::Geodesic,
        }
    }
}

/// Service behind the public operations.
#[derive(Clone)]
pub struct FoodAccessService<S, R, C, B> {
    pipeline: IngestionPipeline<S, R, C, B>,
    stores: Arc<R>,
    boundaries: Arc<B>,
    settings: AnalysisSettings,
}

impl<S, R, C, B> FoodAccessService<S, R, C, B> {
    /// Wire the service over the given adapters.
    pub fn new(
        source: Arc<S>,
        stores: Arc<R>,
        coverage: Arc<C>,
        boundaries: Arc<B>,
        clock: Arc<dyn Clock>,
        ingestion: IngestionSettings,
        settings: AnalysisSettings,
    ) -> Self {
        let pipeline = IngestionPipeline::new(
            source,
            Arc::clone(&stores),
            coverage,
            Arc::clone(&boundaries),
            clock,
            ingestion,
        );
        info!(
            distance_metric = settings.distance_metric.as_str(),
            dedup_policy = ?ingestion.dedup_policy,
            footprint_policy = ?ingestion.footprint_policy,
            "food access service configured"
        );
        Self {
            pipeline,
            stores,
            boundaries,
            settings,
        }
    }

    /// Active analysis settings.
    pub fn settings(&self) -> AnalysisSettings {
        self.settings
    }
}

impl<S, R, C, B> FoodAccessService<S, R, C, B>
where
    S: MapDataSource,
    R: StoreRepository,
    C: CoverageRepository,
    B: BoundaryRepository,
{
    /// Ingest `bbox` if needed, then return every store strictly inside it.
    pub async fn fetch_region(
        &self,
        ctx: &mut RequestContext,
        bbox: BoundingBox,
    ) -> Result<Vec<Store>, Error> {
        let outcome = self.pipeline.ingest(&IngestionRequest::Region(bbox)).await?;
        let stores = self.stores.find_by_bbox(&bbox).await.map_err(map_store_error)?;
        debug!(request_id = %ctx.request_id, store_count = stores.len(), "region loaded");
        ctx.region = Some(bbox);
        ctx.last_ingestion = Some(outcome);
        Ok(stores)
    }

    /// Ingest a boundary if needed, then return every store strictly inside it.
    pub async fn fetch_boundary(
        &self,
        ctx: &mut RequestContext,
        draft: BoundaryDraft,
    ) -> Result<Vec<Store>, Error> {
        let bbox = draft.bbox()?;
        let external_id = draft.external_id().to_owned();
        let geometry = draft.geometry().clone();
        let mut outcome = self
            .pipeline
            .ingest(&IngestionRequest::Boundary(draft))
            .await?;

        let boundary = match outcome.boundary.clone() {
            Some(boundary) => Some(boundary),
            None => self
                .boundaries
                .find_by_external_id(&external_id)
                .await
                .map_err(|error| Error::persistence(format!("failed to load boundary: {error}")))?,
        };
        outcome.boundary.clone_from(&boundary);

        let candidates = self.stores.find_by_bbox(&bbox).await.map_err(map_store_error)?;
        let stores = point_in_polygon_filter(candidates, &geometry);
        debug!(
            request_id = %ctx.request_id,
            boundary = %external_id,
            store_count = stores.len(),
            "boundary loaded"
        );
        ctx.region = Some(bbox);
        ctx.boundary = boundary;
        ctx.last_ingestion = Some(outcome);
        Ok(stores)
    }

    /// Nearest store, count in range and access class for a point.
    ///
    /// Candidates come from the caller's loaded region when present,
    /// otherwise from a repository radius query.
    pub async fn analyze_point(
        &self,
        ctx: &RequestContext,
        latitude: f64,
        longitude: f64,
        radius_km: Option<f64>,
    ) -> Result<AccessibilityReport, Error> {
        let point = Coordinate::try_new(latitude, longitude)?;
        let radius_km = radius_km.unwrap_or(self.settings.search_radius_km);
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(Error::validation("radius must be positive and finite"));
        }

        let candidates = match ctx.region {
            Some(region) => self.stores.find_by_bbox(&region).await,
            None => self
                .stores
                .find_within_radius(
                    point,
                    self.settings.nearest_search_radius_km.max(radius_km),
                    self.settings.distance_metric,
                )
                .await
                .map(|found| found.into_iter().map(|entry| entry.store).collect()),
        }
        .map_err(map_store_error)?;

        let report = analyze(point, &candidates, radius_km, self.settings.distance_metric);
        info!(
            request_id = %ctx.request_id,
            latitude,
            longitude,
            count = report.count_within_radius,
            classification = report.classification.label(),
            "point analysed"
        );
        Ok(report)
    }

    /// Share of a boundary within walking distance of any store.
    ///
    /// Uses `boundary` when given, else the caller's loaded boundary.
    pub async fn coverage_report(
        &self,
        ctx: &RequestContext,
        boundary: Option<&MultiPolygon<f64>>,
        radius_meters: Option<f64>,
    ) -> Result<CoverageStats, Error> {
        let geometry = boundary
            .or_else(|| ctx.boundary.as_ref().map(|loaded| &loaded.geometry))
            .ok_or_else(|| Error::validation("no boundary supplied or loaded for coverage"))?;
        let radius_meters = radius_meters.unwrap_or(self.settings.walk_radius_meters);
        let bbox = match BoundingBox::of_geometry(geometry) {
            Ok(bbox) => bbox,
            Err(error) => {
                warn!(
                    request_id = %ctx.request_id,
                    %error,
                    "boundary has no usable extent, reporting zero coverage"
                );
                return Ok(CoverageStats::default());
            }
        };
        let candidates = self.stores.find_by_bbox(&bbox).await.map_err(map_store_error)?;
        let stores = point_in_polygon_filter(candidates, geometry);
        let stats = coverage_percentage(&stores, geometry, radius_meters);
        info!(
            request_id = %ctx.request_id,
            pct = stats.pct,
            covered_km2 = stats.covered_km2,
            total_km2 = stats.total_km2,
            "coverage computed"
        );
        Ok(stats)
    }
}

fn map_store_error(error: StoreRepositoryError) -> Error {
    Error::persistence(format!("failed to query stores: {error}"))
}

#[cfg(test)]
#[path = "food_access_tests.rs"]
mod tests;
