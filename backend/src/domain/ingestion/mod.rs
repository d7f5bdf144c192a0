//! Ingestion pipeline: coverage check, bounded fetch, normalisation,
//! boundary filtering, idempotent persistence and coverage recording.
//!
//! Coverage is recorded only after every step succeeds, so a failed call
//! leaves the region eligible for retry.

mod normalize;

use std::sync::Arc;
use std::time::Duration;

use geo::MultiPolygon;
use mockable::Clock;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::coverage::CoverageTracker;
use crate::domain::geometry::point_in_polygon_filter;
use crate::domain::ports::{
    BoundaryRepository, BoundaryRepositoryError, CoverageRepository, FetchRegion, FetchRequest,
    MapDataSource, MapDataSourceError, RawFeature, StoreRepository, StoreRepositoryError,
};
use crate::domain::{
    Boundary, BoundaryDraft, BoundingBox, DedupPolicy, Error, StoreRecord, UpsertOutcome,
};

pub use normalize::{FootprintPolicy, NormalizedBatch, normalize_features, store_tag_filters};

/// Default bounded wait for the upstream fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(180);

/// Deployment-level pipeline settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionSettings {
    /// Store keying policy.
    pub dedup_policy: DedupPolicy,
    /// Footprint handling.
    pub footprint_policy: FootprintPolicy,
    /// Upper bound on the upstream fetch.
    pub fetch_timeout: Duration,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            dedup_policy: DedupPolicy::default(),
            footprint_policy: FootprintPolicy::default(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

/// What to ingest.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestionRequest {
    /// Every store in a bounding box.
    Region(BoundingBox),
    /// Every store strictly inside an administrative boundary.
    Boundary(BoundaryDraft),
}

impl IngestionRequest {
    fn region_geometry(&self) -> MultiPolygon<f64> {
        match self {
            Self::Region(bbox) => MultiPolygon::from(bbox.to_polygon()),
            Self::Boundary(draft) => draft.geometry().clone(),
        }
    }

    fn fetch_region(&self) -> FetchRegion {
        match self {
            Self::Region(bbox) => FetchRegion::BoundingBox(*bbox),
            Self::Boundary(draft) => FetchRegion::Polygon(draft.geometry().clone()),
        }
    }

    fn label(&self) -> String {
        match self {
            Self::Region(bbox) => bbox.to_string(),
            Self::Boundary(draft) => draft.external_id().to_owned(),
        }
    }
}

/// Whether the pipeline did any work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionStatus {
    /// Fetched and persisted.
    Executed,
    /// Region already covered; nothing fetched.
    Skipped,
}

/// A record the repository rejected; the rest of the batch continued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordPersistFailure {
    /// Key the record was upserted under.
    pub key: String,
    /// Repository message.
    pub message: String,
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionOutcome {
    /// Executed or skipped.
    pub status: IngestionStatus,
    /// Raw features returned by the source.
    pub fetched_count: usize,
    /// Records surviving normalisation.
    pub normalized_count: usize,
    /// Records dropped by the boundary filter.
    pub filtered_out_count: usize,
    /// Newly inserted stores.
    pub inserted_count: usize,
    /// Existing stores updated in place.
    pub updated_count: usize,
    /// Per-record persistence failures.
    pub failed_records: Vec<RecordPersistFailure>,
    /// Persisted boundary for boundary-driven runs.
    pub boundary: Option<Boundary>,
}

impl IngestionOutcome {
    fn skipped() -> Self {
        Self {
            status: IngestionStatus::Skipped,
            fetched_count: 0,
            normalized_count: 0,
            filtered_out_count: 0,
            inserted_count: 0,
            updated_count: 0,
            failed_records: Vec::new(),
            boundary: None,
        }
    }

    /// Stores written by this run, new or refreshed.
    pub fn persisted_count(&self) -> usize {
        self.inserted_count + self.updated_count
    }
}

/// Domain service running the ingestion state machine.
#[derive(Clone)]
pub struct IngestionPipeline<S, R, C, B> {
    source: Arc<S>,
    stores: Arc<R>,
    coverage: CoverageTracker<C>,
    boundaries: Arc<B>,
    clock: Arc<dyn Clock>,
    settings: IngestionSettings,
}

impl<S, R, C, B> IngestionPipeline<S, R, C, B> {
    /// Create a pipeline over the given ports.
    pub fn new(
        source: Arc<S>,
        stores: Arc<R>,
        coverage: Arc<C>,
        boundaries: Arc<B>,
        clock: Arc<dyn Clock>,
        settings: IngestionSettings,
    ) -> Self {
        Self {
            source,
            stores,
            coverage: CoverageTracker::new(coverage, Arc::clone(&clock)),
            boundaries,
            clock,
            settings,
        }
    }

    /// Active settings.
    pub fn settings(&self) -> IngestionSettings {
        self.settings
    }
}

impl<S, R, C, B> IngestionPipeline<S, R, C, B>
where
    S: MapDataSource,
    R: StoreRepository,
    C: CoverageRepository,
    B: BoundaryRepository,
{
    /// Run the pipeline for one request.
    pub async fn ingest(&self, request: &IngestionRequest) -> Result<IngestionOutcome, Error> {
        let region = request.region_geometry();
        let label = request.label();

        if self.coverage.is_covered(&region).await? {
            info!(region = %label, "region already covered, skipping fetch");
            return Ok(IngestionOutcome::skipped());
        }

        let features = self.fetch(request).await?;
        let fetched_count = features.len();
        let batch = normalize_features(features, self.settings.footprint_policy);
        let normalized_count = batch.records.len();
        info!(
            region = %label,
            fetched_count,
            normalized_count,
            discarded = batch.discarded,
            duplicates = batch.duplicates,
            "normalised fetched features"
        );

        let (boundary, records) = match request {
            IngestionRequest::Region(_) => (None, batch.records),
            IngestionRequest::Boundary(draft) => {
                let boundary = self
                    .boundaries
                    .upsert(draft, self.clock.utc())
                    .await
                    .map_err(map_boundary_error)?;
                let inside = point_in_polygon_filter(batch.records, draft.geometry());
                let records = inside
                    .into_iter()
                    .map(|record| StoreRecord {
                        boundary_id: Some(boundary.id),
                        ..record
                    })
                    .collect::<Vec<_>>();
                (Some(boundary), records)
            }
        };
        let filtered_out_count = normalized_count - records.len();

        let mut outcome = IngestionOutcome {
            status: IngestionStatus::Executed,
            fetched_count,
            normalized_count,
            filtered_out_count,
            inserted_count: 0,
            updated_count: 0,
            failed_records: Vec::new(),
            boundary,
        };
        self.persist(&records, &mut outcome).await?;

        let store_count = u64::try_from(outcome.persisted_count())
            .map_err(|_| Error::internal("persisted store count exceeds supported range"))?;
        self.coverage.record_covered(&region, store_count).await?;

        info!(
            region = %label,
            inserted = outcome.inserted_count,
            updated = outcome.updated_count,
            failed = outcome.failed_records.len(),
            filtered_out = filtered_out_count,
            "ingestion complete"
        );
        Ok(outcome)
    }

    async fn fetch(&self, request: &IngestionRequest) -> Result<Vec<RawFeature>, Error> {
        let fetch_request = FetchRequest {
            region: request.fetch_region(),
            tags: store_tag_filters(),
        };
        let timeout = self.settings.fetch_timeout;
        match tokio::time::timeout(timeout, self.source.fetch_features(&fetch_request)).await {
            Ok(Ok(features)) => Ok(features),
            Ok(Err(error)) => Err(map_source_error(error)),
            Err(_) => Err(Error::upstream_fetch(format!(
                "map data fetch exceeded {}s",
                timeout.as_secs()
            ))),
        }
    }

    async fn persist(
        &self,
        records: &[StoreRecord],
        outcome: &mut IngestionOutcome,
    ) -> Result<(), Error> {
        for record in records {
            let key = record.key(self.settings.dedup_policy);
            match self.stores.upsert(&key, record).await {
                Ok(UpsertOutcome::Inserted) => outcome.inserted_count += 1,
                Ok(UpsertOutcome::Updated) => outcome.updated_count += 1,
                Err(StoreRepositoryError::Record { key, message }) => {
                    warn!(%key, %message, "skipping store that failed to persist");
                    outcome
                        .failed_records
                        .push(RecordPersistFailure { key, message });
                }
                Err(error) => return Err(map_store_error(error)),
            }
        }
        Ok(())
    }
}

fn map_source_error(error: MapDataSourceError) -> Error {
    let retryable = error.is_retryable();
    Error::upstream_fetch(format!("failed to fetch map data: {error}"))
        .with_details(serde_json::json!({ "retryable": retryable }))
}

fn map_store_error(error: StoreRepositoryError) -> Error {
    Error::persistence(format!("failed to persist stores: {error}"))
}

fn map_boundary_error(error: BoundaryRepositoryError) -> Error {
    match error {
        BoundaryRepositoryError::Connection { message }
        | BoundaryRepositoryError::Query { message } => {
            Error::persistence(format!("failed to persist boundary: {message}"))
        }
    }
}

#[cfg(test)]
mod tests;
