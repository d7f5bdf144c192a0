//! Driven port for the append-only log of covered regions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use geo::MultiPolygon;

use super::define_port_error;

/// One previously fetched region.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageRecord {
    /// Repository id.
    pub id: i64,
    /// Covered region in WGS84.
    pub region: MultiPolygon<f64>,
    /// Stores found when the region was fetched.
    pub store_count: u64,
    /// When the fetch completed.
    pub fetched_at: DateTime<Utc>,
}

define_port_error! {
    /// Errors raised by coverage persistence.
    pub enum CoverageRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "coverage repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "coverage repository query failed: {message}",
    }
}

/// Port for recording and querying covered regions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CoverageRepository: Send + Sync {
    /// Append a record. Existing records are never merged or updated.
    async fn append(
        &self,
        region: &MultiPolygon<f64>,
        store_count: u64,
        fetched_at: DateTime<Utc>,
    ) -> Result<CoverageRecord, CoverageRepositoryError>;

    /// Any record whose region fully contains `region`.
    async fn find_containing(
        &self,
        region: &MultiPolygon<f64>,
    ) -> Result<Option<CoverageRecord>, CoverageRepositoryError>;
}

/// Fixture implementation that never reports coverage.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureCoverageRepository;

#[async_trait]
impl CoverageRepository for FixtureCoverageRepository {
    async fn append(
        &self,
        region: &MultiPolygon<f64>,
        store_count: u64,
        fetched_at: DateTime<Utc>,
    ) -> Result<CoverageRecord, CoverageRepositoryError> {
        Ok(CoverageRecord {
            id: 0,
            region: region.clone(),
            store_count,
            fetched_at,
        })
    }

    async fn find_containing(
        &self,
        _region: &MultiPolygon<f64>,
    ) -> Result<Option<CoverageRecord>, CoverageRepositoryError> {
        Ok(None)
    }
}
