//! Driven port for persisting and querying food stores.

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::geometry::DistanceMetric;
use crate::domain::{
    BoundingBox, Coordinate, Store, StoreId, StoreKey, StoreRecord, StoreTriplet,
    StoreWithDistance, UpsertOutcome,
};

define_port_error! {
    /// Errors raised by store persistence.
    ///
    /// `Connection` and `Query` abort a batch; `Record` is scoped to one
    /// store and callers may skip it.
    pub enum StoreRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "store repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "store repository query failed: {message}",
        /// A single record was rejected.
        Record { key: String, message: String } =>
            "store record {key} rejected: {message}",
    }
}

/// Port for reading and writing stores.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoreRepository: Send + Sync {
    /// Whether a store with `key` exists.
    async fn exists(&self, key: &StoreKey) -> Result<bool, StoreRepositoryError>;

    /// Insert `record`, or update the row matching `key` in place.
    ///
    /// The update timestamp is refreshed even when attributes are unchanged.
    async fn upsert(
        &self,
        key: &StoreKey,
        record: &StoreRecord,
    ) -> Result<UpsertOutcome, StoreRepositoryError>;

    /// Look up a store id by name, location and boundary.
    async fn get_id(&self, triplet: &StoreTriplet) -> Result<Option<StoreId>, StoreRepositoryError>;

    /// Stores strictly inside `bbox`.
    async fn find_by_bbox(&self, bbox: &BoundingBox) -> Result<Vec<Store>, StoreRepositoryError>;

    /// Stores with `distance <= radius_km`, nearest first.
    async fn find_within_radius(
        &self,
        center: Coordinate,
        radius_km: f64,
        metric: DistanceMetric,
    ) -> Result<Vec<StoreWithDistance>, StoreRepositoryError>;

    /// Total number of stores.
    async fn count(&self) -> Result<u64, StoreRepositoryError>;
}

/// Fixture implementation for tests that do not exercise persistence.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureStoreRepository;

#[async_trait]
impl StoreRepository for FixtureStoreRepository {
    async fn exists(&self, _key: &StoreKey) -> Result<bool, StoreRepositoryError> {
        Ok(false)
    }

    async fn upsert(
        &self,
        _key: &StoreKey,
        _record: &StoreRecord,
    ) -> Result<UpsertOutcome, StoreRepositoryError> {
        Ok(UpsertOutcome::Inserted)
    }

    async fn get_id(
        &self,
        _triplet: &StoreTriplet,
    ) -> Result<Option<StoreId>, StoreRepositoryError> {
        Ok(None)
    }

    async fn find_by_bbox(&self, _bbox: &BoundingBox) -> Result<Vec<Store>, StoreRepositoryError> {
        Ok(Vec::new())
    }

    async fn find_within_radius(
        &self,
        _center: Coordinate,
        _radius_km: f64,
        _metric: DistanceMetric,
    ) -> Result<Vec<StoreWithDistance>, StoreRepositoryError> {
        Ok(Vec::new())
    }

    async fn count(&self) -> Result<u64, StoreRepositoryError> {
        Ok(0)
    }
}
