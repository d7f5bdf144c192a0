//! Driven port for administrative boundaries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::define_port_error;
use crate::domain::{Boundary, BoundaryDraft};

define_port_error! {
    /// Errors raised by boundary persistence.
    pub enum BoundaryRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "boundary repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "boundary repository query failed: {message}",
    }
}

/// Port for storing boundaries keyed by external id.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BoundaryRepository: Send + Sync {
    /// Insert, or replace geometry and refresh `fetched_at` on re-fetch.
    async fn upsert(
        &self,
        draft: &BoundaryDraft,
        fetched_at: DateTime<Utc>,
    ) -> Result<Boundary, BoundaryRepositoryError>;

    /// Boundary with the given external id.
    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Boundary>, BoundaryRepositoryError>;
}

/// Fixture implementation that echoes drafts back with id `0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureBoundaryRepository;

#[async_trait]
impl BoundaryRepository for FixtureBoundaryRepository {
    async fn upsert(
        &self,
        draft: &BoundaryDraft,
        fetched_at: DateTime<Utc>,
    ) -> Result<Boundary, BoundaryRepositoryError> {
        Ok(Boundary::from_draft(0, draft.clone(), fetched_at))
    }

    async fn find_by_external_id(
        &self,
        _external_id: &str,
    ) -> Result<Option<Boundary>, BoundaryRepositoryError> {
        Ok(None)
    }
}
