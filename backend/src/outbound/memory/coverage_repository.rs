//! In-memory append-only coverage log.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use geo::{MultiPolygon, Relate};

use crate::domain::ports::{CoverageRecord, CoverageRepository, CoverageRepositoryError};

/// Coverage log kept in process memory.
#[derive(Clone, Default)]
pub struct InMemoryCoverageRepository {
    records: Arc<Mutex<Vec<CoverageRecord>>>,
}

impl InMemoryCoverageRepository {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records appended so far.
    pub fn record_count(&self) -> Result<usize, CoverageRepositoryError> {
        self.records
            .lock()
            .map(|records| records.len())
            .map_err(|_| CoverageRepositoryError::connection("coverage log lock poisoned"))
    }
}

#[async_trait]
impl CoverageRepository for InMemoryCoverageRepository {
    async fn append(
        &self,
        region: &MultiPolygon<f64>,
        store_count: u64,
        fetched_at: DateTime<Utc>,
    ) -> Result<CoverageRecord, CoverageRepositoryError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| CoverageRepositoryError::connection("coverage log lock poisoned"))?;
        let id = i64::try_from(records.len())
            .map_err(|error| CoverageRepositoryError::query(error.to_string()))?
            + 1;
        let record = CoverageRecord {
            id,
            region: region.clone(),
            store_count,
            fetched_at,
        };
        records.push(record.clone());
        Ok(record)
    }

    async fn find_containing(
        &self,
        region: &MultiPolygon<f64>,
    ) -> Result<Option<CoverageRecord>, CoverageRepositoryError> {
        if region.0.is_empty() {
            return Ok(None);
        }
        let records = self
            .records
            .lock()
            .map_err(|_| CoverageRepositoryError::connection("coverage log lock poisoned"))?;
        // Newest first so callers see the latest fetch time.
        Ok(records
            .iter()
            .rev()
            .find(|record| record.region.relate(region).is_contains())
            .cloned())
    }
}
