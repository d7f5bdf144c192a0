//! In-memory boundary store keyed by external id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::ports::{BoundaryRepository, BoundaryRepositoryError};
use crate::domain::{Boundary, BoundaryDraft, BoundaryId};

#[derive(Default)]
struct BoundaryTable {
    rows: HashMap<String, Boundary>,
    next_id: BoundaryId,
}

/// Boundary repository kept in process memory.
#[derive(Clone, Default)]
pub struct InMemoryBoundaryRepository {
    table: Arc<Mutex<BoundaryTable>>,
}

impl InMemoryBoundaryRepository {
    /// Empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BoundaryRepository for InMemoryBoundaryRepository {
    async fn upsert(
        &self,
        draft: &BoundaryDraft,
        fetched_at: DateTime<Utc>,
    ) -> Result<Boundary, BoundaryRepositoryError> {
        let mut table = self
            .table
            .lock()
            .map_err(|_| BoundaryRepositoryError::connection("boundary table lock poisoned"))?;
        let id = match table.rows.get(draft.external_id()) {
            Some(existing) => existing.id,
            None => {
                table.next_id += 1;
                table.next_id
            }
        };
        let boundary = Boundary::from_draft(id, draft.clone(), fetched_at);
        table
            .rows
            .insert(boundary.external_id.clone(), boundary.clone());
        Ok(boundary)
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Boundary>, BoundaryRepositoryError> {
        let table = self
            .table
            .lock()
            .map_err(|_| BoundaryRepositoryError::connection("boundary table lock poisoned"))?;
        Ok(table.rows.get(external_id).cloned())
    }
}
