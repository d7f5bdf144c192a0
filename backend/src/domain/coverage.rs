//! Coverage tracker: remembers which regions have already been fetched.
//!
//! Containment is conservative. A query region counts as covered only when
//! one recorded region contains it entirely; partial overlaps and unions of
//! several records do not count.

use std::sync::Arc;

use geo::MultiPolygon;
use mockable::Clock;
use tracing::debug;

use crate::domain::Error;
use crate::domain::ports::{CoverageRecord, CoverageRepository, CoverageRepositoryError};

/// Domain service over a [`CoverageRepository`].
#[derive(Clone)]
pub struct CoverageTracker<C> {
    repo: Arc<C>,
    clock: Arc<dyn Clock>,
}

impl<C> CoverageTracker<C> {
    /// Create a tracker.
    pub fn new(repo: Arc<C>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }
}

impl<C> CoverageTracker<C>
where
    C: CoverageRepository,
{
    /// Whether a recorded region fully contains `region`.
    pub async fn is_covered(&self, region: &MultiPolygon<f64>) -> Result<bool, Error> {
        let found = self
            .repo
            .find_containing(region)
            .await
            .map_err(map_coverage_error)?;
        if let Some(record) = &found {
            debug!(record_id = record.id, "region already covered");
        }
        Ok(found.is_some())
    }

    /// Append a coverage record stamped with the current time.
    pub async fn record_covered(
        &self,
        region: &MultiPolygon<f64>,
        store_count: u64,
    ) -> Result<CoverageRecord, Error> {
        self.repo
            .append(region, store_count, self.clock.utc())
            .await
            .map_err(map_coverage_error)
    }
}

pub(crate) fn map_coverage_error(error: CoverageRepositoryError) -> Error {
    match error {
        CoverageRepositoryError::Connection { message }
        | CoverageRepositoryError::Query { message } => {
            Error::persistence(format!("failed to access coverage records: {message}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BoundingBox;
    use crate::domain::ErrorCode;
    use crate::domain::ports::MockCoverageRepository;
    use crate::domain::test_support::{fixture_clock, fixture_timestamp};
    use rstest::rstest;

    fn region() -> MultiPolygon<f64> {
        let bbox = BoundingBox::try_new(-75.2, 39.9, -75.1, 40.0).expect("bbox");
        MultiPolygon::from(bbox.to_polygon())
    }

    #[rstest]
    #[tokio::test]
    async fn covered_when_repository_finds_container() {
        let mut repo = MockCoverageRepository::new();
        repo.expect_find_containing().times(1).return_once(|region| {
            Ok(Some(CoverageRecord {
                id: 4,
                region: region.clone(),
                store_count: 2,
                fetched_at: fixture_timestamp(),
            }))
        });
        let tracker = CoverageTracker::new(Arc::new(repo), fixture_clock());
        assert!(tracker.is_covered(&region()).await.expect("query"));
    }

    #[rstest]
    #[tokio::test]
    async fn record_uses_clock_time() {
        let mut repo = MockCoverageRepository::new();
        repo.expect_append()
            .withf(|_, count, at| *count == 5 && *at == fixture_timestamp())
            .times(1)
            .return_once(|region, store_count, fetched_at| {
                Ok(CoverageRecord {
                    id: 1,
                    region: region.clone(),
                    store_count,
                    fetched_at,
                })
            });
        let tracker = CoverageTracker::new(Arc::new(repo), fixture_clock());
        let record = tracker.record_covered(&region(), 5).await.expect("record");
        assert_eq!(record.fetched_at, fixture_timestamp());
    }

    #[rstest]
    #[tokio::test]
    async fn repository_failures_become_persistence_errors() {
        let mut repo = MockCoverageRepository::new();
        repo.expect_find_containing()
            .return_once(|_| Err(CoverageRepositoryError::connection("refused")));
        let tracker = CoverageTracker::new(Arc::new(repo), fixture_clock());
        let error = tracker.is_covered(&region()).await.expect_err("must fail");
        assert_eq!(error.code(), ErrorCode::Persistence);
    }
}
