//! Behavioural unit coverage for the ingestion pipeline.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use mockall::Sequence;
use rstest::{fixture, rstest};

use super::*;
use crate::domain::ErrorCode;
use crate::domain::ports::{
    CoverageRecord, MockBoundaryRepository, MockCoverageRepository, MockMapDataSource,
    MockStoreRepository, RawGeometry,
};
use crate::domain::test_support::{fixture_clock, fixture_timestamp};
use crate::domain::{Coordinate, StoreKey};

type TestPipeline<S> =
    IngestionPipeline<S, MockStoreRepository, MockCoverageRepository, MockBoundaryRepository>;

struct Mocks {
    source: MockMapDataSource,
    stores: MockStoreRepository,
    coverage: MockCoverageRepository,
    boundaries: MockBoundaryRepository,
}

#[fixture]
fn mocks() -> Mocks {
    Mocks {
        source: MockMapDataSource::new(),
        stores: MockStoreRepository::new(),
        coverage: MockCoverageRepository::new(),
        boundaries: MockBoundaryRepository::new(),
    }
}

fn pipeline(mocks: Mocks, settings: IngestionSettings) -> TestPipeline<MockMapDataSource> {
    IngestionPipeline::new(
        Arc::new(mocks.source),
        Arc::new(mocks.stores),
        Arc::new(mocks.coverage),
        Arc::new(mocks.boundaries),
        fixture_clock(),
        settings,
    )
}

fn bbox() -> BoundingBox {
    BoundingBox::try_new(-75.18, 39.94, -75.15, 39.96).expect("valid bbox")
}

fn shop(id: &str, lat: f64, lon: f64) -> RawFeature {
    RawFeature {
        external_id: id.to_owned(),
        geometry: RawGeometry::Point(Coordinate::new(lat, lon)),
        tags: BTreeMap::from([
            ("shop".to_owned(), "supermarket".to_owned()),
            ("name".to_owned(), format!("Store {id}")),
        ]),
    }
}

fn coverage_record(region: &MultiPolygon<f64>, store_count: u64) -> CoverageRecord {
    CoverageRecord {
        id: 1,
        region: region.clone(),
        store_count,
        fetched_at: fixture_timestamp(),
    }
}

fn expect_uncovered(coverage: &mut MockCoverageRepository) {
    coverage
        .expect_find_containing()
        .times(1)
        .return_once(|_| Ok(None));
}

#[rstest]
#[tokio::test]
async fn covered_region_is_skipped_without_fetching(mut mocks: Mocks) {
    mocks
        .coverage
        .expect_find_containing()
        .times(1)
        .return_once(|region| Ok(Some(coverage_record(region, 4))));
    mocks.source.expect_fetch_features().times(0);
    mocks.stores.expect_upsert().times(0);
    mocks.coverage.expect_append().times(0);

    let outcome = pipeline(mocks, IngestionSettings::default())
        .ingest(&IngestionRequest::Region(bbox()))
        .await
        .expect("skip succeeds");

    assert_eq!(outcome.status, IngestionStatus::Skipped);
    assert_eq!(outcome.inserted_count, 0);
}

#[rstest]
#[tokio::test]
async fn executes_and_records_coverage_with_persisted_count(mut mocks: Mocks) {
    expect_uncovered(&mut mocks.coverage);
    mocks
        .source
        .expect_fetch_features()
        .times(1)
        .withf(|request| {
            matches!(request.region, FetchRegion::BoundingBox(_))
                && request.tags.iter().any(|filter| filter.key == "shop")
        })
        .return_once(|_| {
            Ok(vec![
                shop("node/1", 39.95, -75.17),
                shop("node/2", 39.95, -75.16),
                shop("node/1", 39.95, -75.17),
            ])
        });
    let mut seq = Sequence::new();
    mocks
        .stores
        .expect_upsert()
        .withf(|key, _| *key == StoreKey::ExternalId("node/1".to_owned()))
        .times(1)
        .in_sequence(&mut seq)
        .return_once(|_, _| Ok(UpsertOutcome::Inserted));
    mocks
        .stores
        .expect_upsert()
        .withf(|key, _| *key == StoreKey::ExternalId("node/2".to_owned()))
        .times(1)
        .in_sequence(&mut seq)
        .return_once(|_, _| Ok(UpsertOutcome::Updated));
    mocks
        .coverage
        .expect_append()
        .withf(|_, count, at| *count == 2 && *at == fixture_timestamp())
        .times(1)
        .return_once(|region, count, _| Ok(coverage_record(region, count)));

    let outcome = pipeline(mocks, IngestionSettings::default())
        .ingest(&IngestionRequest::Region(bbox()))
        .await
        .expect("ingest succeeds");

    assert_eq!(outcome.status, IngestionStatus::Executed);
    assert_eq!(outcome.fetched_count, 3);
    assert_eq!(outcome.normalized_count, 2);
    assert_eq!(outcome.inserted_count, 1);
    assert_eq!(outcome.updated_count, 1);
    assert!(outcome.failed_records.is_empty());
}

#[rstest]
#[tokio::test]
async fn source_failure_records_nothing(mut mocks: Mocks) {
    expect_uncovered(&mut mocks.coverage);
    mocks
        .source
        .expect_fetch_features()
        .times(1)
        .return_once(|_| Err(MapDataSourceError::rate_limited("429")));
    mocks.stores.expect_upsert().times(0);
    mocks.coverage.expect_append().times(0);

    let error = pipeline(mocks, IngestionSettings::default())
        .ingest(&IngestionRequest::Region(bbox()))
        .await
        .expect_err("fetch failure propagates");

    assert_eq!(error.code(), ErrorCode::UpstreamFetch);
    assert_eq!(
        error.details().and_then(|details| details.get("retryable")),
        Some(&serde_json::Value::Bool(true))
    );
}

struct StalledSource;

#[async_trait]
impl MapDataSource for StalledSource {
    async fn fetch_features(
        &self,
        _request: &FetchRequest,
    ) -> Result<Vec<RawFeature>, MapDataSourceError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Vec::new())
    }
}

#[rstest]
#[tokio::test]
async fn fetch_exceeding_timeout_fails_without_coverage(mut mocks: Mocks) {
    expect_uncovered(&mut mocks.coverage);
    mocks.coverage.expect_append().times(0);
    mocks.stores.expect_upsert().times(0);
    let settings = IngestionSettings {
        fetch_timeout: Duration::from_millis(20),
        ..IngestionSettings::default()
    };
    let pipeline: TestPipeline<StalledSource> = IngestionPipeline::new(
        Arc::new(StalledSource),
        Arc::new(mocks.stores),
        Arc::new(mocks.coverage),
        Arc::new(mocks.boundaries),
        fixture_clock(),
        settings,
    );

    let error = pipeline
        .ingest(&IngestionRequest::Region(bbox()))
        .await
        .expect_err("timeout propagates");

    assert_eq!(error.code(), ErrorCode::UpstreamFetch);
}

#[rstest]
#[tokio::test]
async fn record_failures_are_skipped(mut mocks: Mocks) {
    expect_uncovered(&mut mocks.coverage);
    mocks.source.expect_fetch_features().return_once(|_| {
        Ok(vec![
            shop("node/1", 39.95, -75.17),
            shop("node/2", 39.95, -75.16),
        ])
    });
    mocks.stores.expect_upsert().times(2).returning(|key, _| match key {
        StoreKey::ExternalId(id) if id == "node/1" => {
            Err(StoreRepositoryError::record(id.clone(), "check constraint"))
        }
        _ => Ok(UpsertOutcome::Inserted),
    });
    mocks
        .coverage
        .expect_append()
        .withf(|_, count, _| *count == 1)
        .times(1)
        .return_once(|region, count, _| Ok(coverage_record(region, count)));

    let outcome = pipeline(mocks, IngestionSettings::default())
        .ingest(&IngestionRequest::Region(bbox()))
        .await
        .expect("partial success");

    assert_eq!(outcome.inserted_count, 1);
    assert_eq!(
        outcome.failed_records,
        vec![RecordPersistFailure {
            key: "node/1".to_owned(),
            message: "check constraint".to_owned(),
        }]
    );
}

#[rstest]
#[tokio::test]
async fn connection_failure_aborts_before_coverage(mut mocks: Mocks) {
    expect_uncovered(&mut mocks.coverage);
    mocks
        .source
        .expect_fetch_features()
        .return_once(|_| Ok(vec![shop("node/1", 39.95, -75.17)]));
    mocks
        .stores
        .expect_upsert()
        .times(1)
        .return_once(|_, _| Err(StoreRepositoryError::connection("pool exhausted")));
    mocks.coverage.expect_append().times(0);

    let error = pipeline(mocks, IngestionSettings::default())
        .ingest(&IngestionRequest::Region(bbox()))
        .await
        .expect_err("connection failure aborts");

    assert_eq!(error.code(), ErrorCode::Persistence);
}

#[rstest]
#[tokio::test]
async fn boundary_runs_persist_boundary_first_and_filter_strictly(mut mocks: Mocks) {
    let draft = BoundaryDraft::try_new("relation/9", "Center City", bbox().to_polygon())
        .expect("valid boundary");
    expect_uncovered(&mut mocks.coverage);
    mocks
        .source
        .expect_fetch_features()
        .withf(|request| matches!(request.region, FetchRegion::Polygon(_)))
        .return_once(|_| {
            Ok(vec![
                shop("node/1", 39.95, -75.17),
                shop("node/2", 39.96, -75.16),
                shop("node/3", 39.99, -75.16),
            ])
        });
    let mut seq = Sequence::new();
    mocks
        .boundaries
        .expect_upsert()
        .times(1)
        .in_sequence(&mut seq)
        .return_once(|draft, at| Ok(Boundary::from_draft(42, draft.clone(), at)));
    mocks
        .stores
        .expect_upsert()
        .withf(|_, record| record.external_id == "node/1" && record.boundary_id == Some(42))
        .times(1)
        .in_sequence(&mut seq)
        .return_once(|_, _| Ok(UpsertOutcome::Inserted));
    mocks
        .coverage
        .expect_append()
        .withf(|_, count, _| *count == 1)
        .times(1)
        .in_sequence(&mut seq)
        .return_once(|region, count, _| Ok(coverage_record(region, count)));

    let outcome = pipeline(mocks, IngestionSettings::default())
        .ingest(&IngestionRequest::Boundary(draft))
        .await
        .expect("boundary ingest succeeds");

    // node/2 sits on the top edge, node/3 well outside.
    assert_eq!(outcome.filtered_out_count, 2);
    assert_eq!(outcome.boundary.map(|boundary| boundary.id), Some(42));
}

#[rstest]
#[tokio::test]
async fn triplet_policy_keys_by_name_location_boundary(mut mocks: Mocks) {
    expect_uncovered(&mut mocks.coverage);
    mocks
        .source
        .expect_fetch_features()
        .return_once(|_| Ok(vec![shop("node/1", 39.95, -75.17)]));
    mocks
        .stores
        .expect_upsert()
        .withf(|key, _| {
            matches!(
                key,
                StoreKey::Triplet(triplet)
                    if triplet.name == "Store node/1"
                        && triplet.location_wkt == "POINT(-75.170000 39.950000)"
                        && triplet.boundary_id.is_none()
            )
        })
        .times(1)
        .return_once(|_, _| Ok(UpsertOutcome::Inserted));
    mocks
        .coverage
        .expect_append()
        .return_once(|region, count, _| Ok(coverage_record(region, count)));
    let settings = IngestionSettings {
        dedup_policy: DedupPolicy::NameLocationBoundary,
        ..IngestionSettings::default()
    };

    let outcome = pipeline(mocks, settings)
        .ingest(&IngestionRequest::Region(bbox()))
        .await
        .expect("ingest succeeds");

    assert_eq!(outcome.inserted_count, 1);
}
