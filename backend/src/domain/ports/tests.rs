//! Contract checks for port fixtures and port error helpers.

use super::*;
use crate::domain::geometry::DistanceMetric;
use crate::domain::{BoundaryDraft, BoundingBox, Coordinate, StoreKey, UpsertOutcome};
use chrono::{TimeZone, Utc};
use geo::MultiPolygon;
use rstest::{fixture, rstest};

#[fixture]
fn bbox() -> BoundingBox {
    BoundingBox::try_new(-75.2, 39.9, -75.1, 40.0).expect("valid bbox")
}

#[rstest]
#[case::transport(MapDataSourceError::transport("reset"), true)]
#[case::timeout(MapDataSourceError::timeout("180s"), true)]
#[case::rate_limited(MapDataSourceError::rate_limited("429"), true)]
#[case::decode(MapDataSourceError::decode("eof"), false)]
#[case::invalid(MapDataSourceError::invalid_request("bad"), false)]
fn source_errors_report_retryability(#[case] error: MapDataSourceError, #[case] retryable: bool) {
    assert_eq!(error.is_retryable(), retryable);
}

#[rstest]
fn record_error_names_the_key() {
    let error = StoreRepositoryError::record("node/7", "constraint");
    assert_eq!(error.to_string(), "store record node/7 rejected: constraint");
}

#[rstest]
#[tokio::test]
async fn fixture_source_returns_nothing(bbox: BoundingBox) {
    let request = FetchRequest {
        region: FetchRegion::BoundingBox(bbox),
        tags: vec![TagFilter::new("shop", &["supermarket"])],
    };
    let features = FixtureMapDataSource
        .fetch_features(&request)
        .await
        .expect("fixture fetch");
    assert!(features.is_empty());
}

#[rstest]
#[tokio::test]
async fn fixture_store_repository_is_empty(bbox: BoundingBox) {
    let repo = FixtureStoreRepository;
    let key = StoreKey::ExternalId("node/1".to_owned());
    assert!(!repo.exists(&key).await.expect("exists"));
    assert!(repo.find_by_bbox(&bbox).await.expect("bbox").is_empty());
    let nearby = repo
        .find_within_radius(Coordinate::new(39.95, -75.15), 1.0, DistanceMetric::Geodesic)
        .await
        .expect("radius");
    assert!(nearby.is_empty());
    assert_eq!(repo.count().await.expect("count"), 0);
}

#[rstest]
#[tokio::test]
async fn fixture_store_upsert_reports_insert(bbox: BoundingBox) {
    let record = crate::domain::StoreRecord {
        external_id: "node/1".to_owned(),
        name: "Corner".to_owned(),
        category: crate::domain::StoreCategory::Convenience,
        location: bbox.center(),
        address: None,
        boundary_id: None,
    };
    let outcome = FixtureStoreRepository
        .upsert(&StoreKey::ExternalId("node/1".to_owned()), &record)
        .await
        .expect("upsert");
    assert_eq!(outcome, UpsertOutcome::Inserted);
}

#[rstest]
#[tokio::test]
async fn fixture_coverage_never_contains(bbox: BoundingBox) {
    let region = MultiPolygon::from(bbox.to_polygon());
    let repo = FixtureCoverageRepository;
    let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().expect("timestamp");
    let record = repo.append(&region, 3, at).await.expect("append");
    assert_eq!(record.store_count, 3);
    assert!(repo.find_containing(&region).await.expect("query").is_none());
}

#[rstest]
#[tokio::test]
async fn fixture_boundary_echoes_draft(bbox: BoundingBox) {
    let draft = BoundaryDraft::try_new("relation/1", "Test", bbox.to_polygon()).expect("draft");
    let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().expect("timestamp");
    let boundary = FixtureBoundaryRepository
        .upsert(&draft, at)
        .await
        .expect("upsert");
    assert_eq!(boundary.external_id, "relation/1");
    assert_eq!(boundary.fetched_at, at);
}
