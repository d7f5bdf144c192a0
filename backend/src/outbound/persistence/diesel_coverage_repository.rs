//! PostGIS-backed append-only coverage log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::sql_types::{BigInt, Text, Timestamptz};
use diesel::{OptionalExtension, QueryableByName, sql_query};
use diesel_async::RunQueryDsl;
use geo::MultiPolygon;

use crate::domain::ports::{CoverageRecord, CoverageRepository, CoverageRepositoryError};

use super::diesel_helpers::{
    DieselFailure, cast_count, classify_diesel_error, map_diesel_error_message,
    map_pool_error_message,
};
use super::json_serializers::{multipolygon_from_geojson, multipolygon_to_geojson};
use super::pool::{DbPool, PoolError};

const APPEND_SQL: &str = r#"
INSERT INTO coverage_regions (region, store_count, fetched_at)
VALUES (ST_Multi(ST_SetSRID(ST_GeomFromGeoJSON($1), 4326)), $2, $3)
RETURNING id
"#;

const FIND_CONTAINING_SQL: &str = r#"
SELECT id, ST_AsGeoJSON(region) AS region_json, store_count, fetched_at
FROM coverage_regions
WHERE ST_Contains(region, ST_SetSRID(ST_GeomFromGeoJSON($1), 4326))
ORDER BY fetched_at DESC, id DESC
LIMIT 1
"#;

#[derive(QueryableByName)]
struct AppendedRow {
    #[diesel(sql_type = BigInt)]
    id: i64,
}

#[derive(QueryableByName)]
struct CoverageRow {
    #[diesel(sql_type = BigInt)]
    id: i64,
    #[diesel(sql_type = Text)]
    region_json: String,
    #[diesel(sql_type = BigInt)]
    store_count: i64,
    #[diesel(sql_type = Timestamptz)]
    fetched_at: DateTime<Utc>,
}

impl TryFrom<CoverageRow> for CoverageRecord {
    type Error = CoverageRepositoryError;

    fn try_from(row: CoverageRow) -> Result<Self, Self::Error> {
        let region = multipolygon_from_geojson(&row.region_json).map_err(|err| {
            CoverageRepositoryError::query(format!("coverage region {}: {err}", row.id))
        })?;
        let store_count = cast_count(row.store_count).map_err(CoverageRepositoryError::query)?;
        Ok(Self {
            id: row.id,
            region,
            store_count,
            fetched_at: row.fetched_at,
        })
    }
}

fn map_pool_error(error: PoolError) -> CoverageRepositoryError {
    CoverageRepositoryError::connection(map_pool_error_message(error))
}

fn map_diesel_error(error: &diesel::result::Error, operation: &str) -> CoverageRepositoryError {
    let message = map_diesel_error_message(error, operation);
    match classify_diesel_error(error) {
        DieselFailure::Connection => CoverageRepositoryError::connection(message),
        DieselFailure::Constraint | DieselFailure::Query => CoverageRepositoryError::query(message),
    }
}

/// Diesel implementation of [`CoverageRepository`] over `coverage_regions`.
#[derive(Clone)]
pub struct DieselCoverageRepository {
    pool: DbPool,
}

impl DieselCoverageRepository {
    /// Create a repository over `pool`.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CoverageRepository for DieselCoverageRepository {
    async fn append(
        &self,
        region: &MultiPolygon<f64>,
        store_count: u64,
        fetched_at: DateTime<Utc>,
    ) -> Result<CoverageRecord, CoverageRepositoryError> {
        let stored_count = i64::try_from(store_count).map_err(|_| {
            CoverageRepositoryError::query(format!("store count {store_count} overflows BIGINT"))
        })?;
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: AppendedRow = sql_query(APPEND_SQL)
            .bind::<Text, _>(multipolygon_to_geojson(region))
            .bind::<BigInt, _>(stored_count)
            .bind::<Timestamptz, _>(fetched_at)
            .get_result(&mut conn)
            .await
            .map_err(|err| map_diesel_error(&err, "coverage append"))?;
        Ok(CoverageRecord {
            id: row.id,
            region: region.clone(),
            store_count,
            fetched_at,
        })
    }

    async fn find_containing(
        &self,
        region: &MultiPolygon<f64>,
    ) -> Result<Option<CoverageRecord>, CoverageRepositoryError> {
        if region.0.is_empty() {
            return Ok(None);
        }
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<CoverageRow> = sql_query(FIND_CONTAINING_SQL)
            .bind::<Text, _>(multipolygon_to_geojson(region))
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(|err| map_diesel_error(&err, "coverage lookup"))?;
        row.map(CoverageRecord::try_from).transpose()
    }
}
