//! PostGIS-backed boundary repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::sql_types::{BigInt, Double, Text, Timestamptz};
use diesel::{OptionalExtension, QueryableByName, sql_query};
use diesel_async::RunQueryDsl;

use crate::domain::ports::{BoundaryRepository, BoundaryRepositoryError};
use crate::domain::{Boundary, BoundaryDraft};

use super::diesel_helpers::{
    DieselFailure, classify_diesel_error, map_diesel_error_message, map_pool_error_message,
};
use super::json_serializers::{multipolygon_from_geojson, multipolygon_to_geojson};
use super::pool::{DbPool, PoolError};

const UPSERT_SQL: &str = r#"
INSERT INTO boundaries (external_id, name, area_km2, geometry, fetched_at)
VALUES ($1, $2, $3, ST_Multi(ST_SetSRID(ST_GeomFromGeoJSON($4), 4326)), $5)
ON CONFLICT (external_id)
DO UPDATE SET
    name = EXCLUDED.name,
    area_km2 = EXCLUDED.area_km2,
    geometry = EXCLUDED.geometry,
    fetched_at = EXCLUDED.fetched_at
RETURNING id
"#;

const FIND_SQL: &str = r#"
SELECT id, external_id, name, area_km2, ST_AsGeoJSON(geometry) AS geometry_json, fetched_at
FROM boundaries
WHERE external_id = $1
"#;

#[derive(QueryableByName)]
struct UpsertedRow {
    #[diesel(sql_type = BigInt)]
    id: i64,
}

#[derive(QueryableByName)]
struct BoundaryRow {
    #[diesel(sql_type = BigInt)]
    id: i64,
    #[diesel(sql_type = Text)]
    external_id: String,
    #[diesel(sql_type = Text)]
    name: String,
    #[diesel(sql_type = Double)]
    area_km2: f64,
    #[diesel(sql_type = Text)]
    geometry_json: String,
    #[diesel(sql_type = Timestamptz)]
    fetched_at: DateTime<Utc>,
}

impl TryFrom<BoundaryRow> for Boundary {
    type Error = BoundaryRepositoryError;

    fn try_from(row: BoundaryRow) -> Result<Self, Self::Error> {
        let geometry = multipolygon_from_geojson(&row.geometry_json).map_err(|err| {
            BoundaryRepositoryError::query(format!("boundary {}: {err}", row.external_id))
        })?;
        Ok(Self {
            id: row.id,
            external_id: row.external_id,
            name: row.name,
            area_km2: row.area_km2,
            geometry,
            fetched_at: row.fetched_at,
        })
    }
}

fn map_pool_error(error: PoolError) -> BoundaryRepositoryError {
    BoundaryRepositoryError::connection(map_pool_error_message(error))
}

fn map_diesel_error(error: &diesel::result::Error, operation: &str) -> BoundaryRepositoryError {
    let message = map_diesel_error_message(error, operation);
    match classify_diesel_error(error) {
        DieselFailure::Connection => BoundaryRepositoryError::connection(message),
        DieselFailure::Constraint | DieselFailure::Query => BoundaryRepositoryError::query(message),
    }
}

/// Diesel implementation of [`BoundaryRepository`] over `boundaries`.
#[derive(Clone)]
pub struct DieselBoundaryRepository {
    pool: DbPool,
}

impl DieselBoundaryRepository {
    /// Create a repository over `pool`.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BoundaryRepository for DieselBoundaryRepository {
    async fn upsert(
        &self,
        draft: &BoundaryDraft,
        fetched_at: DateTime<Utc>,
    ) -> Result<Boundary, BoundaryRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: UpsertedRow = sql_query(UPSERT_SQL)
            .bind::<Text, _>(draft.external_id())
            .bind::<Text, _>(draft.name())
            .bind::<Double, _>(draft.area_km2())
            .bind::<Text, _>(multipolygon_to_geojson(draft.geometry()))
            .bind::<Timestamptz, _>(fetched_at)
            .get_result(&mut conn)
            .await
            .map_err(|err| map_diesel_error(&err, "boundary upsert"))?;
        Ok(Boundary::from_draft(row.id, draft.clone(), fetched_at))
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Boundary>, BoundaryRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<BoundaryRow> = sql_query(FIND_SQL)
            .bind::<Text, _>(external_id)
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(|err| map_diesel_error(&err, "boundary lookup"))?;
        row.map(Boundary::try_from).transpose()
    }
}
