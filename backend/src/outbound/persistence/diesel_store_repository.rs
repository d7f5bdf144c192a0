//! PostGIS-backed store repository.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::sql_types::{BigInt, Bool, Double, Nullable, Text, Timestamptz};
use diesel::{OptionalExtension, QueryableByName, sql_query};
use diesel_async::RunQueryDsl;

use crate::domain::geometry::{DistanceMetric, KM_PER_DEGREE};
use crate::domain::ports::{StoreRepository, StoreRepositoryError};
use crate::domain::{
    BoundingBox, Coordinate, Store, StoreCategory, StoreId, StoreKey, StoreRecord, StoreTriplet,
    StoreWithDistance, UpsertOutcome,
};

use super::diesel_helpers::{
    DieselFailure, cast_count, classify_diesel_error, map_diesel_error_message,
    map_pool_error_message,
};
use super::pool::{DbPool, PoolError};

/// Slack applied to the spheroidal prefilter before the exact haversine check.
const GEODESIC_PREFILTER_SLACK: f64 = 1.01;

const STORE_COLUMNS: &str = "id, external_id, name, category, \
     ST_Y(location) AS latitude, ST_X(location) AS longitude, \
     address, boundary_id, updated_at";

// Each statement targets its policy's partial unique index only.
const UPSERT_BY_EXTERNAL_ID_SQL: &str = r#"
INSERT INTO stores (external_id, name, category, location, location_key, address, boundary_id,
                    updated_at, dedup_policy)
VALUES ($1, $2, $3, ST_SetSRID(ST_MakePoint($4, $5), 4326), $6, $7, $8, now(), 'external_id')
ON CONFLICT (external_id) WHERE dedup_policy = 'external_id'
DO UPDATE SET
    name = EXCLUDED.name,
    category = EXCLUDED.category,
    location = EXCLUDED.location,
    location_key = EXCLUDED.location_key,
    address = EXCLUDED.address,
    boundary_id = EXCLUDED.boundary_id,
    updated_at = now()
RETURNING (xmax = 0) AS inserted
"#;

const UPSERT_BY_TRIPLET_SQL: &str = r#"
INSERT INTO stores (external_id, name, category, location, location_key, address, boundary_id,
                    updated_at, dedup_policy)
VALUES ($1, $2, $3, ST_SetSRID(ST_MakePoint($4, $5), 4326), $6, $7, $8, now(),
        'name_location_boundary')
ON CONFLICT (name, location_key, boundary_id) WHERE dedup_policy = 'name_location_boundary'
DO UPDATE SET
    external_id = EXCLUDED.external_id,
    category = EXCLUDED.category,
    address = EXCLUDED.address,
    updated_at = now()
RETURNING (xmax = 0) AS inserted
"#;

#[derive(QueryableByName)]
struct StoreRow {
    #[diesel(sql_type = BigInt)]
    id: i64,
    #[diesel(sql_type = Text)]
    external_id: String,
    #[diesel(sql_type = Text)]
    name: String,
    #[diesel(sql_type = Text)]
    category: String,
    #[diesel(sql_type = Double)]
    latitude: f64,
    #[diesel(sql_type = Double)]
    longitude: f64,
    #[diesel(sql_type = Nullable<Text>)]
    address: Option<String>,
    #[diesel(sql_type = Nullable<BigInt>)]
    boundary_id: Option<i64>,
    #[diesel(sql_type = Timestamptz)]
    updated_at: DateTime<Utc>,
}

impl TryFrom<StoreRow> for Store {
    type Error = StoreRepositoryError;

    fn try_from(row: StoreRow) -> Result<Self, Self::Error> {
        let category = StoreCategory::from_str(&row.category).map_err(|err| {
            StoreRepositoryError::query(format!("store {} has {err}", row.external_id))
        })?;
        let location = Coordinate::try_new(row.latitude, row.longitude).map_err(|err| {
            StoreRepositoryError::query(format!("store {} has {err}", row.external_id))
        })?;
        Ok(Self {
            id: row.id,
            external_id: row.external_id,
            name: row.name,
            category,
            location,
            address: row.address,
            boundary_id: row.boundary_id,
            updated_at: row.updated_at,
        })
    }
}

#[derive(QueryableByName)]
struct UpsertRow {
    #[diesel(sql_type = Bool)]
    inserted: bool,
}

#[derive(QueryableByName)]
struct ExistsRow {
    #[diesel(sql_type = Bool)]
    found: bool,
}

#[derive(QueryableByName)]
struct IdRow {
    #[diesel(sql_type = BigInt)]
    id: i64,
}

#[derive(QueryableByName)]
struct CountRow {
    #[diesel(sql_type = BigInt)]
    total: i64,
}

fn map_pool_error(error: PoolError) -> StoreRepositoryError {
    StoreRepositoryError::connection(map_pool_error_message(error))
}

fn map_diesel_error(error: &diesel::result::Error, operation: &str) -> StoreRepositoryError {
    let message = map_diesel_error_message(error, operation);
    match classify_diesel_error(error) {
        DieselFailure::Connection => StoreRepositoryError::connection(message),
        DieselFailure::Constraint | DieselFailure::Query => StoreRepositoryError::query(message),
    }
}

fn collect_stores(rows: Vec<StoreRow>) -> Result<Vec<Store>, StoreRepositoryError> {
    rows.into_iter().map(Store::try_from).collect()
}

/// Diesel implementation of [`StoreRepository`] over the `stores` table.
#[derive(Clone)]
pub struct DieselStoreRepository {
    pool: DbPool,
}

impl DieselStoreRepository {
    /// Create a repository over `pool`.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StoreRepository for DieselStoreRepository {
    async fn exists(&self, key: &StoreKey) -> Result<bool, StoreRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: ExistsRow = match key {
            StoreKey::ExternalId(external_id) => {
                sql_query(
                    "SELECT EXISTS (SELECT 1 FROM stores WHERE external_id = $1) AS found",
                )
                .bind::<Text, _>(external_id)
                .get_result(&mut conn)
                .await
            }
            StoreKey::Triplet(triplet) => {
                sql_query(
                    "SELECT EXISTS (SELECT 1 FROM stores WHERE name = $1 AND location_key = $2 \
                     AND boundary_id IS NOT DISTINCT FROM $3) AS found",
                )
                .bind::<Text, _>(&triplet.name)
                .bind::<Text, _>(&triplet.location_wkt)
                .bind::<Nullable<BigInt>, _>(triplet.boundary_id)
                .get_result(&mut conn)
                .await
            }
        }
        .map_err(|err| map_diesel_error(&err, "store existence check"))?;
        Ok(row.found)
    }

    async fn upsert(
        &self,
        key: &StoreKey,
        record: &StoreRecord,
    ) -> Result<UpsertOutcome, StoreRepositoryError> {
        let statement = match key {
            StoreKey::ExternalId(_) => UPSERT_BY_EXTERNAL_ID_SQL,
            StoreKey::Triplet(_) => UPSERT_BY_TRIPLET_SQL,
        };
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: UpsertRow = sql_query(statement)
            .bind::<Text, _>(&record.external_id)
            .bind::<Text, _>(&record.name)
            .bind::<Text, _>(record.category.as_str())
            .bind::<Double, _>(record.location.longitude)
            .bind::<Double, _>(record.location.latitude)
            .bind::<Text, _>(record.location.to_wkt())
            .bind::<Nullable<Text>, _>(record.address.clone())
            .bind::<Nullable<BigInt>, _>(record.boundary_id)
            .get_result(&mut conn)
            .await
            .map_err(|err| match classify_diesel_error(&err) {
                DieselFailure::Constraint => StoreRepositoryError::record(
                    key.to_string(),
                    map_diesel_error_message(&err, "store upsert"),
                ),
                DieselFailure::Connection | DieselFailure::Query => {
                    map_diesel_error(&err, "store upsert")
                }
            })?;
        Ok(if row.inserted {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::Updated
        })
    }

    async fn get_id(
        &self,
        triplet: &StoreTriplet,
    ) -> Result<Option<StoreId>, StoreRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<IdRow> = sql_query(
            "SELECT id FROM stores WHERE name = $1 AND location_key = $2 \
             AND boundary_id IS NOT DISTINCT FROM $3 ORDER BY id LIMIT 1",
        )
        .bind::<Text, _>(&triplet.name)
        .bind::<Text, _>(&triplet.location_wkt)
        .bind::<Nullable<BigInt>, _>(triplet.boundary_id)
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(|err| map_diesel_error(&err, "store id lookup"))?;
        Ok(row.map(|found| found.id))
    }

    async fn find_by_bbox(&self, bbox: &BoundingBox) -> Result<Vec<Store>, StoreRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<StoreRow> = sql_query(format!(
            "SELECT {STORE_COLUMNS} FROM stores \
             WHERE ST_Within(location, ST_MakeEnvelope($1, $2, $3, $4, 4326)) \
             ORDER BY id"
        ))
        .bind::<Double, _>(bbox.min_lng())
        .bind::<Double, _>(bbox.min_lat())
        .bind::<Double, _>(bbox.max_lng())
        .bind::<Double, _>(bbox.max_lat())
        .load(&mut conn)
        .await
        .map_err(|err| map_diesel_error(&err, "store bbox query"))?;
        collect_stores(rows)
    }

    async fn find_within_radius(
        &self,
        center: Coordinate,
        radius_km: f64,
        metric: DistanceMetric,
    ) -> Result<Vec<StoreWithDistance>, StoreRepositoryError> {
        if !radius_km.is_finite() || radius_km < 0.0 {
            return Err(StoreRepositoryError::query(format!(
                "radius must be finite and non-negative, got {radius_km}"
            )));
        }
        // Prefilter in PostGIS, then apply the domain metric exactly.
        let (predicate, tolerance) = match metric {
            DistanceMetric::Geodesic => (
                "ST_DWithin(location::geography, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography, $3)",
                radius_km * 1000.0 * GEODESIC_PREFILTER_SLACK,
            ),
            DistanceMetric::LegacyDegrees => (
                "ST_DWithin(location, ST_SetSRID(ST_MakePoint($1, $2), 4326), $3)",
                radius_km / KM_PER_DEGREE,
            ),
        };
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<StoreRow> =
            sql_query(format!("SELECT {STORE_COLUMNS} FROM stores WHERE {predicate}"))
                .bind::<Double, _>(center.longitude)
                .bind::<Double, _>(center.latitude)
                .bind::<Double, _>(tolerance)
                .load(&mut conn)
                .await
                .map_err(|err| map_diesel_error(&err, "store radius query"))?;

        let mut found = collect_stores(rows)?
            .into_iter()
            .filter_map(|store| {
                let distance_km = metric.distance_km(center, store.location);
                (distance_km <= radius_km).then_some(StoreWithDistance { store, distance_km })
            })
            .collect::<Vec<_>>();
        found.sort_by(|a, b| {
            a.distance_km
                .total_cmp(&b.distance_km)
                .then(a.store.id.cmp(&b.store.id))
        });
        Ok(found)
    }

    async fn count(&self) -> Result<u64, StoreRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: CountRow = sql_query("SELECT COUNT(*) AS total FROM stores")
            .get_result(&mut conn)
            .await
            .map_err(|err| map_diesel_error(&err, "store count"))?;
        cast_count(row.total).map_err(StoreRepositoryError::query)
    }
}
