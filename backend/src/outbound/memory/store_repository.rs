//! In-memory store repository indexed with an R-tree.

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use mockable::Clock;
use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree};

use crate::domain::geometry::{DistanceMetric, KM_PER_DEGREE};
use crate::domain::ports::{StoreRepository, StoreRepositoryError};
use crate::domain::{
    BoundingBox, Coordinate, Store, StoreId, StoreKey, StoreRecord, StoreTriplet,
    StoreWithDistance, UpsertOutcome,
};

/// Point entry in the spatial index, `[longitude, latitude]`.
type IndexedPoint = GeomWithData<[f64; 2], StoreId>;

/// Kilometres per degree of latitude, rounded down so envelopes over-cover.
const MIN_KM_PER_LAT_DEGREE: f64 = 110.0;

/// Rows plus secondary indexes.
///
/// Only the key passed to an upsert is unique. The other index may hold
/// several rows, since a deployment dedups under one policy only.
#[derive(Default)]
struct StoreTable {
    rows: HashMap<StoreId, Store>,
    by_external_id: HashMap<String, BTreeSet<StoreId>>,
    by_triplet: HashMap<StoreTriplet, BTreeSet<StoreId>>,
    index: RTree<IndexedPoint>,
    next_id: StoreId,
}

impl StoreTable {
    fn lookup(&self, key: &StoreKey) -> Option<StoreId> {
        let ids = match key {
            StoreKey::ExternalId(external_id) => self.by_external_id.get(external_id),
            StoreKey::Triplet(triplet) => self.by_triplet.get(triplet),
        };
        ids.and_then(|ids| ids.first().copied())
    }

    fn detach(&mut self, id: StoreId) {
        if let Some(previous) = self.rows.remove(&id) {
            unlink(&mut self.by_external_id, &previous.external_id, id);
            unlink(&mut self.by_triplet, &triplet_of(&previous), id);
            self.index
                .remove(&IndexedPoint::new(point_of(previous.location), id));
        }
    }

    fn attach(&mut self, store: Store) {
        self.by_external_id
            .entry(store.external_id.clone())
            .or_default()
            .insert(store.id);
        self.by_triplet
            .entry(triplet_of(&store))
            .or_default()
            .insert(store.id);
        self.index
            .insert(IndexedPoint::new(point_of(store.location), store.id));
        self.rows.insert(store.id, store);
    }

    fn in_envelope(&self, envelope: &AABB<[f64; 2]>) -> impl Iterator<Item = &Store> {
        self.index
            .locate_in_envelope_intersecting(envelope)
            .filter_map(|entry| self.rows.get(&entry.data))
    }
}

fn unlink<K>(index: &mut HashMap<K, BTreeSet<StoreId>>, key: &K, id: StoreId)
where
    K: Eq + Hash,
{
    if let Some(ids) = index.get_mut(key) {
        ids.remove(&id);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}

fn point_of(location: Coordinate) -> [f64; 2] {
    [location.longitude, location.latitude]
}

fn triplet_of(store: &Store) -> StoreTriplet {
    StoreTriplet {
        name: store.name.clone(),
        location_wkt: store.location.to_wkt(),
        boundary_id: store.boundary_id,
    }
}

/// Degree envelope guaranteed to contain every point within `radius_km`.
fn search_envelope(center: Coordinate, radius_km: f64, metric: DistanceMetric) -> AABB<[f64; 2]> {
    let lat_span = match metric {
        DistanceMetric::Geodesic => radius_km / MIN_KM_PER_LAT_DEGREE,
        DistanceMetric::LegacyDegrees => radius_km / KM_PER_DEGREE,
    };
    let min_lat = (center.latitude - lat_span).max(-90.0);
    let max_lat = (center.latitude + lat_span).min(90.0);
    let lng_span = match metric {
        DistanceMetric::LegacyDegrees => lat_span,
        DistanceMetric::Geodesic => {
            let widest = min_lat.abs().max(max_lat.abs()).to_radians().cos();
            if widest <= f64::EPSILON || lat_span / widest >= 180.0 {
                360.0
            } else {
                lat_span / widest
            }
        }
    };
    AABB::from_corners(
        [center.longitude - lng_span, min_lat],
        [center.longitude + lng_span, max_lat],
    )
}

/// Store repository kept in process memory.
#[derive(Clone)]
pub struct InMemoryStoreRepository {
    table: Arc<Mutex<StoreTable>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryStoreRepository {
    /// Empty repository stamping updates with `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            table: Arc::new(Mutex::new(StoreTable {
                next_id: 1,
                ..StoreTable::default()
            })),
            clock,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreTable>, StoreRepositoryError> {
        self.table
            .lock()
            .map_err(|_| StoreRepositoryError::connection("store table lock poisoned"))
    }
}

#[async_trait]
impl StoreRepository for InMemoryStoreRepository {
    async fn exists(&self, key: &StoreKey) -> Result<bool, StoreRepositoryError> {
        Ok(self.lock()?.lookup(key).is_some())
    }

    async fn upsert(
        &self,
        key: &StoreKey,
        record: &StoreRecord,
    ) -> Result<UpsertOutcome, StoreRepositoryError> {
        let mut table = self.lock()?;
        let existing = table.lookup(key);
        let now = self.clock.utc();
        match existing {
            Some(id) => {
                table.detach(id);
                table.attach(Store::from_record(id, record.clone(), now));
                Ok(UpsertOutcome::Updated)
            }
            None => {
                let id = table.next_id;
                table.next_id += 1;
                table.attach(Store::from_record(id, record.clone(), now));
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn get_id(
        &self,
        triplet: &StoreTriplet,
    ) -> Result<Option<StoreId>, StoreRepositoryError> {
        Ok(self.lock()?.lookup(&StoreKey::Triplet(triplet.clone())))
    }

    async fn find_by_bbox(&self, bbox: &BoundingBox) -> Result<Vec<Store>, StoreRepositoryError> {
        let table = self.lock()?;
        let envelope = AABB::from_corners(
            [bbox.min_lng(), bbox.min_lat()],
            [bbox.max_lng(), bbox.max_lat()],
        );
        let mut stores: Vec<Store> = table
            .in_envelope(&envelope)
            .filter(|store| bbox.contains_strict(store.location))
            .cloned()
            .collect();
        stores.sort_by_key(|store| store.id);
        Ok(stores)
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
        let table = self.lock()?;
        let envelope = search_envelope(center, radius_km, metric);
        let mut found: Vec<StoreWithDistance> = table
            .in_envelope(&envelope)
            .filter_map(|store| {
                let distance_km = metric.distance_km(center, store.location);
                (distance_km <= radius_km).then(|| StoreWithDistance {
                    store: store.clone(),
                    distance_km,
                })
            })
            .collect();
        found.sort_by(|a, b| {
            a.distance_km
                .total_cmp(&b.distance_km)
                .then(a.store.id.cmp(&b.store.id))
        });
        Ok(found)
    }

    async fn count(&self) -> Result<u64, StoreRepositoryError> {
        let total = self.lock()?.rows.len();
        u64::try_from(total).map_err(|error| StoreRepositoryError::query(error.to_string()))
    }
}
