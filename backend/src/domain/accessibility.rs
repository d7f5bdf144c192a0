//! Accessibility analysis over already-loaded stores.
//!
//! These functions are pure; callers fetch candidate stores from a
//! repository first.

use std::collections::BTreeMap;

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::geometry::{
    CoverageStats, DistanceMetric, buffer, coverage_fraction, merge_union, round_to,
};
use crate::domain::{Coordinate, Store, StoreCategory};

/// Access level derived from the number of stores in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessClassification {
    /// No store in range.
    Desert,
    /// One or two stores in range.
    Limited,
    /// Three or more stores in range.
    Good,
}

impl AccessClassification {
    /// Human-facing label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Desert => "Food Desert",
            Self::Limited => "Limited Access",
            Self::Good => "Good Access",
        }
    }
}

/// `0 → Desert`, `1..=2 → Limited`, `≥3 → Good`.
pub fn classify(count: usize) -> AccessClassification {
    match count {
        0 => AccessClassification::Desert,
        1 | 2 => AccessClassification::Limited,
        _ => AccessClassification::Good,
    }
}

/// Nearest store by geodesic distance. Ties keep the first store seen.
pub fn nearest(point: Coordinate, stores: &[Store]) -> Option<(&Store, f64)> {
    nearest_by(DistanceMetric::Geodesic, point, stores)
}

/// Stores with geodesic distance `<= radius_km`.
pub fn count_within_radius(point: Coordinate, stores: &[Store], radius_km: f64) -> usize {
    count_by(DistanceMetric::Geodesic, point, stores, radius_km)
}

fn nearest_by(
    metric: DistanceMetric,
    point: Coordinate,
    stores: &[Store],
) -> Option<(&Store, f64)> {
    stores
        .iter()
        .map(|store| (store, metric.distance_km(point, store.location)))
        .fold(None, |best, candidate| match best {
            Some((_, best_km)) if candidate.1 >= best_km => best,
            _ => Some(candidate),
        })
}

fn count_by(metric: DistanceMetric, point: Coordinate, stores: &[Store], radius_km: f64) -> usize {
    stores
        .iter()
        .filter(|store| metric.distance_km(point, store.location) <= radius_km)
        .count()
}

/// Share of `boundary` within `radius_meters` of any store.
///
/// Best effort: no stores, an empty boundary, or a geometry failure yields
/// all-zero stats.
pub fn coverage_percentage(
    stores: &[Store],
    boundary: &MultiPolygon<f64>,
    radius_meters: f64,
) -> CoverageStats {
    if stores.is_empty() || boundary.0.is_empty() {
        return CoverageStats::default();
    }
    let points: Vec<Coordinate> = stores.iter().map(|store| store.location).collect();
    let merged = buffer(&points, radius_meters).and_then(|polygons| merge_union(&polygons));
    match merged {
        Ok(union) => coverage_fraction(&union, boundary),
        Err(error) => {
            warn!(%error, "coverage computation failed, reporting zero coverage");
            CoverageStats::default()
        }
    }
}

/// Counts and density of a store set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSummary {
    /// Number of stores.
    pub total_stores: usize,
    /// Stores per km², two decimals; zero when the area is not positive.
    pub stores_per_km2: f64,
    /// Per-category counts.
    pub store_types: BTreeMap<StoreCategory, usize>,
    /// Whether any store was found.
    pub has_data: bool,
}

/// Summarise `stores` over an area of `area_km2`.
pub fn store_summary(stores: &[Store], area_km2: f64) -> StoreSummary {
    let mut store_types = BTreeMap::new();
    for store in stores {
        *store_types.entry(store.category).or_insert(0) += 1;
    }
    let total_stores = stores.len();
    let stores_per_km2 = if area_km2 > 0.0 {
        round_to(total_stores as f64 / area_km2, 2)
    } else {
        0.0
    };
    StoreSummary {
        total_stores,
        stores_per_km2,
        store_types,
        has_data: total_stores > 0,
    }
}

/// Stores whose category is listed. An empty list keeps everything.
pub fn filter_by_category(stores: &[Store], categories: &[StoreCategory]) -> Vec<Store> {
    stores
        .iter()
        .filter(|store| categories.is_empty() || categories.contains(&store.category))
        .cloned()
        .collect()
}

/// Nearest store with a rounded distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestStore {
    /// The store.
    pub store: Store,
    /// Distance in km under the report's metric, two decimals.
    pub distance_km: f64,
}

/// Access summary for one point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessibilityReport {
    /// Queried location.
    pub point: Coordinate,
    /// Closest candidate store, if any.
    pub nearest: Option<NearestStore>,
    /// Stores within `radius_km`.
    pub count_within_radius: usize,
    /// Radius used for counting.
    pub radius_km: f64,
    /// Access level.
    pub classification: AccessClassification,
    /// Metric used for the nearest distance and the count.
    pub metric: DistanceMetric,
}

/// Build a report for `point` from candidate `stores`, measuring with
/// `metric`.
pub fn analyze(
    point: Coordinate,
    stores: &[Store],
    radius_km: f64,
    metric: DistanceMetric,
) -> AccessibilityReport {
    let count = count_by(metric, point, stores, radius_km);
    AccessibilityReport {
        point,
        nearest: nearest_by(metric, point, stores).map(|(store, distance_km)| NearestStore {
            store: store.clone(),
            distance_km: round_to(distance_km, 2),
        }),
        count_within_radius: count,
        radius_km,
        classification: classify(count),
        metric,
    }
}
