//! Raw feature normalisation into store records.

use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

use geo::Centroid;
use serde::{Deserialize, Serialize};

use crate::domain::ports::{RawFeature, RawGeometry, TagFilter};
use crate::domain::{Coordinate, StoreRecord, UNNAMED_STORE, categorize};

/// What to do with closed-way and relation footprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FootprintPolicy {
    /// Keep points only.
    Discard,
    /// Reduce each footprint to its centroid.
    #[default]
    Centroid,
}

impl FromStr for FootprintPolicy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "discard" => Ok(Self::Discard),
            "centroid" => Ok(Self::Centroid),
            other => Err(format!("unknown footprint policy '{other}'")),
        }
    }
}

/// Tag filters selecting food retail from the map source.
pub fn store_tag_filters() -> Vec<TagFilter> {
    vec![
        TagFilter::new(
            "shop",
            &[
                "supermarket",
                "grocery",
                "convenience",
                "greengrocer",
                "butcher",
                "bakery",
                "deli",
                "farm",
                "health_food",
                "organic",
            ],
        ),
        TagFilter::new("amenity", &["marketplace"]),
    ]
}

/// Result of normalising one fetched batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedBatch {
    /// Records in upstream order, unique by external id.
    pub records: Vec<StoreRecord>,
    /// Lines, unsupported shapes, invalid points and footprints under
    /// [`FootprintPolicy::Discard`].
    pub discarded: usize,
    /// Repeated external ids dropped in favour of the first occurrence.
    pub duplicates: usize,
}

/// Normalise raw features, keeping the first occurrence of each id.
pub fn normalize_features(features: Vec<RawFeature>, policy: FootprintPolicy) -> NormalizedBatch {
    let mut seen = HashSet::new();
    let mut batch = NormalizedBatch::default();
    for feature in features {
        let Some(record) = to_record(feature, policy) else {
            batch.discarded += 1;
            continue;
        };
        if seen.insert(record.external_id.clone()) {
            batch.records.push(record);
        } else {
            batch.duplicates += 1;
        }
    }
    batch
}

fn to_record(feature: RawFeature, policy: FootprintPolicy) -> Option<StoreRecord> {
    let location = match (&feature.geometry, policy) {
        (RawGeometry::Point(point), _) => *point,
        (RawGeometry::Footprint(polygon), FootprintPolicy::Centroid) => {
            Coordinate::from(polygon.centroid()?)
        }
        (RawGeometry::Footprint(_), FootprintPolicy::Discard)
        | (RawGeometry::Line(_) | RawGeometry::Unsupported, _) => return None,
    };
    if !location.is_valid() {
        return None;
    }
    Some(StoreRecord {
        name: display_name(&feature.tags),
        category: categorize(&feature.tags),
        address: address(&feature.tags),
        external_id: feature.external_id,
        location,
        boundary_id: None,
    })
}

fn display_name(tags: &BTreeMap<String, String>) -> String {
    tags.get("name")
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map_or_else(|| UNNAMED_STORE.to_owned(), str::to_owned)
}

fn address(tags: &BTreeMap<String, String>) -> Option<String> {
    let tag = |key: &str| {
        tags.get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    };
    let street = match (tag("addr:housenumber"), tag("addr:street")) {
        (Some(number), Some(street)) => Some(format!("{number} {street}")),
        (None, Some(street)) => Some(street.to_owned()),
        _ => None,
    };
    let parts: Vec<String> = street
        .into_iter()
        .chain(tag("addr:city").map(str::to_owned))
        .chain(tag("addr:postcode").map(str::to_owned))
        .collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}
