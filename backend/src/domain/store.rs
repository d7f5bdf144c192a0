//! Food store entities, keying policies and the category rule table.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Coordinate;
use crate::domain::boundary::BoundaryId;
use crate::domain::geometry::HasLocation;

/// Repository-assigned store identifier.
pub type StoreId = i64;

/// Display name given to stores without a `name` tag.
pub const UNNAMED_STORE: &str = "Unnamed Store";

/// Fixed store category enumeration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StoreCategory {
    /// `shop=supermarket`
    Supermarket,
    /// `shop=grocery`
    Grocery,
    /// `shop=convenience`
    Convenience,
    /// `shop=greengrocer`
    Greengrocer,
    /// `shop=butcher`
    Butcher,
    /// `shop=bakery`
    Bakery,
    /// `shop=deli`
    Deli,
    /// `shop=farm`
    Farm,
    /// `shop=health_food`
    HealthFood,
    /// `shop=organic`
    Organic,
    /// `amenity=marketplace`
    Marketplace,
    /// Anything the rule table could not place.
    #[default]
    Unknown,
}

impl StoreCategory {
    /// Every category in declaration order.
    pub const ALL: [Self; 12] = [
        Self::Supermarket,
        Self::Grocery,
        Self::Convenience,
        Self::Greengrocer,
        Self::Butcher,
        Self::Bakery,
        Self::Deli,
        Self::Farm,
        Self::HealthFood,
        Self::Organic,
        Self::Marketplace,
        Self::Unknown,
    ];

    /// Stable snake_case identifier, equal to the OSM tag value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Supermarket => "supermarket",
            Self::Grocery => "grocery",
            Self::Convenience => "convenience",
            Self::Greengrocer => "greengrocer",
            Self::Butcher => "butcher",
            Self::Bakery => "bakery",
            Self::Deli => "deli",
            Self::Farm => "farm",
            Self::HealthFood => "health_food",
            Self::Organic => "organic",
            Self::Marketplace => "marketplace",
            Self::Unknown => "unknown",
        }
    }

    /// Human-facing plural label.
    pub fn display_label(self) -> &'static str {
        match self {
            Self::Supermarket => "Supermarkets",
            Self::Grocery => "Grocery Stores",
            Self::Convenience => "Convenience Stores",
            Self::Greengrocer => "Produce Stores",
            Self::Butcher => "Butcher Shops",
            Self::Bakery => "Bakeries",
            Self::Deli => "Delis",
            Self::Farm => "Farm Shops",
            Self::HealthFood => "Health Food Stores",
            Self::Organic => "Organic Stores",
            Self::Marketplace => "Farmers Markets",
            Self::Unknown => "Other",
        }
    }

    /// Map a raw tag value onto a category, if it names one. Matching
    /// ignores surrounding whitespace and ASCII case.
    pub fn from_tag_value(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| *category != Self::Unknown && category.as_str() == value)
    }
}

impl fmt::Display for StoreCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreCategory {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "unknown" => Ok(Self::Unknown),
            other => Self::from_tag_value(other)
                .ok_or_else(|| format!("unknown store category '{other}'")),
        }
    }
}

/// One row of the ordered category rule table.
///
/// The first rule whose tag key is present decides the category; a value
/// that names no category yields [`StoreCategory::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryRule {
    /// OSM tag key inspected by this rule.
    pub tag_key: &'static str,
}

/// `shop` beats `amenity`.
pub const CATEGORY_RULES: &[CategoryRule] = &[
    CategoryRule { tag_key: "shop" },
    CategoryRule { tag_key: "amenity" },
];

/// Derive a category from raw tags using [`CATEGORY_RULES`].
pub fn categorize(tags: &BTreeMap<String, String>) -> StoreCategory {
    CATEGORY_RULES
        .iter()
        .find_map(|rule| tags.get(rule.tag_key))
        .and_then(|value| StoreCategory::from_tag_value(value))
        .unwrap_or_default()
}

/// How stores are keyed for idempotent upsert. Chosen once per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// Unique on the upstream element id (`node/123`).
    #[default]
    ExternalId,
    /// Unique within `(name, location WKT, boundary id)`.
    NameLocationBoundary,
}

impl FromStr for DedupPolicy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "external_id" => Ok(Self::ExternalId),
            "name_location_boundary" => Ok(Self::NameLocationBoundary),
            other => Err(format!("unknown dedup policy '{other}'")),
        }
    }
}

/// Alternate store key used by [`DedupPolicy::NameLocationBoundary`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreTriplet {
    /// Display name as stored.
    pub name: String,
    /// Location rendered by [`Coordinate::to_wkt`].
    pub location_wkt: String,
    /// Owning boundary, if any.
    pub boundary_id: Option<BoundaryId>,
}

/// Key a repository upserts against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// Upstream element id.
    ExternalId(String),
    /// Name, location and boundary.
    Triplet(StoreTriplet),
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExternalId(id) => f.write_str(id),
            Self::Triplet(triplet) => write!(
                f,
                "{}@{}#{}",
                triplet.name,
                triplet.location_wkt,
                triplet
                    .boundary_id
                    .map_or_else(|| "-".to_owned(), |id| id.to_string())
            ),
        }
    }
}

/// A normalised store ready for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
    /// Upstream element id, e.g. `node/123`.
    pub external_id: String,
    /// Display name, never empty.
    pub name: String,
    /// Category from the rule table.
    pub category: StoreCategory,
    /// WGS84 point.
    pub location: Coordinate,
    /// Optional postal address assembled from `addr:*` tags.
    pub address: Option<String>,
    /// Owning boundary for boundary-driven ingestion.
    pub boundary_id: Option<BoundaryId>,
}

impl StoreRecord {
    /// The key this record upserts under for `policy`.
    pub fn key(&self, policy: DedupPolicy) -> StoreKey {
        match policy {
            DedupPolicy::ExternalId => StoreKey::ExternalId(self.external_id.clone()),
            DedupPolicy::NameLocationBoundary => StoreKey::Triplet(self.triplet()),
        }
    }

    /// Name, location and boundary triplet.
    pub fn triplet(&self) -> StoreTriplet {
        StoreTriplet {
            name: self.name.clone(),
            location_wkt: self.location.to_wkt(),
            boundary_id: self.boundary_id,
        }
    }
}

impl HasLocation for StoreRecord {
    fn location(&self) -> Coordinate {
        self.location
    }
}

/// A persisted store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    /// Repository id.
    pub id: StoreId,
    /// Upstream element id.
    pub external_id: String,
    /// Display name.
    pub name: String,
    /// Category.
    pub category: StoreCategory,
    /// WGS84 point.
    pub location: Coordinate,
    /// Optional postal address.
    pub address: Option<String>,
    /// Owning boundary.
    pub boundary_id: Option<BoundaryId>,
    /// Last upsert time; refreshed even when nothing changed.
    pub updated_at: DateTime<Utc>,
}

impl Store {
    /// Materialise a record as a persisted store.
    pub fn from_record(id: StoreId, record: StoreRecord, updated_at: DateTime<Utc>) -> Self {
        Self {
            id,
            external_id: record.external_id,
            name: record.name,
            category: record.category,
            location: record.location,
            address: record.address,
            boundary_id: record.boundary_id,
            updated_at,
        }
    }
}

impl HasLocation for Store {
    fn location(&self) -> Coordinate {
        self.location
    }
}

/// A store paired with its distance from a query point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreWithDistance {
    /// The store.
    pub store: Store,
    /// Distance in kilometres under the query's metric.
    pub distance_km: f64,
}

/// Whether an upsert created a row or refreshed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    /// New row.
    Inserted,
    /// Existing row updated in place.
    Updated,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[rstest]
    #[case::shop(&[("shop", "supermarket")], StoreCategory::Supermarket)]
    #[case::amenity(&[("amenity", "marketplace")], StoreCategory::Marketplace)]
    #[case::mixed_case_value(&[("shop", "Supermarket")], StoreCategory::Supermarket)]
    #[case::padded_upper_value(&[("amenity", " MARKETPLACE ")], StoreCategory::Marketplace)]
    #[case::shop_beats_amenity(
        &[("amenity", "marketplace"), ("shop", "bakery")],
        StoreCategory::Bakery
    )]
    #[case::unmapped_shop_value(
        &[("shop", "hardware"), ("amenity", "marketplace")],
        StoreCategory::Unknown
    )]
    #[case::no_tags(&[], StoreCategory::Unknown)]
    fn categorize_follows_rule_order(
        #[case] pairs: &[(&str, &str)],
        #[case] expected: StoreCategory,
    ) {
        assert_eq!(categorize(&tags(pairs)), expected);
    }

    #[rstest]
    fn every_category_round_trips_through_from_str() {
        for category in StoreCategory::ALL {
            assert_eq!(category.as_str().parse::<StoreCategory>(), Ok(category));
        }
    }

    #[rstest]
    #[case(StoreCategory::Greengrocer, "Produce Stores")]
    #[case(StoreCategory::Marketplace, "Farmers Markets")]
    #[case(StoreCategory::Unknown, "Other")]
    fn display_labels(#[case] category: StoreCategory, #[case] label: &str) {
        assert_eq!(category.display_label(), label);
    }

    #[rstest]
    fn record_key_follows_policy() {
        let record = StoreRecord {
            external_id: "node/1".to_owned(),
            name: "Corner Shop".to_owned(),
            category: StoreCategory::Convenience,
            location: Coordinate::new(39.95, -75.16),
            address: None,
            boundary_id: Some(7),
        };
        assert_eq!(
            record.key(DedupPolicy::ExternalId),
            StoreKey::ExternalId("node/1".to_owned())
        );
        let StoreKey::Triplet(triplet) = record.key(DedupPolicy::NameLocationBoundary) else {
            panic!("expected triplet key");
        };
        assert_eq!(triplet.location_wkt, "POINT(-75.160000 39.950000)");
        assert_eq!(triplet.boundary_id, Some(7));
    }

    #[rstest]
    fn dedup_policy_parses() {
        assert_eq!(
            "name_location_boundary".parse::<DedupPolicy>(),
            Ok(DedupPolicy::NameLocationBoundary)
        );
        assert!("other".parse::<DedupPolicy>().is_err());
    }
}
