//! Domain primitives, services and the geometry kernel.
//!
//! Purpose: define strongly typed entities (coordinates, boxes, stores,
//! boundaries), the ports adapters implement, and the services that
//! compose them. Nothing here performs I/O directly.
//!
//! Public surface:
//! - Error / ErrorCode: transport-agnostic failure payload.
//! - Coordinate / BoundingBox: validated WGS84 value types.
//! - Store / StoreRecord / StoreCategory: food retail entities.
//! - Boundary / BoundaryDraft: administrative areas.
//! - IngestionPipeline, CoverageTracker, FoodAccessService: services.

pub mod accessibility;
pub mod bbox;
pub mod boundary;
pub mod coordinate;
pub mod coverage;
pub mod error;
pub mod food_access;
pub mod geometry;
pub mod ingestion;
pub mod ports;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use self::accessibility::{
    AccessClassification, AccessibilityReport, NearestStore, StoreSummary, classify,
    count_within_radius, coverage_percentage, filter_by_category, nearest, store_summary,
};
pub use self::bbox::BoundingBox;
pub use self::boundary::{Boundary, BoundaryDraft, BoundaryId};
pub use self::coordinate::Coordinate;
pub use self::coverage::CoverageTracker;
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::food_access::{AnalysisSettings, FoodAccessService, RequestContext};
pub use self::ingestion::{
    FootprintPolicy, IngestionOutcome, IngestionPipeline, IngestionRequest, IngestionSettings,
    IngestionStatus, RecordPersistFailure,
};
pub use self::store::{
    CATEGORY_RULES, CategoryRule, DedupPolicy, Store, StoreCategory, StoreId, StoreKey,
    StoreRecord, StoreTriplet, StoreWithDistance, UNNAMED_STORE, UpsertOutcome, categorize,
};

/// Convenient domain result alias.
///
/// # Examples
/// ```
/// use food_access::domain::{Coordinate, DomainResult};
///
/// fn parse(lat: f64, lon: f64) -> DomainResult<Coordinate> {
///     Coordinate::try_new(lat, lon)
/// }
///
/// assert!(parse(100.0, 0.0).is_err());
/// ```
pub type DomainResult<T> = Result<T, Error>;
