//! Driven port for fetching raw map features from an external source.
//!
//! The domain owns the request shape so the ingestion pipeline stays
//! adapter-agnostic; the Overpass adapter is one implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use geo::{LineString, MultiPolygon, Polygon};

use super::define_port_error;
use crate::domain::{BoundingBox, Coordinate};

/// Region a fetch is scoped to.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchRegion {
    /// Axis-aligned box.
    BoundingBox(BoundingBox),
    /// Administrative boundary polygon.
    Polygon(MultiPolygon<f64>),
}

/// Match elements whose `key` tag takes one of `values`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    /// Tag key, e.g. `shop`.
    pub key: String,
    /// Accepted tag values.
    pub values: Vec<String>,
}

impl TagFilter {
    /// Build a filter from static strings.
    pub fn new(key: &str, values: &[&str]) -> Self {
        Self {
            key: key.to_owned(),
            values: values.iter().map(|value| (*value).to_owned()).collect(),
        }
    }
}

/// One fetch request.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    /// Where to look.
    pub region: FetchRegion,
    /// Union of tag filters; an element matching any filter is returned.
    pub tags: Vec<TagFilter>,
}

/// Geometry of a raw upstream element.
#[derive(Debug, Clone, PartialEq)]
pub enum RawGeometry {
    /// A node.
    Point(Coordinate),
    /// A closed way or a relation outline.
    Footprint(Polygon<f64>),
    /// An open way.
    Line(LineString<f64>),
    /// Anything the adapter could not place.
    Unsupported,
}

/// One element returned by the source.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFeature {
    /// Stable id as `<type>/<id>`, e.g. `node/123`.
    pub external_id: String,
    /// Element geometry.
    pub geometry: RawGeometry,
    /// Raw tags.
    pub tags: BTreeMap<String, String>,
}

define_port_error! {
    /// Errors surfaced while fetching map data.
    pub enum MapDataSourceError {
        /// Network transport failed before receiving a response.
        Transport { message: String } =>
            "map data transport failed: {message}",
        /// Source call exceeded its timeout.
        Timeout { message: String } =>
            "map data fetch timed out: {message}",
        /// Source rate-limited the request.
        RateLimited { message: String } =>
            "map data source rate limited request: {message}",
        /// Response could not be decoded.
        Decode { message: String } =>
            "map data response decode failed: {message}",
        /// Adapter rejected the request before execution.
        InvalidRequest { message: String } =>
            "map data request invalid: {message}",
    }
}

impl MapDataSourceError {
    /// Return whether retrying this error is expected to help.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Timeout { .. } | Self::RateLimited { .. }
        )
    }
}

/// Port for querying raw map features.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MapDataSource: Send + Sync {
    /// Fetch every feature in the region matching the tag filters.
    async fn fetch_features(
        &self,
        request: &FetchRequest,
    ) -> Result<Vec<RawFeature>, MapDataSourceError>;
}

/// Fixture implementation returning no features.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureMapDataSource;

#[async_trait]
impl MapDataSource for FixtureMapDataSource {
    async fn fetch_features(
        &self,
        _request: &FetchRequest,
    ) -> Result<Vec<RawFeature>, MapDataSourceError> {
        Ok(Vec::new())
    }
}
