//! Geometry kernel: geodesic distance, projected buffering and area, polygon
//! union and strict point-in-polygon filtering.
//!
//! Everything here is a pure function over WGS84 inputs. Metric work
//! (buffering, areas) happens in a UTM frame chosen from the data's
//! centroid; nothing is measured in degrees.

mod area;
mod buffer;
mod distance;
mod filter;
mod projection;
mod union;
mod validation;

use geo::{Centroid, MultiPoint, Point};

use crate::domain::{Coordinate, Error};

pub use area::{CoverageStats, area_km2, coverage_fraction, projected_area_m2};
pub use buffer::{BUFFER_SEGMENTS, buffer};
pub use distance::{
    DistanceMetric, EARTH_RADIUS_KM, KM_PER_DEGREE, geodesic_distance_km,
    legacy_degree_distance_km,
};
pub use filter::{HasLocation, point_in_polygon_filter};
pub use projection::{UtmProjection, UtmZone};
pub use union::merge_union;
pub use validation::validate_polygonal;

/// Errors raised by kernel functions that must succeed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    /// No geometry or no points were supplied.
    #[error("geometry input is empty")]
    Empty,
    /// A coordinate was non-finite or outside WGS84 ranges.
    #[error("geometry contains invalid coordinates: {message}")]
    InvalidCoordinate {
        /// Description of the offending value.
        message: String,
    },
    /// Buffer distance was not a positive finite number.
    #[error("buffer distance must be positive and finite, got {distance}")]
    InvalidDistance {
        /// Offending distance in metres.
        distance: f64,
    },
    /// Geometry topology is unusable (open rings, self-intersection, zero area).
    #[error("invalid geometry topology: {message}")]
    InvalidTopology {
        /// Description of the defect.
        message: String,
    },
}

impl GeometryError {
    pub(crate) fn invalid_coordinate(message: impl Into<String>) -> Self {
        Self::InvalidCoordinate {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_topology(message: impl Into<String>) -> Self {
        Self::InvalidTopology {
            message: message.into(),
        }
    }
}

impl From<GeometryError> for Error {
    fn from(value: GeometryError) -> Self {
        Error::geometry(value.to_string())
    }
}

/// Arithmetic mean of a point set, used to pick a projection zone.
pub fn centroid(points: &[Coordinate]) -> Result<Coordinate, GeometryError> {
    if let Some(bad) = points.iter().find(|point| !point.is_valid()) {
        return Err(GeometryError::invalid_coordinate(format!(
            "({}, {})",
            bad.latitude, bad.longitude
        )));
    }
    let multi_point: MultiPoint<f64> = points
        .iter()
        .copied()
        .map(Point::from)
        .collect::<Vec<_>>()
        .into();
    multi_point
        .centroid()
        .map(Coordinate::from)
        .ok_or(GeometryError::Empty)
}

/// Round at the component boundary.
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}
