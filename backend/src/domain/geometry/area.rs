//! Projected areas and coverage fractions.

use geo::{Area, BooleanOps, Centroid, MultiPolygon};
use serde::{Deserialize, Serialize};

use super::{GeometryError, UtmProjection, round_to};
use crate::domain::Coordinate;

const SQUARE_METRES_PER_KM2: f64 = 1_000_000.0;

/// Covered vs total area of a boundary.
///
/// Areas are rounded to two decimals and the percentage to one.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CoverageStats {
    /// Area of the boundary covered by the buffered union, km².
    pub covered_km2: f64,
    /// Area of the boundary, km².
    pub total_km2: f64,
    /// `covered / total * 100`.
    pub pct: f64,
    /// `total - covered`, km².
    pub uncovered_km2: f64,
}

/// Area of `geometry` in square metres, measured in the UTM zone of its
/// centroid. Unrounded.
pub fn projected_area_m2(geometry: &MultiPolygon<f64>) -> Result<f64, GeometryError> {
    let projection = projection_for(geometry)?;
    Ok(projection.project_geometry(geometry).unsigned_area())
}

/// Area of `geometry` in km², rounded to two decimals.
pub fn area_km2(geometry: &MultiPolygon<f64>) -> Result<f64, GeometryError> {
    projected_area_m2(geometry).map(|m2| round_to(m2 / SQUARE_METRES_PER_KM2, 2))
}

/// How much of `boundary` the buffered `union` covers.
///
/// Empty inputs or a zero-area boundary yield all-zero stats instead of an
/// error. Both geometries are intersected in the boundary's UTM frame.
pub fn coverage_fraction(
    union: &MultiPolygon<f64>,
    boundary: &MultiPolygon<f64>,
) -> CoverageStats {
    if union.0.is_empty() || boundary.0.is_empty() {
        return CoverageStats::default();
    }
    let Ok(projection) = projection_for(boundary) else {
        return CoverageStats::default();
    };

    let boundary_m = projection.project_geometry(boundary);
    let union_m = projection.project_geometry(union);
    let total_m2 = boundary_m.unsigned_area();
    if !total_m2.is_finite() || total_m2 <= 0.0 {
        return CoverageStats::default();
    }
    let covered_m2 = union_m.intersection(&boundary_m).unsigned_area().min(total_m2);

    let total_km2 = total_m2 / SQUARE_METRES_PER_KM2;
    let covered_km2 = covered_m2 / SQUARE_METRES_PER_KM2;
    CoverageStats {
        covered_km2: round_to(covered_km2, 2),
        total_km2: round_to(total_km2, 2),
        pct: round_to(covered_m2 / total_m2 * 100.0, 1),
        uncovered_km2: round_to(total_km2 - covered_km2, 2),
    }
}

fn projection_for(geometry: &MultiPolygon<f64>) -> Result<UtmProjection, GeometryError> {
    let centroid = geometry.centroid().ok_or(GeometryError::Empty)?;
    let centroid = Coordinate::from(centroid);
    if !centroid.is_valid() {
        return Err(GeometryError::invalid_coordinate(
            "geometry centroid lies outside WGS84 ranges",
        ));
    }
    Ok(UtmProjection::for_centroid(centroid))
}
