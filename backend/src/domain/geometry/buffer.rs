//! Metric circular buffers around points.

use std::f64::consts::TAU;

use geo::{Coord, LineString, Polygon};

use super::{GeometryError, UtmProjection, centroid};
use crate::domain::Coordinate;

/// Vertices per buffered circle.
pub const BUFFER_SEGMENTS: usize = 64;

/// Buffer each point by `distance_meters`, returning WGS84 polygons.
///
/// All points share one UTM frame chosen from the dataset centroid so the
/// buffers are mutually consistent.
pub fn buffer(
    points: &[Coordinate],
    distance_meters: f64,
) -> Result<Vec<Polygon<f64>>, GeometryError> {
    if points.is_empty() {
        return Err(GeometryError::Empty);
    }
    if !distance_meters.is_finite() || distance_meters <= 0.0 {
        return Err(GeometryError::InvalidDistance {
            distance: distance_meters,
        });
    }
    let projection = UtmProjection::for_centroid(centroid(points)?);
    Ok(points
        .iter()
        .map(|point| circle(&projection, *point, distance_meters))
        .collect())
}

fn circle(projection: &UtmProjection, center: Coordinate, radius_m: f64) -> Polygon<f64> {
    let origin = projection.project(Coord {
        x: center.longitude,
        y: center.latitude,
    });
    let ring: Vec<Coord<f64>> = (0..BUFFER_SEGMENTS)
        .map(|step| {
            let angle = TAU * step as f64 / BUFFER_SEGMENTS as f64;
            projection.unproject(Coord {
                x: origin.x + radius_m * angle.cos(),
                y: origin.y + radius_m * angle.sin(),
            })
        })
        .collect();
    Polygon::new(LineString::from(ring), Vec::new())
}
