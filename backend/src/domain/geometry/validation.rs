//! Polygon validity checks applied before boundary geometry is trusted.

use geo::line_intersection::line_intersection;
use geo::{Area, Coord, Line, LineString, MultiPolygon, Polygon};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{AABB, RTree};

use super::GeometryError;

type IndexedSegment = GeomWithData<Rectangle<[f64; 2]>, usize>;

const MIN_RING_COORDS: usize = 4;

/// Reject empty, open, degenerate or self-intersecting polygonal geometry.
pub fn validate_polygonal(geometry: &MultiPolygon<f64>) -> Result<(), GeometryError> {
    if geometry.0.is_empty() {
        return Err(GeometryError::Empty);
    }
    geometry.iter().try_for_each(validate_polygon)
}

fn validate_polygon(polygon: &Polygon<f64>) -> Result<(), GeometryError> {
    validate_ring(polygon.exterior(), "exterior")?;
    for interior in polygon.interiors() {
        validate_ring(interior, "interior")?;
    }
    let area = polygon.unsigned_area();
    if !area.is_finite() || area <= 0.0 {
        return Err(GeometryError::invalid_topology("polygon has zero area"));
    }
    Ok(())
}

fn validate_ring(ring: &LineString<f64>, label: &str) -> Result<(), GeometryError> {
    if ring
        .coords()
        .any(|coord| !(coord.x.is_finite() && coord.y.is_finite()))
    {
        return Err(GeometryError::invalid_coordinate(format!(
            "{label} ring holds non-finite coordinates"
        )));
    }
    if ring.0.len() < MIN_RING_COORDS {
        return Err(GeometryError::invalid_topology(format!(
            "{label} ring needs at least {MIN_RING_COORDS} coordinates"
        )));
    }
    if !ring.is_closed() {
        return Err(GeometryError::invalid_topology(format!(
            "{label} ring is not closed"
        )));
    }
    if ring_self_intersects(ring) {
        return Err(GeometryError::invalid_topology(format!(
            "{label} ring self-intersects"
        )));
    }
    Ok(())
}

fn ring_self_intersects(ring: &LineString<f64>) -> bool {
    let mut coords: Vec<Coord<f64>> = ring.0.clone();
    coords.dedup();
    let segments: Vec<Line<f64>> = coords
        .windows(2)
        .map(|pair| Line::new(pair[0], pair[1]))
        .collect();
    let count = segments.len();
    if count < 3 {
        return false;
    }

    let tree: RTree<IndexedSegment> = RTree::bulk_load(
        segments
            .iter()
            .enumerate()
            .map(|(index, segment)| GeomWithData::new(segment_envelope(segment), index))
            .collect(),
    );

    segments.iter().enumerate().any(|(index, segment)| {
        let [a, b] = corners(segment);
        tree.locate_in_envelope_intersecting(&AABB::from_corners(a, b))
            .map(|candidate| candidate.data)
            .filter(|&other| other > index && !adjacent(index, other, count))
            .any(|other| crosses(*segment, segments[other]))
    })
}

fn adjacent(first: usize, second: usize, count: usize) -> bool {
    second == first + 1 || (first == 0 && second == count - 1)
}

fn crosses(first: Line<f64>, second: Line<f64>) -> bool {
    line_intersection(first, second).is_some()
}

fn corners(segment: &Line<f64>) -> [[f64; 2]; 2] {
    [
        [segment.start.x, segment.start.y],
        [segment.end.x, segment.end.y],
    ]
}

fn segment_envelope(segment: &Line<f64>) -> Rectangle<[f64; 2]> {
    let [a, b] = corners(segment);
    Rectangle::from_corners(a, b)
}
