use geo::{Contains, MultiPolygon, Point};

use crate::domain::Coordinate;

/// Anything with a single WGS84 location.
pub trait HasLocation {
    /// The item's location.
    fn location(&self) -> Coordinate;
}

impl HasLocation for Coordinate {
    fn location(&self) -> Coordinate {
        *self
    }
}

/// Keep items whose location lies strictly inside `polygon`.
///
/// Points on the boundary are dropped.
pub fn point_in_polygon_filter<T: HasLocation>(
    items: Vec<T>,
    polygon: &MultiPolygon<f64>,
) -> Vec<T> {
    items
        .into_iter()
        .filter(|item| polygon.contains(&Point::from(item.location())))
        .collect()
}
