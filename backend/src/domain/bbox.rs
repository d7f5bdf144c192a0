//! Validated WGS84 bounding boxes.

use std::fmt;

use geo::{BoundingRect, Coord, MultiPolygon, Polygon, Rect};
use serde::{Deserialize, Serialize};

use crate::domain::Error;
use crate::domain::coordinate::{Coordinate, valid_latitude, valid_longitude};

/// Axis-aligned box in `[min_lng, min_lat, max_lng, max_lat]` order.
///
/// ## Invariants
/// - all values finite and inside WGS84 ranges;
/// - `min_lng < max_lng` and `min_lat < max_lat` (boxes have area).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    min_lng: f64,
    min_lat: f64,
    max_lng: f64,
    max_lat: f64,
}

impl BoundingBox {
    /// Validate and construct a bounding box.
    ///
    /// # Examples
    /// ```
    /// use food_access::domain::BoundingBox;
    ///
    /// let bbox = BoundingBox::try_new(-75.2, 39.9, -75.1, 40.0).expect("valid bbox");
    /// assert_eq!(bbox.to_array(), [-75.2, 39.9, -75.1, 40.0]);
    /// assert!(BoundingBox::try_new(-75.1, 39.9, -75.2, 40.0).is_err());
    /// ```
    pub fn try_new(min_lng: f64, min_lat: f64, max_lng: f64, max_lat: f64) -> Result<Self, Error> {
        if !(valid_longitude(min_lng) && valid_longitude(max_lng)) {
            return Err(Error::validation(
                "bbox longitude values must be finite and within [-180, 180]",
            ));
        }
        if !(valid_latitude(min_lat) && valid_latitude(max_lat)) {
            return Err(Error::validation(
                "bbox latitude values must be finite and within [-90, 90]",
            ));
        }
        if min_lng >= max_lng || min_lat >= max_lat {
            return Err(Error::validation(
                "bbox must be ordered as [min_lng, min_lat, max_lng, max_lat] with non-zero extent",
            ));
        }
        Ok(Self {
            min_lng,
            min_lat,
            max_lng,
            max_lat,
        })
    }

    /// Bounding box of a polygonal geometry.
    pub fn of_geometry(geometry: &MultiPolygon<f64>) -> Result<Self, Error> {
        let rect = geometry
            .bounding_rect()
            .ok_or_else(|| Error::geometry("cannot compute bounds of an empty geometry"))?;
        Self::try_new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }

    /// Components in `[min_lng, min_lat, max_lng, max_lat]` order.
    pub fn to_array(self) -> [f64; 4] {
        [self.min_lng, self.min_lat, self.max_lng, self.max_lat]
    }

    /// Minimum longitude.
    pub fn min_lng(&self) -> f64 {
        self.min_lng
    }

    /// Minimum latitude.
    pub fn min_lat(&self) -> f64 {
        self.min_lat
    }

    /// Maximum longitude.
    pub fn max_lng(&self) -> f64 {
        self.max_lng
    }

    /// Maximum latitude.
    pub fn max_lat(&self) -> f64 {
        self.max_lat
    }

    /// Strict containment: points on the edge are outside, matching
    /// `ST_Within` for point geometries.
    pub fn contains_strict(&self, coordinate: Coordinate) -> bool {
        coordinate.longitude > self.min_lng
            && coordinate.longitude < self.max_lng
            && coordinate.latitude > self.min_lat
            && coordinate.latitude < self.max_lat
    }

    /// The box as a closed polygon ring.
    pub fn to_polygon(&self) -> Polygon<f64> {
        Rect::new(
            Coord {
                x: self.min_lng,
                y: self.min_lat,
            },
            Coord {
                x: self.max_lng,
                y: self.max_lat,
            },
        )
        .to_polygon()
    }

    /// Centre of the box.
    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }

    /// Well-known-text polygon rendering for spatial SQL.
    pub fn to_wkt(&self) -> String {
        format!(
            "POLYGON(({min_lng} {min_lat},{max_lng} {min_lat},{max_lng} {max_lat},{min_lng} {max_lat},{min_lng} {min_lat}))",
            min_lng = self.min_lng,
            min_lat = self.min_lat,
            max_lng = self.max_lng,
            max_lat = self.max_lat,
        )
    }
}

impl TryFrom<[f64; 4]> for BoundingBox {
    type Error = Error;

    fn try_from(value: [f64; 4]) -> Result<Self, Self::Error> {
        let [min_lng, min_lat, max_lng, max_lat] = value;
        Self::try_new(min_lng, min_lat, max_lng, max_lat)
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(value: BoundingBox) -> Self {
        value.to_array()
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_lng, self.min_lat, self.max_lng, self.max_lat
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Area;
    use rstest::rstest;

    fn bbox() -> BoundingBox {
        BoundingBox::try_new(-3.30, 55.90, -3.10, 56.00).expect("valid bbox")
    }

    #[rstest]
    #[case::longitude_range([-181.0, 55.90, -3.10, 56.00])]
    #[case::latitude_range([-3.30, -91.0, -3.10, 56.00])]
    #[case::reversed_longitude([-3.10, 55.90, -3.30, 56.00])]
    #[case::zero_height([-3.30, 55.90, -3.10, 55.90])]
    #[case::nan([f64::NAN, 55.90, -3.10, 56.00])]
    fn rejects_invalid_boxes(#[case] raw: [f64; 4]) {
        let error = BoundingBox::try_from(raw).expect_err("bbox must fail");
        assert_eq!(error.code(), crate::domain::ErrorCode::Validation);
    }

    #[rstest]
    fn strict_containment_excludes_edges() {
        let bbox = bbox();
        assert!(bbox.contains_strict(Coordinate::new(55.95, -3.20)));
        assert!(!bbox.contains_strict(Coordinate::new(56.00, -3.20)));
        assert!(!bbox.contains_strict(Coordinate::new(55.95, -3.30)));
    }

    #[rstest]
    fn polygon_matches_extent() {
        let polygon = bbox().to_polygon();
        let area = polygon.unsigned_area();
        assert!((area - 0.02).abs() < 1e-9);
    }

    #[rstest]
    fn serde_uses_array_form() {
        let json = serde_json::to_string(&bbox()).expect("serialise");
        assert_eq!(json, "[-3.3,55.9,-3.1,56.0]");
        let error = serde_json::from_str::<BoundingBox>("[1.0,1.0,0.0,0.0]");
        assert!(error.is_err());
    }
}
