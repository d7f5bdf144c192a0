//! WGS84 coordinate value type.

use geo::Point;
use serde::{Deserialize, Serialize};

use crate::domain::Error;

/// A geographic coordinate in degrees (EPSG:4326).
///
/// Field order follows the `(latitude, longitude)` convention used by the
/// distance functions; conversions into [`geo::Point`] flip to `x = lon`,
/// `y = lat`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees, `[-90, 90]`.
    pub latitude: f64,
    /// Longitude in degrees, `[-180, 180]`.
    pub longitude: f64,
}

impl Coordinate {
    /// Construct without validation.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Construct a coordinate, rejecting non-finite or out-of-range values.
    ///
    /// # Examples
    /// ```
    /// use food_access::domain::Coordinate;
    ///
    /// assert!(Coordinate::try_new(39.95, -75.16).is_ok());
    /// assert!(Coordinate::try_new(91.0, 0.0).is_err());
    /// ```
    pub fn try_new(latitude: f64, longitude: f64) -> Result<Self, Error> {
        if !valid_latitude(latitude) {
            return Err(Error::validation(
                "latitude must be finite and within [-90, 90]",
            ));
        }
        if !valid_longitude(longitude) {
            return Err(Error::validation(
                "longitude must be finite and within [-180, 180]",
            ));
        }
        Ok(Self::new(latitude, longitude))
    }

    /// Whether both components are finite and in range.
    pub fn is_valid(&self) -> bool {
        valid_latitude(self.latitude) && valid_longitude(self.longitude)
    }

    /// Well-known-text rendering used as a location key.
    ///
    /// Six decimals (~0.1 m) keep the key stable across float noise from
    /// reprojection or JSON round trips.
    pub fn to_wkt(&self) -> String {
        format!("POINT({:.6} {:.6})", self.longitude, self.latitude)
    }
}

impl From<Coordinate> for Point<f64> {
    fn from(value: Coordinate) -> Self {
        Point::new(value.longitude, value.latitude)
    }
}

impl From<Point<f64>> for Coordinate {
    fn from(value: Point<f64>) -> Self {
        Self::new(value.y(), value.x())
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((latitude, longitude): (f64, f64)) -> Self {
        Self::new(latitude, longitude)
    }
}

pub(crate) fn valid_longitude(value: f64) -> bool {
    value.is_finite() && (-180.0..=180.0).contains(&value)
}

pub(crate) fn valid_latitude(value: f64) -> bool {
    value.is_finite() && (-90.0..=90.0).contains(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(90.0, 180.0)]
    #[case(-90.0, -180.0)]
    #[case(0.0, 0.0)]
    fn accepts_range_limits(#[case] latitude: f64, #[case] longitude: f64) {
        assert!(Coordinate::try_new(latitude, longitude).is_ok());
    }

    #[rstest]
    #[case(90.5, 0.0)]
    #[case(0.0, -180.5)]
    #[case(f64::NAN, 0.0)]
    #[case(0.0, f64::INFINITY)]
    fn rejects_out_of_range(#[case] latitude: f64, #[case] longitude: f64) {
        let error = Coordinate::try_new(latitude, longitude).expect_err("must reject");
        assert_eq!(error.code(), crate::domain::ErrorCode::Validation);
    }

    #[rstest]
    fn point_conversion_swaps_axis_order() {
        let point: Point<f64> = Coordinate::new(40.0, -75.0).into();
        assert_eq!(point.x(), -75.0);
        assert_eq!(point.y(), 40.0);
    }

    #[rstest]
    fn wkt_is_lon_lat_with_fixed_precision() {
        let wkt = Coordinate::new(39.9526, -75.1652).to_wkt();
        assert_eq!(wkt, "POINT(-75.165200 39.952600)");
    }
}
