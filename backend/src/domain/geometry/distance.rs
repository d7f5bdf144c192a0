//! Great-circle distance.

use serde::{Deserialize, Serialize};

use crate::domain::Coordinate;

/// Sphere radius used by the haversine formula. Fixed at 6371.0 km; no
/// ellipsoidal correction is applied.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometres per degree in the legacy planar approximation.
pub const KM_PER_DEGREE: f64 = 111.0;

/// Haversine distance in kilometres between two `(lat, lon)` coordinates.
///
/// # Examples
/// ```
/// use food_access::domain::Coordinate;
/// use food_access::domain::geometry::geodesic_distance_km;
///
/// let philadelphia = Coordinate::new(39.9526, -75.1652);
/// let new_york = Coordinate::new(40.7128, -74.0060);
/// let km = geodesic_distance_km(philadelphia, new_york);
/// assert!((129.0..=131.0).contains(&km));
/// ```
pub fn geodesic_distance_km(p1: Coordinate, p2: Coordinate) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let d_lat = lat2 - lat1;
    let d_lon = (p2.longitude - p1.longitude).to_radians();

    let half_chord =
        (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let angle = 2.0 * half_chord.sqrt().atan2((1.0 - half_chord).sqrt());
    EARTH_RADIUS_KM * angle
}

/// Planar distance in degrees scaled by 111 km/degree.
///
/// Only correct near the equator; kept for consistency with datasets that
/// were built with this approximation.
pub fn legacy_degree_distance_km(p1: Coordinate, p2: Coordinate) -> f64 {
    let d_lat = p2.latitude - p1.latitude;
    let d_lon = p2.longitude - p1.longitude;
    d_lat.hypot(d_lon) * KM_PER_DEGREE
}

/// Which distance approximation radius queries use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Haversine on the 6371.0 km sphere.
    #[default]
    Geodesic,
    /// 1 degree ≈ 111 km planar approximation.
    LegacyDegrees,
}

impl DistanceMetric {
    /// Distance in kilometres under this metric.
    pub fn distance_km(self, p1: Coordinate, p2: Coordinate) -> f64 {
        match self {
            Self::Geodesic => geodesic_distance_km(p1, p2),
            Self::LegacyDegrees => legacy_degree_distance_km(p1, p2),
        }
    }

    /// Short label for logs and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Geodesic => "geodesic",
            Self::LegacyDegrees => "legacy_degrees",
        }
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "geodesic" => Ok(Self::Geodesic),
            "legacy_degrees" => Ok(Self::LegacyDegrees),
            other => Err(format!("unknown distance metric '{other}'")),
        }
    }
}
