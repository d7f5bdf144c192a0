//! Universal Transverse Mercator on the WGS84 ellipsoid.
//!
//! Forward and inverse series follow the USGS formulation (Snyder, 1987).
//! Accuracy is millimetric within a zone, which is ample for buffering and
//! area estimation at city scale.

use geo::{Coord, MapCoords};

use crate::domain::Coordinate;

const SEMI_MAJOR_AXIS_M: f64 = 6_378_137.0;
const FLATTENING: f64 = 1.0 / 298.257_223_563;
const SCALE_FACTOR: f64 = 0.9996;
const FALSE_EASTING_M: f64 = 500_000.0;
const SOUTHERN_FALSE_NORTHING_M: f64 = 10_000_000.0;
const ZONE_WIDTH_DEG: f64 = 6.0;

/// A UTM zone: number `1..=60` plus hemisphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtmZone {
    number: u8,
    north: bool,
}

impl UtmZone {
    /// Zone containing `coordinate`.
    ///
    /// Longitude 180 folds into zone 60.
    pub fn for_coordinate(coordinate: Coordinate) -> Self {
        let raw = ((coordinate.longitude + 180.0) / ZONE_WIDTH_DEG).floor() + 1.0;
        let number = raw.clamp(1.0, 60.0) as u8;
        Self {
            number,
            north: coordinate.latitude >= 0.0,
        }
    }

    /// Zone number.
    pub fn number(&self) -> u8 {
        self.number
    }

    /// Whether the zone uses the northern false northing.
    pub fn is_north(&self) -> bool {
        self.north
    }

    /// Longitude of the zone's central meridian in degrees.
    pub fn central_meridian(&self) -> f64 {
        f64::from(self.number - 1) * ZONE_WIDTH_DEG - 180.0 + ZONE_WIDTH_DEG / 2.0
    }

    /// EPSG code of the zone (`326xx` north, `327xx` south).
    pub fn epsg(&self) -> u32 {
        let base = if self.north { 32_600 } else { 32_700 };
        base + u32::from(self.number)
    }

    fn false_northing(&self) -> f64 {
        if self.north {
            0.0
        } else {
            SOUTHERN_FALSE_NORTHING_M
        }
    }
}

/// Projector between WGS84 degrees and metres in one UTM zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtmProjection {
    zone: UtmZone,
}

impl UtmProjection {
    /// Projector for an explicit zone.
    pub fn new(zone: UtmZone) -> Self {
        Self { zone }
    }

    /// Projector for the zone containing `centroid`.
    pub fn for_centroid(centroid: Coordinate) -> Self {
        Self::new(UtmZone::for_coordinate(centroid))
    }

    /// The zone in use.
    pub fn zone(&self) -> UtmZone {
        self.zone
    }

    /// Project `x = lon, y = lat` degrees to `x = easting, y = northing` metres.
    pub fn project(&self, lon_lat: Coord<f64>) -> Coord<f64> {
        let e2 = eccentricity_squared();
        let ep2 = e2 / (1.0 - e2);
        let phi = lon_lat.y.to_radians();
        let lambda = (lon_lat.x - self.zone.central_meridian()).to_radians();

        let (sin_phi, cos_phi) = phi.sin_cos();
        let tan_phi = phi.tan();
        let n = SEMI_MAJOR_AXIS_M / (1.0 - e2 * sin_phi * sin_phi).sqrt();
        let t = tan_phi * tan_phi;
        let c = ep2 * cos_phi * cos_phi;
        let a = cos_phi * lambda;
        let m = meridian_arc(phi);

        let a2 = a * a;
        let a3 = a2 * a;
        let a4 = a3 * a;
        let a5 = a4 * a;
        let a6 = a5 * a;

        let easting = SCALE_FACTOR
            * n
            * (a + (1.0 - t + c) * a3 / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a5 / 120.0)
            + FALSE_EASTING_M;
        let northing = SCALE_FACTOR
            * (m + n
                * tan_phi
                * (a2 / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a6 / 720.0))
            + self.zone.false_northing();

        Coord {
            x: easting,
            y: northing,
        }
    }

    /// Inverse of [`UtmProjection::project`].
    pub fn unproject(&self, easting_northing: Coord<f64>) -> Coord<f64> {
        let e2 = eccentricity_squared();
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        let ep2 = e2 / (1.0 - e2);

        let x = easting_northing.x - FALSE_EASTING_M;
        let y = easting_northing.y - self.zone.false_northing();

        let m = y / SCALE_FACTOR;
        let mu = m / (SEMI_MAJOR_AXIS_M * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));
        let root = (1.0 - e2).sqrt();
        let e1 = (1.0 - root) / (1.0 + root);

        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        let (sin1, cos1) = phi1.sin_cos();
        let tan1 = phi1.tan();
        let c1 = ep2 * cos1 * cos1;
        let t1 = tan1 * tan1;
        let denom = 1.0 - e2 * sin1 * sin1;
        let n1 = SEMI_MAJOR_AXIS_M / denom.sqrt();
        let r1 = SEMI_MAJOR_AXIS_M * (1.0 - e2) / denom.powf(1.5);
        let d = x / (n1 * SCALE_FACTOR);

        let latitude = phi1
            - (n1 * tan1 / r1)
                * (d * d / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                        - 252.0 * ep2
                        - 3.0 * c1 * c1)
                        * d.powi(6)
                        / 720.0);
        let longitude = (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1)
                * d.powi(5)
                / 120.0)
            / cos1;

        Coord {
            x: self.zone.central_meridian() + longitude.to_degrees(),
            y: latitude.to_degrees(),
        }
    }

    /// Project every coordinate of a geometry.
    pub fn project_geometry<G>(&self, geometry: &G) -> G::Output
    where
        G: MapCoords<f64, f64>,
    {
        geometry.map_coords(|coord| self.project(coord))
    }

    /// Unproject every coordinate of a geometry.
    pub fn unproject_geometry<G>(&self, geometry: &G) -> G::Output
    where
        G: MapCoords<f64, f64>,
    {
        geometry.map_coords(|coord| self.unproject(coord))
    }
}

fn eccentricity_squared() -> f64 {
    FLATTENING * (2.0 - FLATTENING)
}

fn meridian_arc(phi: f64) -> f64 {
    let e2 = eccentricity_squared();
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    SEMI_MAJOR_AXIS_M
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}
