//! DTOs for decoding Overpass `out geom` JSON responses.
//!
//! The adapter decodes into these transport DTOs first, then maps into
//! domain `RawFeature`s in one pass.

use std::collections::BTreeMap;

use geo::{Coord, LineString, Polygon};
use serde::Deserialize;

use crate::domain::Coordinate;
use crate::domain::ports::{RawFeature, RawGeometry};

const MIN_CLOSED_RING_POINTS: usize = 4;

#[derive(Debug, Deserialize)]
pub(super) struct OverpassResponseDto {
    #[serde(default)]
    pub(super) elements: Vec<OverpassElementDto>,
}

#[derive(Debug, Deserialize)]
pub(super) struct OverpassElementDto {
    #[serde(rename = "type")]
    pub(super) element_type: String,
    pub(super) id: i64,
    pub(super) lon: Option<f64>,
    pub(super) lat: Option<f64>,
    #[serde(default)]
    pub(super) geometry: Vec<LatLonDto>,
    #[serde(default)]
    pub(super) members: Vec<OverpassMemberDto>,
    #[serde(default)]
    pub(super) tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub(super) struct LatLonDto {
    pub(super) lat: f64,
    pub(super) lon: f64,
}

#[derive(Debug, Deserialize)]
pub(super) struct OverpassMemberDto {
    #[serde(default)]
    pub(super) role: String,
    #[serde(default)]
    pub(super) geometry: Vec<LatLonDto>,
}

impl OverpassResponseDto {
    pub(super) fn into_raw_features(self) -> Result<Vec<RawFeature>, String> {
        self.elements
            .into_iter()
            .map(OverpassElementDto::into_raw_feature)
            .collect()
    }
}

impl OverpassElementDto {
    fn into_raw_feature(self) -> Result<RawFeature, String> {
        let geometry = match self.element_type.as_str() {
            "node" => RawGeometry::Point(self.node_coordinate()?),
            "way" => way_geometry(&self.geometry, self.id)?,
            "relation" => relation_geometry(&self.members, self.id)?,
            _ => RawGeometry::Unsupported,
        };
        Ok(RawFeature {
            external_id: format!("{}/{}", self.element_type, self.id),
            geometry,
            tags: self.tags,
        })
    }

    fn node_coordinate(&self) -> Result<Coordinate, String> {
        let (Some(longitude), Some(latitude)) = (self.lon, self.lat) else {
            return Err(format!("element {} (node) missing coordinates", self.id));
        };
        if !longitude.is_finite() || !latitude.is_finite() {
            return Err(format!(
                "element {} (node) includes non-finite coordinates",
                self.id
            ));
        }
        Ok(Coordinate::new(latitude, longitude))
    }
}

fn way_geometry(points: &[LatLonDto], id: i64) -> Result<RawGeometry, String> {
    if points.len() < 2 {
        return Ok(RawGeometry::Unsupported);
    }
    let line = to_line_string(points, id)?;
    if is_closed_ring(&line) {
        Ok(RawGeometry::Footprint(Polygon::new(line, Vec::new())))
    } else {
        Ok(RawGeometry::Line(line))
    }
}

fn relation_geometry(members: &[OverpassMemberDto], id: i64) -> Result<RawGeometry, String> {
    for member in members.iter().filter(|member| member.role == "outer") {
        if member.geometry.len() < MIN_CLOSED_RING_POINTS {
            continue;
        }
        let ring = to_line_string(&member.geometry, id)?;
        if is_closed_ring(&ring) {
            return Ok(RawGeometry::Footprint(Polygon::new(ring, Vec::new())));
        }
    }
    Ok(RawGeometry::Unsupported)
}

fn to_line_string(points: &[LatLonDto], id: i64) -> Result<LineString<f64>, String> {
    if points
        .iter()
        .any(|point| !point.lat.is_finite() || !point.lon.is_finite())
    {
        return Err(format!("element {id} includes non-finite coordinates"));
    }
    Ok(LineString::new(
        points
            .iter()
            .map(|point| Coord {
                x: point.lon,
                y: point.lat,
            })
            .collect(),
    ))
}

fn is_closed_ring(line: &LineString<f64>) -> bool {
    line.0.len() >= MIN_CLOSED_RING_POINTS && line.is_closed()
}
