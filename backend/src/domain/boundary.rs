//! Administrative boundary entities.

use chrono::{DateTime, Utc};
use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

use crate::domain::geometry::{area_km2, validate_polygonal};
use crate::domain::{BoundingBox, Error};

/// Repository-assigned boundary identifier.
pub type BoundaryId = i64;

/// A validated boundary that has not been persisted yet.
///
/// Geometry is always WGS84 and always stored as a multi-polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryDraft {
    external_id: String,
    name: String,
    geometry: MultiPolygon<f64>,
    area_km2: f64,
}

impl BoundaryDraft {
    /// Validate geometry and identifiers, computing the projected area.
    ///
    /// # Examples
    /// ```
    /// use food_access::domain::{BoundaryDraft, BoundingBox};
    ///
    /// let bbox = BoundingBox::try_new(-75.18, 39.94, -75.15, 39.96).expect("bbox");
    /// let draft = BoundaryDraft::try_new("relation/1", "Center City", bbox.to_polygon())
    ///     .expect("valid boundary");
    /// assert!(draft.area_km2() > 0.0);
    /// ```
    pub fn try_new(
        external_id: impl Into<String>,
        name: impl Into<String>,
        geometry: impl Into<MultiPolygon<f64>>,
    ) -> Result<Self, Error> {
        let external_id = external_id.into();
        if external_id.trim().is_empty() {
            return Err(Error::validation("boundary external id must not be empty"));
        }
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::validation("boundary name must not be empty"));
        }
        let geometry = geometry.into();
        validate_polygonal(&geometry)?;
        let area_km2 = area_km2(&geometry)?;
        Ok(Self {
            external_id,
            name,
            geometry,
            area_km2,
        })
    }

    /// Upstream identifier, e.g. `relation/188022`.
    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Boundary geometry.
    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    /// Projected area in km², two decimals.
    pub fn area_km2(&self) -> f64 {
        self.area_km2
    }

    /// Bounding box of the geometry.
    pub fn bbox(&self) -> Result<BoundingBox, Error> {
        BoundingBox::of_geometry(&self.geometry)
    }
}

/// A persisted boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Boundary {
    /// Repository id.
    pub id: BoundaryId,
    /// Upstream identifier.
    pub external_id: String,
    /// Display name.
    pub name: String,
    /// Projected area in km².
    pub area_km2: f64,
    /// WGS84 multi-polygon.
    pub geometry: MultiPolygon<f64>,
    /// Last successful fetch.
    pub fetched_at: DateTime<Utc>,
}

impl Boundary {
    /// Materialise a draft with its id and fetch time.
    pub fn from_draft(id: BoundaryId, draft: BoundaryDraft, fetched_at: DateTime<Utc>) -> Self {
        Self {
            id,
            external_id: draft.external_id,
            name: draft.name,
            area_km2: draft.area_km2,
            geometry: draft.geometry,
            fetched_at,
        }
    }
}
