use geo::{BooleanOps, MultiPolygon, Polygon};

use super::GeometryError;

/// Dissolve polygons into a single polygonal geometry.
///
/// Uses a balanced pairwise reduction so each boolean operation works on
/// inputs of similar complexity.
pub fn merge_union(geometries: &[Polygon<f64>]) -> Result<MultiPolygon<f64>, GeometryError> {
    if geometries.is_empty() {
        return Err(GeometryError::Empty);
    }
    let mut layer: Vec<MultiPolygon<f64>> = geometries
        .iter()
        .cloned()
        .map(MultiPolygon::from)
        .collect();

    while layer.len() > 1 {
        layer = layer
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => left.union(right),
                [single] => single.clone(),
                _ => MultiPolygon::new(Vec::new()),
            })
            .collect();
    }

    let merged = layer.pop().ok_or(GeometryError::Empty)?;
    if merged.0.is_empty() {
        return Err(GeometryError::invalid_topology(
            "union did not produce a polygon or multi-polygon",
        ));
    }
    Ok(merged)
}
