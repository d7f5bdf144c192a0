//! GeoJSON encoding for geometries crossing the PostGIS boundary.
//!
//! Geometries go in through `ST_GeomFromGeoJSON` and come back through
//! `ST_AsGeoJSON`, so adapters never parse WKB. Decoding validates shape and
//! finiteness; topology checks stay in the domain.

use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::{Value, json};

pub(super) fn multipolygon_to_geojson(geometry: &MultiPolygon<f64>) -> String {
    let polygons = geometry
        .iter()
        .map(|polygon| {
            std::iter::once(polygon.exterior())
                .chain(polygon.interiors())
                .map(ring_to_json)
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    json!({ "type": "MultiPolygon", "coordinates": polygons }).to_string()
}

fn ring_to_json(ring: &LineString<f64>) -> Value {
    Value::Array(ring.coords().map(|coord| json!([coord.x, coord.y])).collect())
}

/// Decode `Polygon` or `MultiPolygon` GeoJSON into a multi-polygon.
pub(super) fn multipolygon_from_geojson(raw: &str) -> Result<MultiPolygon<f64>, String> {
    let value: Value =
        serde_json::from_str(raw).map_err(|err| format!("invalid GeoJSON payload: {err}"))?;
    let coordinates = value
        .get("coordinates")
        .ok_or_else(|| "GeoJSON geometry has no coordinates".to_owned())?;
    match value.get("type").and_then(Value::as_str) {
        Some("MultiPolygon") => as_array(coordinates, "multipolygon")?
            .iter()
            .map(polygon_from_json)
            .collect::<Result<Vec<_>, _>>()
            .map(MultiPolygon::new),
        Some("Polygon") => polygon_from_json(coordinates).map(MultiPolygon::from),
        other => Err(format!("unsupported GeoJSON geometry type {other:?}")),
    }
}

fn polygon_from_json(value: &Value) -> Result<Polygon<f64>, String> {
    let mut rings = as_array(value, "polygon")?
        .iter()
        .map(ring_from_json)
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();
    let exterior = rings
        .next()
        .ok_or_else(|| "polygon has no exterior ring".to_owned())?;
    Ok(Polygon::new(exterior, rings.collect()))
}

fn ring_from_json(value: &Value) -> Result<LineString<f64>, String> {
    as_array(value, "ring")?
        .iter()
        .map(|position| match position.as_array().map(Vec::as_slice) {
            Some([x, y, ..]) => match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Ok(Coord { x, y }),
                _ => Err("ring position is not a finite number pair".to_owned()),
            },
            _ => Err("ring position must have two coordinates".to_owned()),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(LineString::new)
}

fn as_array<'a>(value: &'a Value, what: &str) -> Result<&'a Vec<Value>, String> {
    value
        .as_array()
        .ok_or_else(|| format!("{what} coordinates must be an array"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use rstest::rstest;

    #[rstest]
    fn encodes_exterior_and_holes() {
        let geometry = MultiPolygon::from(Polygon::new(
            LineString::from(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 0.0)]),
            vec![LineString::from(vec![
                (1.0, 0.5),
                (2.0, 0.5),
                (2.0, 1.0),
                (1.0, 0.5),
            ])],
        ));
        let encoded: Value =
            serde_json::from_str(&multipolygon_to_geojson(&geometry)).expect("valid JSON");

        assert_eq!(encoded["type"], "MultiPolygon");
        assert_eq!(encoded["coordinates"][0].as_array().map(Vec::len), Some(2));
        assert_eq!(encoded["coordinates"][0][0][1], json!([4.0, 0.0]));
    }

    #[rstest]
    fn decodes_postgis_output() {
        let raw = r#"{"type":"MultiPolygon","coordinates":[[[[-75.18,39.94],[-75.15,39.94],[-75.15,39.96],[-75.18,39.94]]]]}"#;
        let decoded = multipolygon_from_geojson(raw).expect("decodes");
        let expected = MultiPolygon::from(polygon![
            (x: -75.18, y: 39.94),
            (x: -75.15, y: 39.94),
            (x: -75.15, y: 39.96),
            (x: -75.18, y: 39.94),
        ]);
        assert_eq!(decoded, expected);
    }

    #[rstest]
    fn accepts_plain_polygons() {
        let raw = r#"{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}"#;
        assert_eq!(multipolygon_from_geojson(raw).expect("decodes").0.len(), 1);
    }

    #[rstest]
    #[case(r#"{"type":"Point","coordinates":[0,0]}"#)]
    #[case(r#"{"type":"Polygon","coordinates":[]}"#)]
    #[case(r#"{"type":"Polygon","coordinates":[[[0],[1,0]]]}"#)]
    #[case("not json")]
    fn rejects_malformed_payloads(#[case] raw: &str) {
        assert!(multipolygon_from_geojson(raw).is_err());
    }
}
