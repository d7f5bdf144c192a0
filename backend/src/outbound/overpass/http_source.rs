//! Reqwest-backed Overpass map data adapter.
//!
//! This adapter owns transport details only: query rendering, timeout and
//! HTTP error mapping, and JSON decoding into raw features.

use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use geo::MultiPolygon;
use reqwest::{Client, StatusCode, Url};
use tracing::debug;

use super::dto::OverpassResponseDto;
use crate::domain::BoundingBox;
use crate::domain::ports::{
    FetchRegion, FetchRequest, MapDataSource, MapDataSourceError, RawFeature, TagFilter,
};

const DEFAULT_OVERPASS_QUERY_TIMEOUT_SECONDS: u32 = 180;
const DEFAULT_USER_AGENT: &str = "food-access-engine/0.1";
const DEFAULT_CONTACT: &str = "ops@food-access.invalid";

/// Outbound identity and query timeout settings for Overpass requests.
pub struct OverpassHttpIdentity {
    /// HTTP user-agent sent to Overpass.
    pub user_agent: String,
    /// Contact header value sent to Overpass.
    pub contact: String,
    /// Timeout directive embedded in Overpass query text.
    pub query_timeout_seconds: u32,
}

impl Default for OverpassHttpIdentity {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            contact: DEFAULT_CONTACT.to_owned(),
            query_timeout_seconds: DEFAULT_OVERPASS_QUERY_TIMEOUT_SECONDS,
        }
    }
}

/// Overpass adapter that POSTs queries to one interpreter endpoint.
pub struct OverpassHttpSource {
    client: Client,
    endpoint: Url,
    user_agent: String,
    contact: String,
    query_timeout_seconds: u32,
}

impl OverpassHttpSource {
    /// Build an adapter using a reqwest client with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::with_identity(endpoint, timeout, OverpassHttpIdentity::default())
    }

    /// Build an adapter with explicit outbound identity and query timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn with_identity(
        endpoint: Url,
        timeout: Duration,
        identity: OverpassHttpIdentity,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            user_agent: identity.user_agent,
            contact: identity.contact,
            query_timeout_seconds: identity.query_timeout_seconds.max(1),
        })
    }
}

#[async_trait]
impl MapDataSource for OverpassHttpSource {
    async fn fetch_features(
        &self,
        request: &FetchRequest,
    ) -> Result<Vec<RawFeature>, MapDataSourceError> {
        let query = build_overpass_query(request, self.query_timeout_seconds)?;
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::USER_AGENT, self.user_agent.as_str())
            .header("Contact", self.contact.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[("data", query)])
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }

        let features = parse_features(body.as_ref())?;
        debug!(
            transfer_bytes = body.len(),
            feature_count = features.len(),
            "overpass response decoded"
        );
        Ok(features)
    }
}

fn parse_features(body: &[u8]) -> Result<Vec<RawFeature>, MapDataSourceError> {
    let decoded: OverpassResponseDto = serde_json::from_slice(body).map_err(|error| {
        MapDataSourceError::decode(format!("invalid Overpass JSON payload: {error}"))
    })?;
    decoded
        .into_raw_features()
        .map_err(MapDataSourceError::decode)
}

fn build_overpass_query(
    request: &FetchRequest,
    query_timeout_seconds: u32,
) -> Result<String, MapDataSourceError> {
    let areas = match &request.region {
        FetchRegion::BoundingBox(bbox) => vec![bbox_area(bbox)],
        FetchRegion::Polygon(geometry) => poly_areas(geometry)?,
    };

    let selectors = if request.tags.is_empty() {
        vec![String::new()]
    } else {
        request
            .tags
            .iter()
            .map(build_tag_selector)
            .collect::<Result<Vec<_>, _>>()?
    };

    let mut lines = Vec::with_capacity(selectors.len() * areas.len() * 3);
    for selector in &selectors {
        for area in &areas {
            for element_type in ["node", "way", "relation"] {
                lines.push(format!("  {element_type}{selector}{area};"));
            }
        }
    }

    Ok(format!(
        "[out:json][timeout:{query_timeout_seconds}];\n(\n{query_lines}\n);\nout geom;",
        query_lines = lines.join("\n")
    ))
}

fn bbox_area(bbox: &BoundingBox) -> String {
    format!(
        "({min_lat},{min_lng},{max_lat},{max_lng})",
        min_lng = bbox.min_lng(),
        min_lat = bbox.min_lat(),
        max_lng = bbox.max_lng(),
        max_lat = bbox.max_lat(),
    )
}

fn poly_areas(geometry: &MultiPolygon<f64>) -> Result<Vec<String>, MapDataSourceError> {
    if geometry.0.is_empty() {
        return Err(MapDataSourceError::invalid_request(
            "boundary polygon must not be empty",
        ));
    }
    geometry
        .iter()
        .map(|polygon| {
            let mut coords = String::new();
            for coord in polygon.exterior().coords() {
                if !coord.x.is_finite() || !coord.y.is_finite() {
                    return Err(MapDataSourceError::invalid_request(
                        "boundary polygon must contain finite coordinates",
                    ));
                }
                if !coords.is_empty() {
                    coords.push(' ');
                }
                let _ = write!(coords, "{:.7} {:.7}", coord.y, coord.x);
            }
            Ok(format!("(poly:\"{coords}\")"))
        })
        .collect()
}

fn build_tag_selector(filter: &TagFilter) -> Result<String, MapDataSourceError> {
    let key = filter.key.trim();
    if key.is_empty() {
        return Err(MapDataSourceError::invalid_request(
            "tag filters must provide a non-empty key",
        ));
    }
    let escaped_key = escape_quoted(key);
    let values = filter
        .values
        .iter()
        .map(|value| value.trim())
        .collect::<Vec<_>>();
    if values.iter().any(|value| value.is_empty()) {
        return Err(MapDataSourceError::invalid_request(
            "tag filters must not include empty values",
        ));
    }

    // Values match case-insensitively, like category normalisation.
    match values.as_slice() {
        [] => Ok(format!("[\"{escaped_key}\"]")),
        many => {
            let alternatives = many
                .iter()
                .map(|value| escape_regex(value))
                .collect::<Vec<_>>()
                .join("|");
            Ok(format!(
                "[\"{escaped_key}\"~\"^({})$\",i]",
                escape_quoted(&alternatives)
            ))
        }
    }
}

fn escape_quoted(raw: &str) -> String {
    raw.replace('\\', r"\\").replace('"', "\\\"")
}

fn escape_regex(raw: &str) -> String {
    raw.chars().fold(String::with_capacity(raw.len()), |mut out, ch| {
        if "\\.+*?()|[]{}^$".contains(ch) {
            out.push('\\');
        }
        out.push(ch);
        out
    })
}

fn map_transport_error(error: reqwest::Error) -> MapDataSourceError {
    if error.is_timeout() {
        MapDataSourceError::timeout(error.to_string())
    } else {
        MapDataSourceError::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> MapDataSourceError {
    let body_preview = body_preview(body);
    let message = if body_preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {}", status.as_u16(), body_preview)
    };

    match status {
        StatusCode::TOO_MANY_REQUESTS => MapDataSourceError::rate_limited(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            MapDataSourceError::timeout(message)
        }
        _ if status.is_client_error() => MapDataSourceError::invalid_request(message),
        _ => MapDataSourceError::transport(message),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for non-network Overpass mapping helpers.

    use super::*;
    use crate::domain::ports::RawGeometry;
    use geo::polygon;
    use rstest::rstest;

    fn bbox_request(tags: Vec<TagFilter>) -> FetchRequest {
        FetchRequest {
            region: FetchRegion::BoundingBox(
                BoundingBox::try_new(-3.30, 55.90, -3.10, 56.00).expect("valid bbox"),
            ),
            tags,
        }
    }

    #[test]
    fn builds_query_with_bbox_reordered_for_overpass() {
        let query = build_overpass_query(
            &bbox_request(vec![
                TagFilter::new("amenity", &["marketplace"]),
                TagFilter::new("shop", &["supermarket", "health_food"]),
            ]),
            180,
        )
        .expect("query should build");

        assert!(query.starts_with("[out:json][timeout:180];"));
        assert!(
            query.contains("node[\"amenity\"~\"^(marketplace)$\",i](55.9,-3.3,56,-3.1);"),
            "query should include bbox in south,west,north,east order: {query}"
        );
        assert!(query.contains(
            "way[\"shop\"~\"^(supermarket|health_food)$\",i](55.9,-3.3,56,-3.1);"
        ));
        assert!(query.ends_with("out geom;"));
    }

    #[test]
    fn builds_poly_filter_for_boundaries() {
        let request = FetchRequest {
            region: FetchRegion::Polygon(MultiPolygon::from(polygon![
                (x: -75.2, y: 39.9),
                (x: -75.1, y: 39.9),
                (x: -75.1, y: 40.0),
                (x: -75.2, y: 39.9),
            ])),
            tags: vec![TagFilter::new("shop", &["bakery"])],
        };
        let query = build_overpass_query(&request, 60).expect("query should build");
        assert!(query.contains(
            "relation[\"shop\"~\"^(bakery)$\",i](poly:\"39.9000000 -75.2000000 39.9000000 -75.1000000 40.0000000 -75.1000000 39.9000000 -75.2000000\");"
        ));
    }

    #[test]
    fn escapes_quotes_and_regex_metacharacters() {
        let selector = build_tag_selector(&TagFilter::new("name", &["a\"b", "c.d"]))
            .expect("selector should build");
        assert_eq!(selector, "[\"name\"~\"^(a\\\"b|c\\\\.d)$\",i]");
    }

    #[test]
    fn rejects_blank_tag_keys() {
        let error = build_tag_selector(&TagFilter::new(" ", &[])).expect_err("blank key");
        assert!(matches!(error, MapDataSourceError::InvalidRequest { .. }));
    }

    #[rstest]
    #[case::rate_limited(StatusCode::TOO_MANY_REQUESTS, "RateLimited")]
    #[case::request_timeout(StatusCode::REQUEST_TIMEOUT, "Timeout")]
    #[case::gateway_timeout(StatusCode::GATEWAY_TIMEOUT, "Timeout")]
    #[case::bad_request(StatusCode::BAD_REQUEST, "InvalidRequest")]
    #[case::server_error(StatusCode::INTERNAL_SERVER_ERROR, "Transport")]
    fn maps_http_statuses_to_expected_domain_errors(
        #[case] status: StatusCode,
        #[case] expected: &str,
    ) {
        let error = map_status_error(status, b"{\"remark\":\"backend unavailable\"}");
        assert_eq!(error.variant_name(), expected);
    }

    #[test]
    fn previews_long_bodies() {
        let body = "x".repeat(400);
        let preview = body_preview(body.as_bytes());
        assert_eq!(preview.chars().count(), 163);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn parses_nodes_ways_and_relations() {
        let body = r#"{
            "elements": [
                { "type": "node", "id": 101, "lat": 55.91, "lon": -3.21,
                  "tags": { "shop": "bakery" } },
                { "type": "way", "id": 102,
                  "geometry": [
                    { "lat": 55.92, "lon": -3.22 }, { "lat": 55.92, "lon": -3.21 },
                    { "lat": 55.93, "lon": -3.21 }, { "lat": 55.92, "lon": -3.22 }
                  ],
                  "tags": { "shop": "supermarket" } },
                { "type": "way", "id": 103,
                  "geometry": [ { "lat": 55.92, "lon": -3.22 }, { "lat": 55.95, "lon": -3.25 } ] },
                { "type": "relation", "id": 104, "members": [
                    { "type": "way", "ref": 1, "role": "inner", "geometry": [] }
                  ] }
            ]
        }"#;

        let features = parse_features(body.as_bytes()).expect("JSON should decode");
        assert_eq!(features.len(), 4);
        assert_eq!(features[0].external_id, "node/101");
        assert!(matches!(features[0].geometry, RawGeometry::Point(_)));
        assert!(matches!(features[1].geometry, RawGeometry::Footprint(_)));
        assert!(matches!(features[2].geometry, RawGeometry::Line(_)));
        assert!(matches!(features[3].geometry, RawGeometry::Unsupported));
    }

    #[test]
    fn rejects_nodes_without_coordinates() {
        let body = r#"{ "elements": [ { "type": "node", "id": 201 } ] }"#;
        let error = parse_features(body.as_bytes()).expect_err("decode should fail");
        assert!(matches!(error, MapDataSourceError::Decode { .. }));
    }
}
