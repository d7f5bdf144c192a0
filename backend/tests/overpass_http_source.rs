//! Integration tests for the Overpass adapter against a local HTTP server.
//!
//! `wiremock` stands in for the interpreter endpoint so no real network
//! traffic is made.

use std::time::Duration;

use food_access::domain::BoundingBox;
use food_access::domain::ingestion::store_tag_filters;
use food_access::domain::ports::{
    FetchRegion, FetchRequest, MapDataSource, MapDataSourceError, RawGeometry,
};
use food_access::outbound::overpass::{OverpassHttpIdentity, OverpassHttpSource};
use reqwest::Url;
use rstest::rstest;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn source(server: &MockServer, timeout: Duration) -> OverpassHttpSource {
    let endpoint = Url::parse(&format!("{}/api/interpreter", server.uri())).expect("endpoint");
    OverpassHttpSource::with_identity(
        endpoint,
        timeout,
        OverpassHttpIdentity {
            user_agent: "food-access-test/0.1".to_owned(),
            contact: "tests@food-access.invalid".to_owned(),
            query_timeout_seconds: 25,
        },
    )
    .expect("client builds")
}

fn request() -> FetchRequest {
    FetchRequest {
        region: FetchRegion::BoundingBox(
            BoundingBox::try_new(-75.18, 39.94, -75.15, 39.96).expect("bbox"),
        ),
        tags: store_tag_filters(),
    }
}

#[tokio::test]
async fn posts_query_and_decodes_features() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/interpreter"))
        .and(header("user-agent", "food-access-test/0.1"))
        .and(body_string_contains("timeout%3A25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "elements": [
                { "type": "node", "id": 1, "lat": 39.95, "lon": -75.16,
                  "tags": { "shop": "supermarket", "name": "Corner Market" } }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let features = source(&server, Duration::from_secs(5))
        .fetch_features(&request())
        .await
        .expect("fetch succeeds");

    assert_eq!(features.len(), 1);
    assert_eq!(features[0].external_id, "node/1");
    assert!(matches!(features[0].geometry, RawGeometry::Point(_)));
    assert_eq!(
        features[0].tags.get("name").map(String::as_str),
        Some("Corner Market")
    );
}

#[rstest]
#[case::rate_limited(429, "RateLimited", true)]
#[case::gateway_timeout(504, "Timeout", true)]
#[case::bad_query(400, "InvalidRequest", false)]
#[case::server_error(500, "Transport", true)]
#[tokio::test]
async fn maps_error_statuses(
    #[case] status: u16,
    #[case] expected: &str,
    #[case] retryable: bool,
) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(status).set_body_string("runtime error: busy"))
        .mount(&server)
        .await;

    let error = source(&server, Duration::from_secs(5))
        .fetch_features(&request())
        .await
        .expect_err("status should fail");

    assert_eq!(error.variant_name(), expected);
    assert_eq!(error.is_retryable(), retryable);
    assert!(error.to_string().contains("runtime error: busy"));
}

#[tokio::test]
async fn slow_responses_become_timeouts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "elements": [] }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let error = source(&server, Duration::from_millis(50))
        .fetch_features(&request())
        .await
        .expect_err("request should time out");

    assert!(matches!(error, MapDataSourceError::Timeout { .. }));
}

#[tokio::test]
async fn malformed_json_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let error = source(&server, Duration::from_secs(5))
        .fetch_features(&request())
        .await
        .expect_err("decode should fail");

    assert!(matches!(error, MapDataSourceError::Decode { .. }));
    assert!(!error.is_retryable());
}
