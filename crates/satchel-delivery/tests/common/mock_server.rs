//! Mock ingest API endpoints

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const API_USER: &str = "archivist@example.org";
pub const API_KEY: &str = "secret-key";
pub const PREFIX: &str = "example.org/";

/// Respond to the items query for `identifier` with one result
pub async fn mock_ingest_result(server: &MockServer, identifier: &str, status: &str, stage: &str) {
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(query_param("object_identifier", format!("{}{}", PREFIX, identifier)))
        .and(query_param("action", "Ingest"))
        .and(query_param("sort", "date_processed__desc"))
        .and(query_param("per_page", "1"))
        .and(header("X-Pharos-API-User", API_USER))
        .and(header("X-Pharos-API-Key", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1,
            "results": [{
                "status": status,
                "stage": stage,
                "object_identifier": format!("{}{}", PREFIX, identifier),
                "date_processed": "2024-03-05T14:07:09Z"
            }]
        })))
        .mount(server)
        .await;
}

/// Respond with an empty result set
pub async fn mock_no_results(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 0,
            "results": []
        })))
        .mount(server)
        .await;
}

/// Fail the first `fail_count` requests with 503
pub async fn mock_flaky_then(server: &MockServer, fail_count: u64, identifier: &str) {
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(fail_count)
        .mount(server)
        .await;
    mock_ingest_result(server, identifier, "Success", "Cleanup").await;
}

/// Always fail with 500
pub async fn mock_failing(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(500))
        .mount(server)
        .await;
}

/// Always answer with `status`
pub async fn mock_status(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}
