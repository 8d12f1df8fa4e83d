//! Mock server helpers for manifest fetching
//!
//! Wiremock endpoints that serve manifest documents with fixed status codes.

#![allow(dead_code)]

use url::Url;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path served by [`mock_manifest`]
pub const MANIFEST_PATH: &str = "/extensions/extensions.json";

/// Serve `body` with `status` at [`MANIFEST_PATH`]
pub async fn mock_manifest(server: &MockServer, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(MANIFEST_PATH))
        .and(header_exists("user-agent"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

/// Serve `body` exactly once, then fall through to later mocks
pub async fn mock_manifest_once(server: &MockServer, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(MANIFEST_PATH))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .up_to_n_times(1)
        .mount(server)
        .await;
}

/// URL of [`MANIFEST_PATH`] on `server`
pub fn manifest_url(server: &MockServer) -> Url {
    Url::parse(&format!("{}{}", server.uri(), MANIFEST_PATH)).unwrap()
}
