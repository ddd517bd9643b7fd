//! End-to-end pipeline tests against a mock HTTP server.
//!
//! These wire the real client stack (token manager, in-flight dedup,
//! remote backend) into the orchestrator and drive it through the
//! message surface, the way the extension host would.

use httptest::{matchers::*, responders::*, Expectation, Server};
use ozscan_client::{OzClient, RemoteBackend, TokenManager};
use ozscan_core::{PipelineConfig, StateStore};
use ozscan_pipeline::{ExplicitOutcome, Orchestrator, PipelineHandle};
use ozscan_sites::SiteRegistry;
use std::time::Duration;
use tempfile::TempDir;

fn issuance_response() -> serde_json::Value {
    serde_json::json!({
        "token": "tok-pipeline",
        "expiresAt": "2099-01-01T00:00:00Z",
        "usageLimit": 100,
        "isRegistered": false,
    })
}

fn in_zone_response(id: &str) -> serde_json::Value {
    serde_json::json!({
        "isInOpportunityZone": true,
        "opportunityZoneId": id,
    })
}

fn config_for(server: &Server) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.api.base_url = server.url("/").to_string().trim_end_matches('/').to_string();
    config.api.timeout_secs = 5;
    // No pacing delay; these tests run on real time
    config.queue.inter_request_delay_ms = 0;
    config
}

fn pipeline_for(config: PipelineConfig, dir: &TempDir) -> PipelineHandle {
    let client = OzClient::new(&config.api).expect("create client");
    let tokens = TokenManager::new(
        OzClient::new(&config.api).expect("create client"),
        StateStore::new(dir.path()),
        config.auth.expiry_skew_secs,
    );
    let backend = RemoteBackend::new(client, tokens);

    Orchestrator::new(
        config,
        backend,
        SiteRegistry::with_builtin(),
        StateStore::new(dir.path()),
    )
    .spawn(Duration::from_secs(5))
}

fn page(addresses: &[&str]) -> String {
    let body: String = addresses
        .iter()
        .map(|address| format!("<p>Located at {address}.</p>"))
        .collect();
    format!("<html><body>{body}</body></html>")
}

const URL: &str = "https://listings.example/property/1";

#[tokio::test]
async fn test_scan_hits_network_once_then_serves_from_cache() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("POST", "/temporary-key"))
            .times(1)
            .respond_with(json_encoded(issuance_response())),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/opportunity-zones/check"),
            request::query(url_decoded(contains((
                "address",
                "789 Flagler St, Miami, FL 33130"
            )))),
        ])
        .times(1)
        .respond_with(json_encoded(in_zone_response("12086003700"))),
    );

    let dir = TempDir::new().expect("temp dir");
    let handle = pipeline_for(config_for(&server), &dir);

    let html = page(&["789 Flagler St, Miami, FL 33130"]);
    let report = handle
        .scan_page(html.clone(), URL.to_string(), false)
        .await
        .expect("scan reply");
    assert_eq!(report.results.len(), 1);
    assert!(report.results[0].result.is_in_opportunity_zone);
    assert_eq!(
        report.results[0].result.opportunity_zone_id.as_deref(),
        Some("12086003700")
    );

    // Manual rescan reprocesses the address; the `times(1)` expectations
    // prove the cache answered without another network round trip
    let report = handle
        .scan_page(html, URL.to_string(), true)
        .await
        .expect("rescan reply");
    assert_eq!(report.results.len(), 1);
    assert!(report.results[0].result.is_in_opportunity_zone);
}

#[tokio::test]
async fn test_rate_limit_pause_delays_then_resumes_lookups() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("POST", "/temporary-key"))
            .times(1)
            .respond_with(json_encoded(issuance_response())),
    );
    // First check is throttled; the retry after the backoff succeeds
    server.expect(
        Expectation::matching(request::method_path("GET", "/opportunity-zones/check"))
            .times(2)
            .respond_with(httptest::cycle![
                status_code(429).body(r#"{"code":"over_limit"}"#),
                json_encoded(in_zone_response("12086003700")),
            ]),
    );

    let dir = TempDir::new().expect("temp dir");
    let mut config = config_for(&server);
    config.queue.rate_limit_backoff_ms = 50;
    let handle = pipeline_for(config, &dir);

    let report = handle
        .scan_page(
            page(&[
                "1 First St, Miami, FL 33101",
                "2 Second Ave, Miami, FL 33102",
            ]),
            URL.to_string(),
            false,
        )
        .await
        .expect("scan reply");

    // The throttled address is not retried, but the queued one survives
    // the pause and completes within the same scan
    assert!(report.rate_limited);
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].address, "2 Second Ave, Miami, FL 33102");
    assert!(report.results[0].result.is_in_opportunity_zone);
}

#[tokio::test]
async fn test_page_quota_caps_remote_lookups() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("POST", "/temporary-key"))
            .times(1)
            .respond_with(json_encoded(issuance_response())),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/opportunity-zones/check"))
            .times(2)
            .respond_with(json_encoded(serde_json::json!({
                "isInOpportunityZone": false,
            }))),
    );

    let dir = TempDir::new().expect("temp dir");
    let mut config = config_for(&server);
    config.scan.max_checks_per_page = 2;
    let handle = pipeline_for(config, &dir);

    let report = handle
        .scan_page(
            page(&[
                "1 First St, Miami, FL 33101",
                "2 Second Ave, Miami, FL 33102",
                "3 Third Blvd, Miami, FL 33103",
            ]),
            URL.to_string(),
            false,
        )
        .await
        .expect("scan reply");

    assert!(report.quota_exhausted);
    assert_eq!(report.results.len(), 2);
}

#[tokio::test]
async fn test_explicit_check_round_trip() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("POST", "/temporary-key"))
            .times(1)
            .respond_with(json_encoded(issuance_response())),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/opportunity-zones/check"),
            request::query(url_decoded(contains((
                "address",
                "123 Main St, Miami, FL 33125"
            )))),
        ])
        .times(1)
        .respond_with(json_encoded(in_zone_response("12086004902"))),
    );

    let dir = TempDir::new().expect("temp dir");
    let handle = pipeline_for(config_for(&server), &dir);

    let outcome = handle
        .check_address("123 Main St, Miami, FL 33125".to_string())
        .await
        .expect("check reply");
    let ExplicitOutcome::Result(result) = outcome else {
        panic!("expected a lookup result, got {outcome:?}");
    };
    assert!(result.is_in_opportunity_zone);

    // Auth state reflects the issued key and the consumed use
    let auth = handle.auth_status().await.expect("auth record");
    assert_eq!(auth.token, "tok-pipeline");
    assert_eq!(auth.used_count, 1);
}

#[tokio::test]
async fn test_edit_renormalizes_before_reconfirmation() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("POST", "/temporary-key"))
            .times(1)
            .respond_with(json_encoded(issuance_response())),
    );
    server.expect(
        Expectation::matching(request::method_path("POST", "/opportunity-zones/geocode"))
            .times(1)
            .respond_with(json_encoded(serde_json::json!({
                "normalizedAddress": "123 Main St, Miami, FL 33125",
            }))),
    );

    let dir = TempDir::new().expect("temp dir");
    let handle = pipeline_for(config_for(&server), &dir);

    let outcome = handle
        .edit_address("123 main street miami".to_string())
        .await
        .expect("edit reply");
    assert_eq!(
        outcome,
        ozscan_pipeline::EditOutcome::Renormalized("123 Main St, Miami, FL 33125".to_string())
    );
}
