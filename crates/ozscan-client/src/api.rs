//! Low-level HTTP client for the Opportunity Zone lookup service.

use crate::error::{LookupError, Result};
use ozscan_core::{ApiConfig, LookupResult};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Header carrying the extension version on every request.
pub const VERSION_HEADER: &str = "x-ozscan-client";

/// Bearer key issued by `POST /temporary-key`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedKey {
    /// Short-lived bearer token
    pub token: String,
    /// Expiry instant reported by the server
    pub expires_at: chrono::DateTime<chrono::Utc>,
    /// Number of lookups the key is good for
    pub usage_limit: u32,
    /// Whether the key belongs to a registered account
    #[serde(default)]
    pub is_registered: bool,
}

/// HTTP client for the lookup service endpoints.
#[derive(Debug, Clone)]
pub struct OzClient {
    http: Client,
    base_url: String,
    client_version: String,
}

impl OzClient {
    /// Create a client from the API configuration.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LookupError::Unavailable(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_version: config.client_version.clone(),
        })
    }

    /// Issue a fresh temporary bearer key. The only unauthenticated call.
    pub async fn issue_key(&self) -> Result<IssuedKey> {
        let response = self
            .request(self.http.post(format!("{}/temporary-key", self.base_url)))
            .send()
            .await
            .map_err(|e| LookupError::Auth(format!("key issuance failed: {e}")))?;

        let response = triage(response).await.map_err(|error| match error {
            // Issuance failures are auth failures regardless of status class
            LookupError::Unavailable(msg) | LookupError::Protocol(msg) => LookupError::Auth(msg),
            other => other,
        })?;

        parse_json(response).await
    }

    /// Check whether an address falls inside an Opportunity Zone.
    pub async fn check_address(&self, token: &str, address: &str) -> Result<LookupResult> {
        let response = self
            .request(self.http.get(format!(
                "{}/opportunity-zones/check",
                self.base_url
            )))
            .bearer_auth(token)
            .query(&[("address", address)])
            .send()
            .await
            .map_err(into_unavailable)?;

        parse_json(triage(response).await?).await
    }

    /// Check a coordinate pair directly, skipping server-side geocoding.
    pub async fn check_coordinates(
        &self,
        token: &str,
        lat: f64,
        lon: f64,
    ) -> Result<LookupResult> {
        let response = self
            .request(self.http.get(format!(
                "{}/opportunity-zones/check",
                self.base_url
            )))
            .bearer_auth(token)
            .query(&[("lat", lat.to_string()), ("lon", lon.to_string())])
            .send()
            .await
            .map_err(into_unavailable)?;

        parse_json(triage(response).await?).await
    }

    /// Ask the service to re-normalize a free-text address.
    ///
    /// Used by the explicit flow when the user edits a detected address.
    /// `Ok(None)` means the service could not resolve it.
    pub async fn geocode(&self, token: &str, address: &str) -> Result<Option<String>> {
        let response = self
            .request(self.http.post(format!(
                "{}/opportunity-zones/geocode",
                self.base_url
            )))
            .bearer_auth(token)
            .json(&serde_json::json!({ "address": address }))
            .send()
            .await
            .map_err(into_unavailable)?;

        let value: Value = parse_json(triage(response).await?).await?;
        Ok(address_from_payload(&value))
    }

    /// Ask the service to resolve the address a listing URL points at.
    ///
    /// The endpoint has shipped several response shapes over time; all are
    /// accepted. `Ok(None)` means the service could not resolve the URL.
    pub async fn resolve_listing_address(
        &self,
        token: &str,
        listing_url: &str,
    ) -> Result<Option<String>> {
        let response = self
            .request(self.http.post(format!("{}/listing-address", self.base_url)))
            .bearer_auth(token)
            .json(&serde_json::json!({ "url": listing_url }))
            .send()
            .await
            .map_err(into_unavailable)?;

        let value: Value = parse_json(triage(response).await?).await?;
        Ok(address_from_payload(&value))
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(VERSION_HEADER, &self.client_version)
    }
}

fn into_unavailable(error: reqwest::Error) -> LookupError {
    LookupError::Unavailable(error.to_string())
}

/// Map a non-success status to the error taxonomy, passing successes through.
async fn triage(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();

    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let code = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|value| value.get("code").and_then(Value::as_str).map(String::from));
            warn!(?code, "remote service rate limited the client");
            Err(LookupError::RateLimited { code })
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(LookupError::Auth(format!("{status}: {body}")))
        }
        // Upstream proxies relay a 429 wrapped in their own 5xx; the body
        // carries the real status
        _ if status.is_server_error() && body.contains("429") => {
            warn!(%status, "rate limit relayed through an upstream error");
            Err(LookupError::RateLimited { code: None })
        }
        _ => Err(LookupError::Unavailable(format!("{status}: {body}"))),
    }
}

/// Parse a success response, requiring a JSON content type.
///
/// The service occasionally misroutes to an SSE endpoint under load; a
/// non-JSON body on a 2xx is a protocol error, not data.
async fn parse_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if !content_type.contains("json") {
        debug!(content_type, "rejecting non-JSON success response");
        return Err(LookupError::Protocol(format!(
            "expected JSON, got content type '{content_type}'"
        )));
    }

    response
        .json()
        .await
        .map_err(|e| LookupError::Protocol(format!("malformed JSON response: {e}")))
}

/// Pull an address out of a tolerant response payload.
///
/// Accepts `address` or `normalizedAddress` at the top level, or either
/// nested under `result`.
fn address_from_payload(value: &Value) -> Option<String> {
    let direct = |value: &Value| {
        value
            .get("address")
            .or_else(|| value.get("normalizedAddress"))
            .and_then(Value::as_str)
            .map(String::from)
    };

    direct(value)
        .or_else(|| value.get("result").and_then(|nested| direct(nested)))
        .map(|address| address.trim().to_string())
        .filter(|address| !address.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{matchers::*, responders::*, Expectation, Server};

    fn client_for(server: &Server) -> OzClient {
        let config = ApiConfig {
            base_url: server.url("/").to_string().trim_end_matches('/').to_string(),
            client_version: "ozscan/0.1.0-test".to_string(),
            timeout_secs: 5,
            use_listing_address_fallback: false,
        };
        OzClient::new(&config).expect("create client")
    }

    #[tokio::test]
    async fn test_check_address_success() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/opportunity-zones/check"),
                request::query(url_decoded(contains((
                    "address",
                    "789 Flagler St, Miami, FL 33130"
                )))),
                request::headers(contains(("authorization", "Bearer tok-1"))),
                request::headers(contains(("x-ozscan-client", "ozscan/0.1.0-test"))),
            ])
            .respond_with(json_encoded(serde_json::json!({
                "isInOpportunityZone": true,
                "opportunityZoneId": "12086003700",
            }))),
        );

        let result = client_for(&server)
            .check_address("tok-1", "789 Flagler St, Miami, FL 33130")
            .await
            .expect("lookup result");

        assert!(result.is_in_opportunity_zone);
        assert_eq!(result.opportunity_zone_id.as_deref(), Some("12086003700"));
    }

    #[tokio::test]
    async fn test_rate_limit_is_structurally_distinct() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/opportunity-zones/check"))
                .respond_with(
                    status_code(429).body(r#"{"code":"over_limit"}"#),
                ),
        );

        let error = client_for(&server)
            .check_address("tok-1", "123 Main St, Miami, FL 33125")
            .await
            .expect_err("rate limited");

        assert_eq!(
            error,
            LookupError::RateLimited {
                code: Some("over_limit".to_string())
            }
        );
    }

    #[tokio::test]
    async fn test_5xx_relaying_a_429_is_rate_limited() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/opportunity-zones/check"))
                .respond_with(
                    status_code(502)
                        .body(r#"{"details":"upstream returned 429 Too Many Requests"}"#),
                ),
        );

        let error = client_for(&server)
            .check_address("tok-1", "123 Main St, Miami, FL 33125")
            .await
            .expect_err("rate limited");

        assert_eq!(error, LookupError::RateLimited { code: None });
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/opportunity-zones/check"))
                .respond_with(status_code(503)),
        );

        let error = client_for(&server)
            .check_address("tok-1", "123 Main St, Miami, FL 33125")
            .await
            .expect_err("unavailable");

        assert!(matches!(error, LookupError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_non_json_success_is_protocol_error() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/opportunity-zones/check"))
                .respond_with(
                    status_code(200)
                        .append_header("content-type", "text/event-stream")
                        .body("data: nope\n\n"),
                ),
        );

        let error = client_for(&server)
            .check_address("tok-1", "123 Main St, Miami, FL 33125")
            .await
            .expect_err("protocol error");

        assert!(matches!(error, LookupError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_issue_key() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/temporary-key")).respond_with(
                json_encoded(serde_json::json!({
                    "token": "tok-fresh",
                    "expiresAt": "2099-01-01T00:00:00Z",
                    "usageLimit": 25,
                    "isRegistered": false,
                })),
            ),
        );

        let key = client_for(&server).issue_key().await.expect("issued key");
        assert_eq!(key.token, "tok-fresh");
        assert_eq!(key.usage_limit, 25);
        assert!(!key.is_registered);
    }

    #[tokio::test]
    async fn test_geocode_renormalizes() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/opportunity-zones/geocode"),
                request::body(json_decoded(eq(serde_json::json!({
                    "address": "123 main street miami florida"
                })))),
            ])
            .respond_with(json_encoded(serde_json::json!({
                "normalizedAddress": "123 Main St, Miami, FL 33125",
                "meta": {"confidence": 0.93},
            }))),
        );

        let resolved = client_for(&server)
            .geocode("tok-1", "123 main street miami florida")
            .await
            .expect("geocode result");
        assert_eq!(resolved.as_deref(), Some("123 Main St, Miami, FL 33125"));
    }

    #[tokio::test]
    async fn test_listing_address_accepts_all_shapes() {
        for body in [
            serde_json::json!({"address": "123 Main St, Miami, FL 33125"}),
            serde_json::json!({"normalizedAddress": "123 Main St, Miami, FL 33125"}),
            serde_json::json!({"result": {"address": "123 Main St, Miami, FL 33125"}}),
            serde_json::json!({"result": {"normalizedAddress": "123 Main St, Miami, FL 33125"}}),
        ] {
            let server = Server::run();
            server.expect(
                Expectation::matching(request::method_path("POST", "/listing-address"))
                    .respond_with(json_encoded(body)),
            );

            let resolved = client_for(&server)
                .resolve_listing_address("tok-1", "https://example.com/listing/1")
                .await
                .expect("resolution");
            assert_eq!(resolved.as_deref(), Some("123 Main St, Miami, FL 33125"));
        }
    }

    #[tokio::test]
    async fn test_listing_address_unresolved_is_none() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/listing-address"))
                .respond_with(json_encoded(serde_json::json!({"address": null}))),
        );

        let resolved = client_for(&server)
            .resolve_listing_address("tok-1", "https://example.com/listing/1")
            .await
            .expect("resolution");
        assert!(resolved.is_none());
    }
}
