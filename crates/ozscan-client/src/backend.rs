//! The lookup backend seam.
//!
//! The pipeline talks to [`LookupBackend`] rather than the HTTP client
//! directly, so its drain loop can be tested against a scripted fake. The
//! production implementation composes the client, the token manager, and
//! in-flight de-duplication.

use crate::api::OzClient;
use crate::dedupe::Inflight;
use crate::error::{LookupError, Result};
use crate::token::TokenManager;
use async_trait::async_trait;
use ozscan_core::{AuthRecord, LookupResult, NormalizedAddress};
use tracing::debug;

/// One remote lookup surface: zone checks, geocoding, listing resolution.
#[async_trait]
pub trait LookupBackend: Send + Sync {
    /// Check whether an address falls inside an Opportunity Zone.
    async fn check_address(&self, address: &str) -> Result<LookupResult>;

    /// Check a coordinate pair directly.
    async fn check_coordinates(&self, lat: f64, lon: f64) -> Result<LookupResult>;

    /// Ask the service to re-normalize a free-text address.
    async fn geocode(&self, address: &str) -> Result<Option<String>>;

    /// Resolve the address a listing URL points at, if the service can.
    async fn resolve_listing_address(&self, listing_url: &str) -> Result<Option<String>>;

    /// Snapshot of the current token state, if any.
    async fn auth_status(&self) -> Option<AuthRecord>;

    /// Discard the current token and issue a fresh one.
    async fn force_token_refresh(&self) -> Result<()>;
}

/// Production backend: token-authenticated HTTP with de-duplication.
pub struct RemoteBackend {
    client: OzClient,
    tokens: TokenManager,
    inflight: Inflight,
}

impl RemoteBackend {
    /// Compose a backend from its parts.
    #[must_use]
    pub fn new(client: OzClient, tokens: TokenManager) -> Self {
        Self {
            client,
            tokens,
            inflight: Inflight::new(),
        }
    }

    /// Access the token manager (status reporting).
    #[must_use]
    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Run an authenticated call, retrying once with a fresh token if the
    /// service rejects the one we hold.
    async fn with_token<'a, F, Fut, T>(&'a self, call: F) -> Result<T>
    where
        F: Fn(&'a OzClient, String) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let token = self.tokens.get_token().await?;
        match call(&self.client, token).await {
            Err(LookupError::Auth(reason)) => {
                debug!(reason, "token rejected, refreshing and retrying once");
                let token = self.tokens.force_refresh().await?;
                call(&self.client, token).await
            }
            other => other,
        }
    }
}

#[async_trait]
impl LookupBackend for RemoteBackend {
    async fn check_address(&self, address: &str) -> Result<LookupResult> {
        let key = NormalizedAddress::new(address);
        self.inflight
            .run(key.as_str(), || async {
                let result = self
                    .with_token(|client, token| async move {
                        client.check_address(&token, address).await
                    })
                    .await?;
                self.tokens.record_use().await;
                Ok(result)
            })
            .await
    }

    async fn check_coordinates(&self, lat: f64, lon: f64) -> Result<LookupResult> {
        let key = format!("@{lat},{lon}");
        self.inflight
            .run(&key, || async {
                let result = self
                    .with_token(|client, token| async move {
                        client.check_coordinates(&token, lat, lon).await
                    })
                    .await?;
                self.tokens.record_use().await;
                Ok(result)
            })
            .await
    }

    async fn geocode(&self, address: &str) -> Result<Option<String>> {
        self.with_token(|client, token| async move { client.geocode(&token, address).await })
            .await
    }

    async fn resolve_listing_address(&self, listing_url: &str) -> Result<Option<String>> {
        self.with_token(|client, token| async move {
            client.resolve_listing_address(&token, listing_url).await
        })
        .await
    }

    async fn auth_status(&self) -> Option<AuthRecord> {
        self.tokens.status().await
    }

    async fn force_token_refresh(&self) -> Result<()> {
        self.tokens.force_refresh().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{matchers::*, responders::*, Expectation, Server};
    use ozscan_core::{ApiConfig, StateStore};
    use tempfile::TempDir;

    fn backend_for(server: &Server, dir: &TempDir) -> RemoteBackend {
        let config = ApiConfig {
            base_url: server.url("/").to_string().trim_end_matches('/').to_string(),
            client_version: "ozscan/0.1.0-test".to_string(),
            timeout_secs: 5,
            use_listing_address_fallback: false,
        };
        let client = OzClient::new(&config).expect("create client");
        let tokens = TokenManager::new(client.clone(), StateStore::new(dir.path()), 60);
        RemoteBackend::new(client, tokens)
    }

    fn issuance(token: &str) -> serde_json::Value {
        serde_json::json!({
            "token": token,
            "expiresAt": "2099-01-01T00:00:00Z",
            "usageLimit": 25,
            "isRegistered": false,
        })
    }

    #[tokio::test]
    async fn test_check_address_issues_token_and_records_use() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/temporary-key"))
                .times(1)
                .respond_with(json_encoded(issuance("tok-1"))),
        );
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/opportunity-zones/check"),
                request::headers(contains(("authorization", "Bearer tok-1"))),
            ])
            .times(1)
            .respond_with(json_encoded(serde_json::json!({
                "isInOpportunityZone": false,
            }))),
        );

        let dir = TempDir::new().expect("temp dir");
        let backend = backend_for(&server, &dir);

        let result = backend
            .check_address("123 Main St, Miami, FL 33125")
            .await
            .expect("lookup result");
        assert!(!result.is_in_opportunity_zone);

        let status = backend.tokens().status().await.expect("token status");
        assert_eq!(status.used_count, 1);
    }

    #[tokio::test]
    async fn test_rejected_token_is_refreshed_once() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/temporary-key"))
                .times(2)
                .respond_with(json_encoded(issuance("tok-next"))),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/opportunity-zones/check"))
                .times(2)
                .respond_with(cycle![
                    status_code(401).body("token expired"),
                    json_encoded(serde_json::json!({ "isInOpportunityZone": true })),
                ]),
        );

        let dir = TempDir::new().expect("temp dir");
        let backend = backend_for(&server, &dir);

        let result = backend
            .check_address("789 Flagler St, Miami, FL 33130")
            .await
            .expect("lookup after refresh");
        assert!(result.is_in_opportunity_zone);
    }

    #[tokio::test]
    async fn test_rate_limit_does_not_consume_a_use() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/temporary-key"))
                .times(1)
                .respond_with(json_encoded(issuance("tok-1"))),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/opportunity-zones/check"))
                .times(1)
                .respond_with(status_code(429).body(r#"{"code":"over_limit"}"#)),
        );

        let dir = TempDir::new().expect("temp dir");
        let backend = backend_for(&server, &dir);

        let error = backend
            .check_address("123 Main St, Miami, FL 33125")
            .await
            .expect_err("rate limited");
        assert!(matches!(error, LookupError::RateLimited { .. }));

        let status = backend.tokens().status().await.expect("token status");
        assert_eq!(status.used_count, 0);
    }
}
