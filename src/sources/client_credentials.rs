use std::fmt;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::token::Token;
use crate::config::service_config::ServiceConfig;
use crate::config::settings::HttpConfig;
use crate::error::TokenError;
use crate::observability::metrics::get_metrics;
use crate::resilience::retry::RetrySettings;
use crate::sources::FetchToken;

static GRANT_TYPE: &str = "client_credentials";
static ACCESS_TOKEN_FIELD: &str = "access_token";

/// Body of a client-credentials request. `grant_type` and `json` are fixed.
#[derive(Serialize, Clone)]
pub struct TokenRequest {
    client_id: String,
    client_secret: String,
    audience: String,
    grant_type: &'static str,
    json: bool,
}

impl TokenRequest {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            client_id: config.client_id().to_owned(),
            client_secret: config.client_secret().to_owned(),
            audience: config.audience().to_owned(),
            grant_type: GRANT_TYPE,
            json: true,
        }
    }
}

impl fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRequest")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("audience", &self.audience)
            .field("grant_type", &self.grant_type)
            .field("json", &self.json)
            .finish()
    }
}

/// Build the pooled HTTP client used for token requests.
pub fn build_client(http: &HttpConfig) -> Result<Client, TokenError> {
    Client::builder()
        .connect_timeout(http.connect_timeout())
        .timeout(http.call_timeout())
        .pool_max_idle_per_host(http.pool_max_idle_per_host)
        .pool_idle_timeout(http.pool_idle_timeout())
        .build()
        .map_err(|e| TokenError::Configuration(format!("http client: {}", e)))
}

/// POSTs client credentials to the token endpoint and parses `access_token`.
#[derive(Debug, Clone)]
pub struct ClientCredentialsFetcher {
    endpoint: String,
    request: TokenRequest,
    client: Client,
    retry: RetrySettings,
}

impl ClientCredentialsFetcher {
    pub fn new(config: &ServiceConfig, client: Client) -> Self {
        Self {
            endpoint: config.token_endpoint(),
            request: TokenRequest::new(config),
            client,
            retry: RetrySettings::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    /// Point at a plain-http mock server.
    #[cfg(test)]
    pub(crate) fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn exchange(&self) -> Result<Token, TokenError> {
        debug!(endpoint = %self.endpoint, "requesting client-credentials token");
        let response = self.client.post(&self.endpoint).json(&self.request).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if status.as_u16() >= 400 {
            return Err(TokenError::TokenEndpoint { status: status.as_u16(), body });
        }
        parse_token_response(body)
    }
}

impl FetchToken for ClientCredentialsFetcher {
    async fn fetch_token(&self) -> Result<Token, TokenError> {
        let metrics = get_metrics().await;
        let start = Instant::now();
        metrics.fetch_requests.inc();

        let res = self.retry.run_with_retry(|| self.exchange(), TokenError::is_transport).await;

        metrics.fetch_duration.observe(start.elapsed().as_secs_f64());
        match &res {
            Ok(token) => debug!(expires_at = %token.expires_at(), "token received"),
            Err(e) => {
                metrics.fetch_failures.with_label_values(&[e.reason()]).inc();
                warn!(error = %e, "token request failed");
            }
        }
        res
    }
}

fn parse_token_response(body: String) -> Result<Token, TokenError> {
    let access_token = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|json| json.get(ACCESS_TOKEN_FIELD)?.as_str().map(str::to_owned));

    match access_token {
        Some(raw) => Token::new(raw),
        None => Err(TokenError::MalformedResponse { body }),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;

    use super::{build_client, parse_token_response, ClientCredentialsFetcher, TokenRequest};
    use crate::config::settings::HttpConfig;
    use crate::error::TokenError;
    use crate::resilience::retry::RetrySettings;
    use crate::sources::FetchToken;
    use crate::tests::common::{sample_jwt, service_config};

    fn fetcher(server: &MockServer) -> ClientCredentialsFetcher {
        let client = build_client(&HttpConfig::default()).unwrap();
        ClientCredentialsFetcher::new(&service_config(), client).with_endpoint(server.url("/oauth/token"))
    }

    #[tokio::test]
    async fn posts_client_credentials_and_parses_token() {
        let server = MockServer::start_async().await;
        let now = Utc::now().timestamp();
        let jwt = sample_jwt(now, now + 3600);

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/oauth/token")
                    .header("content-type", "application/json")
                    .json_body(json!({
                        "client_id": "client-1",
                        "client_secret": "s3cr3t",
                        "audience": "https://api.example.com",
                        "grant_type": "client_credentials",
                        "json": true
                    }));
                then.status(200).json_body(json!({
                    "access_token": jwt,
                    "token_type": "Bearer",
                    "expires_in": 3600
                }));
            })
            .await;

        let token = fetcher(&server).fetch_token().await.unwrap();
        assert_eq!(token.raw(), jwt);
        assert_eq!(token.expires_at().timestamp(), now + 3600);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn error_status_carries_status_and_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/oauth/token");
                then.status(401).body(r#"{"error":"access_denied"}"#);
            })
            .await;

        match fetcher(&server).fetch_token().await {
            Err(TokenError::TokenEndpoint { status, body }) => {
                assert_eq!(status, 401);
                assert!(body.contains("access_denied"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn endpoint_errors_are_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/oauth/token");
                then.status(500).body("internal");
            })
            .await;

        let retry = RetrySettings { attempts: 3, base_delay_ms: 1, max_delay_ms: 2 };
        let res = fetcher(&server).with_retry(retry).fetch_token().await;
        assert!(matches!(res, Err(TokenError::TokenEndpoint { status: 500, .. })));
        assert_eq!(mock.hits_async().await, 1);
    }

    #[tokio::test]
    async fn missing_access_token_is_malformed_response() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/oauth/token");
                then.status(200).json_body(json!({ "token_type": "Bearer" }));
            })
            .await;

        match fetcher(&server).fetch_token().await {
            Err(TokenError::MalformedResponse { body }) => assert!(body.contains("Bearer")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn non_json_or_non_string_token_is_malformed_response() {
        for body in ["not json", r#"{"access_token": 42}"#, "[]"] {
            let res = parse_token_response(body.to_owned());
            assert!(matches!(res, Err(TokenError::MalformedResponse { .. })), "{}", body);
        }
    }

    #[test]
    fn opaque_access_token_is_malformed_credential() {
        let res = parse_token_response(r#"{"access_token":"opaque"}"#.to_owned());
        assert!(matches!(res, Err(TokenError::MalformedCredential(_))));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        let http = HttpConfig { connect_timeout_ms: 500, call_timeout_ms: 500, ..HttpConfig::default() };
        let client = build_client(&http).unwrap();
        // nothing listens on port 1
        let fetcher = ClientCredentialsFetcher::new(&service_config(), client)
            .with_endpoint("http://127.0.0.1:1/oauth/token".to_owned());

        let res = tokio::time::timeout(Duration::from_secs(5), fetcher.fetch_token()).await.unwrap();
        assert!(matches!(res, Err(TokenError::Transport(_))));
    }

    #[test]
    fn endpoint_is_derived_from_config() {
        let client = build_client(&HttpConfig::default()).unwrap();
        let fetcher = ClientCredentialsFetcher::new(&service_config(), client);
        assert_eq!(fetcher.endpoint(), "https://tenant.eu.auth0.com/oauth/token");
    }

    #[test]
    fn request_debug_lists_sent_fields_without_secret() {
        let debug = format!("{:?}", TokenRequest::new(&service_config()));
        assert!(debug.contains("json: true"));
        assert!(debug.contains("grant_type: \"client_credentials\""));
        assert!(!debug.contains("s3cr3t"));
    }
}
