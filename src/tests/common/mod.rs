// tests/common/mod.rs
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use tokio::task::JoinHandle;

use crate::cache::token::Token;
use crate::config::service_config::ServiceConfig;
use crate::error::TokenError;
use crate::sources::FetchToken;

/// Minimal unsigned JWT with the given payload JSON.
pub fn jwt_with_claims(payload: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(payload);
    format!("{}.{}.", header, payload)
}

/// Minimal unsigned JWT: {"iat": iat, "exp": exp}
pub fn sample_jwt(iat: i64, exp: i64) -> String {
    jwt_with_claims(&format!(r#"{{"iat":{},"exp":{}}}"#, iat, exp))
}

pub fn service_config() -> ServiceConfig {
    ServiceConfig::new(
        "https://api.example.com",
        "client-1",
        "s3cr3t",
        "https://tenant.eu.auth0.com",
    )
    .expect("valid test config")
}

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

#[derive(Debug, Clone, Copy)]
pub enum FakeOutcome {
    /// Issue a token `issued_ago` seconds old that expires in `ttl` seconds.
    Issue { issued_ago: i64, ttl: i64 },
    /// Fail as the endpoint would with this status.
    Fail(u16),
}

struct FakeState {
    calls: AtomicUsize,
    outcome: Mutex<FakeOutcome>,
    delay: Mutex<Duration>,
}

/// In-memory fetcher counting calls. Clones share state, so a test can keep
/// one handle and give the other to the service.
#[derive(Clone)]
pub struct FakeFetcher(Arc<FakeState>);

impl FakeFetcher {
    pub fn new(outcome: FakeOutcome) -> Self {
        Self(Arc::new(FakeState {
            calls: AtomicUsize::new(0),
            outcome: Mutex::new(outcome),
            delay: Mutex::new(Duration::ZERO),
        }))
    }

    pub fn issuing(ttl: i64) -> Self {
        Self::new(FakeOutcome::Issue { issued_ago: 0, ttl })
    }

    pub fn set_outcome(&self, outcome: FakeOutcome) {
        *self.0.outcome.lock().unwrap() = outcome;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.0.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> usize {
        self.0.calls.load(Ordering::SeqCst)
    }
}

impl FetchToken for FakeFetcher {
    async fn fetch_token(&self) -> Result<Token, TokenError> {
        let n = self.0.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = *self.0.outcome.lock().unwrap();
        let delay = *self.0.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match outcome {
            FakeOutcome::Issue { issued_ago, ttl } => {
                let now = Utc::now().timestamp();
                let iat = now - issued_ago;
                // jti keeps every issued credential distinct
                Token::new(jwt_with_claims(&format!(
                    r#"{{"iat":{},"exp":{},"jti":"fake-{}"}}"#,
                    iat,
                    now + ttl,
                    n
                )))
            }
            FakeOutcome::Fail(status) => Err(TokenError::TokenEndpoint {
                status,
                body: "fake failure".to_owned(),
            }),
        }
    }
}
