use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use http::{header::CONTENT_TYPE, StatusCode};
use serde::Deserialize;
use tracing::warn;

use crate::cache::refresh_policy::RefreshPolicy;
use crate::error::TokenError;
use crate::server::server::AppState;
use crate::sources::FetchToken;

pub const TOKEN_PATH: &str = "/token";
pub const HEALTH_PATH: &str = "/health";

/// Per-request overrides of the service's default refresh policy.
#[derive(Debug, Deserialize, Default)]
pub struct TokenQuery {
    pub max_age_seconds: Option<u64>,
    pub expiration_threshold_seconds: Option<u64>,
}

impl TokenQuery {
    fn policy(&self, default: RefreshPolicy) -> RefreshPolicy {
        let max_age = self
            .max_age_seconds
            .map(Duration::from_secs)
            .unwrap_or_else(|| default.max_age().to_std().unwrap_or(Duration::MAX));
        let threshold = self
            .expiration_threshold_seconds
            .map(Duration::from_secs)
            .unwrap_or_else(|| default.expiration_threshold().to_std().unwrap_or(Duration::ZERO));
        RefreshPolicy::new(max_age, threshold)
    }
}

pub fn router<F: FetchToken + 'static>() -> Router<AppState<F>> {
    Router::new()
        .route(TOKEN_PATH, get(get_token::<F>))
        .route(HEALTH_PATH, get(health))
}

async fn get_token<F: FetchToken + 'static>(
    State(state): State<AppState<F>>,
    Query(query): Query<TokenQuery>,
) -> Response {
    let policy = query.policy(state.service.default_policy());

    match state.service.request_token_with(policy).await {
        Ok(token) => (StatusCode::OK, [(CONTENT_TYPE, "text/plain")], token).into_response(),
        Err(e) => {
            warn!(error = %e, "token request failed");
            let status = match &e {
                TokenError::ServiceClosed => StatusCode::SERVICE_UNAVAILABLE,
                TokenError::TokenUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, e.to_string()).into_response()
        }
    }
}

async fn health() -> &'static str {
    "ok"
}
