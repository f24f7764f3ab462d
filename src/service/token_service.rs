use std::sync::{Arc, PoisonError, RwLock};

use chrono::TimeDelta;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::cache::refresh_policy::{RefreshDecision, RefreshPolicy};
use crate::cache::token::Token;
use crate::cache::token_cell::TokenCell;
use crate::config::service_config::ServiceConfig;
use crate::config::settings::HttpConfig;
use crate::error::TokenError;
use crate::observability::metrics::{
    get_metrics, OUTCOME_CACHED, OUTCOME_CLOSED, OUTCOME_REFRESHED, OUTCOME_STALE, OUTCOME_UNAVAILABLE,
};
use crate::resilience::retry::RetrySettings;
use crate::sources::{build_client, ClientCredentialsFetcher, FetchToken};

/// Hands out the cached token for one client identity, refreshing it
/// through the fetcher when the refresh policy asks for it.
///
/// All refreshes go through one [`TokenCell`], so concurrent callers share
/// a single in-flight fetch. The policy applied is the one passed by the
/// caller whose turn it is; a caller queued behind it may receive a token
/// fetched under looser or stricter limits than its own.
pub struct TokenService<F = ClientCredentialsFetcher> {
    cell: TokenCell,
    fetcher: RwLock<Option<Arc<F>>>,
    closed: watch::Sender<bool>,
    default_policy: RefreshPolicy,
}

impl TokenService<ClientCredentialsFetcher> {
    /// Service talking to the configured tenant over a pooled client.
    pub fn from_config(config: &ServiceConfig, http: &HttpConfig) -> Result<Self, TokenError> {
        let client = build_client(http)?;
        let fetcher = ClientCredentialsFetcher::new(config, client).with_retry(RetrySettings::from(&http.retry));
        info!(audience = %config.audience(), endpoint = %fetcher.endpoint(), "token service created");
        Ok(Self::new(fetcher))
    }
}

impl<F: FetchToken> TokenService<F> {
    pub fn new(fetcher: F) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            cell: TokenCell::new(),
            fetcher: RwLock::new(Some(Arc::new(fetcher))),
            closed,
            default_policy: RefreshPolicy::default(),
        }
    }

    /// Policy used by [`TokenService::request_token`].
    pub fn with_default_policy(mut self, policy: RefreshPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    pub fn default_policy(&self) -> RefreshPolicy {
        self.default_policy
    }

    /// Token string under the default policy (12h max age, 20m threshold
    /// unless overridden).
    pub async fn request_token(&self) -> Result<String, TokenError> {
        self.request_token_with(self.default_policy).await
    }

    pub async fn request_token_with(&self, policy: RefreshPolicy) -> Result<String, TokenError> {
        let metrics = get_metrics().await;
        let mut closed = self.closed.subscribe();
        let is_closed = *closed.borrow_and_update();
        let fetcher = match self.current_fetcher() {
            Some(fetcher) if !is_closed => fetcher,
            _ => {
                metrics.token_requests.with_label_values(&[OUTCOME_CLOSED]).inc();
                return Err(TokenError::ServiceClosed);
            }
        };

        let update = self
            .cell
            .update_and_get(|current| refresh(policy, current, fetcher.as_ref(), &self.closed));

        // closed first: a queued caller handed the lock after shutdown must not fetch
        let res = tokio::select! {
            biased;
            _ = async { let _ = closed.wait_for(|is_closed| *is_closed).await; } => Err(TokenError::ServiceClosed),
            res = update => res.map(Token::into_raw),
        };
        if matches!(res, Err(TokenError::ServiceClosed)) {
            metrics.token_requests.with_label_values(&[OUTCOME_CLOSED]).inc();
        }
        res
    }

    /// Cached token without touching the network.
    pub async fn cached_token(&self) -> Option<Token> {
        self.cell.get().await
    }

    /// Cancel queued and in-flight requests and drop the fetcher with its
    /// connection pool. Later requests fail with `ServiceClosed`.
    pub fn shutdown(&self) {
        if self.closed.send_replace(true) {
            return;
        }
        let fetcher = self
            .fetcher
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(fetcher);
        info!("token service shut down");
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    fn current_fetcher(&self) -> Option<Arc<F>> {
        self.fetcher
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// One turn of the cell: reuse, refresh, or fall back to the cached token.
async fn refresh<F: FetchToken>(
    policy: RefreshPolicy,
    current: Option<Token>,
    fetcher: &F,
    closed: &watch::Sender<bool>,
) -> Result<Token, TokenError> {
    if *closed.borrow() {
        return Err(TokenError::ServiceClosed);
    }
    let metrics = get_metrics().await;

    let (reason, current) = match policy.decide(current) {
        RefreshDecision::Reuse(token) => {
            debug!(expires_in = token.time_until_expiry().num_seconds(), "reusing cached token");
            metrics.token_requests.with_label_values(&[OUTCOME_CACHED]).inc();
            return Ok(token);
        }
        RefreshDecision::Fetch { reason, current } => (reason, current),
    };

    debug!(reason = reason.as_str(), "fetching new token");
    match fetcher.fetch_token().await {
        Ok(token) => {
            info!(reason = reason.as_str(), expires_at = %token.expires_at(), "token refreshed");
            metrics.token_requests.with_label_values(&[OUTCOME_REFRESHED]).inc();
            metrics.token_expiry_unix.set(token.expires_at().timestamp());
            Ok(token)
        }
        Err(e) => match current.filter(|t| !t.is_expired(TimeDelta::zero())) {
            Some(stale) => {
                warn!(
                    error = %e,
                    expires_in = stale.time_until_expiry().num_seconds(),
                    "refresh failed, serving cached token"
                );
                metrics.token_requests.with_label_values(&[OUTCOME_STALE]).inc();
                Ok(stale)
            }
            None => {
                error!(error = %e, "refresh failed and no usable token is cached");
                metrics.token_requests.with_label_values(&[OUTCOME_UNAVAILABLE]).inc();
                Err(TokenError::TokenUnavailable(Box::new(e)))
            }
        },
    }
}
