use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tracing::info;

use crate::config::settings::{MetricsConfig, SettingsConfig};
use crate::observability::metrics::{get_metrics, Metrics};
use crate::observability::routes::MetricsState;
use crate::server::token_routes;
use crate::service::TokenService;
use crate::sources::FetchToken;

pub struct AppState<F> {
    pub metrics_state: MetricsState,
    pub service: Arc<TokenService<F>>,
}

// manual impl: `F` itself need not be Clone
impl<F> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            metrics_state: self.metrics_state.clone(),
            service: self.service.clone(),
        }
    }
}

impl<F> AppState<F> {
    pub fn new(metrics: &Metrics, service: Arc<TokenService<F>>) -> Self {
        Self {
            metrics_state: MetricsState::new(metrics.registry.clone()),
            service,
        }
    }
}

pub fn router<F: FetchToken + 'static>(state: AppState<F>, metrics_config: &MetricsConfig) -> Router {
    Router::new()
        .merge(token_routes::router::<F>())
        .merge(state.metrics_state.router::<F>(metrics_config))
        .with_state(state)
}

/// Serve the token and metrics routes until `shutdown` resolves, then shut
/// the token service down so waiting requests return immediately.
pub async fn start<F, S>(
    settings_config: &SettingsConfig,
    service: Arc<TokenService<F>>,
    shutdown: S,
) -> Result<()>
where
    F: FetchToken + 'static,
    S: Future<Output = ()> + Send + 'static,
{
    let metrics = get_metrics().await;
    let state = AppState::new(metrics, service.clone());
    let app = router(state, &settings_config.metrics);

    let bind_addr = format!("{}:{}", settings_config.server.host, settings_config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {}", bind_addr))?;
    info!(address = %bind_addr, "token server listening");

    metrics.up.set(1);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("shutdown signal received");
            service.shutdown();
        })
        .await
        .context("token server failed")?;
    metrics.up.set(0);

    Ok(())
}
