//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - credentials must form a valid `ServiceConfig` (non-blank, https)
//! - transport timeouts and retry invariants
//! - refresh policy, server, metrics path and logging level

use tracing::{error, info};

use crate::config::settings::{AppConfig, HttpConfig, RefreshConfig, RetryConfig, SettingsConfig};
use crate::observability::metrics::get_metrics;

/// Returns Ok(()) or Err(Vec<String>) containing all issues.
pub async fn validate_app_config(cfg: &AppConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    if let Err(e) = cfg.credentials.to_service_config() {
        errors.push(format!("credentials: {}", e));
    }
    validate_http(&cfg.http, &mut errors);
    validate_refresh(&cfg.refresh, &mut errors);
    validate_settings(&cfg.settings, &mut errors);

    if errors.is_empty() {
        info!("config valid");
        Ok(())
    } else {
        error!("configuration validation errors ({}):", errors.len());
        for e in &errors {
            error!(" - {}", e);
        }
        get_metrics().await.config_validation_errors.inc();
        Err(errors)
    }
}

fn validate_http(http: &HttpConfig, errors: &mut Vec<String>) {
    if http.connect_timeout_ms == 0 {
        errors.push("http.connect_timeout_ms must be > 0".to_owned());
    }
    if http.call_timeout_ms == 0 {
        errors.push("http.call_timeout_ms must be > 0".to_owned());
    }
    validate_retry("http.retry", &http.retry, errors);
}

fn validate_retry(path: &str, retry: &RetryConfig, errors: &mut Vec<String>) {
    if retry.attempts == 0 {
        errors.push(format!("{}.attempts must be > 0", path));
    }
    if retry.max_delay_ms < retry.base_delay_ms {
        errors.push(format!(
            "{}.max_delay_ms ({}) must be >= base_delay_ms ({})",
            path, retry.max_delay_ms, retry.base_delay_ms
        ));
    }
}

fn validate_refresh(refresh: &RefreshConfig, errors: &mut Vec<String>) {
    if refresh.max_age_seconds == 0 {
        errors.push("refresh.max_age_seconds must be > 0".to_owned());
    }
}

fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if settings.server.host.is_empty() {
        errors.push(format!(
            "settings.server.host '{}' must be valid",
            settings.server.host
        ));
    }
    if settings.server.port.parse::<u16>().is_err() {
        errors.push(format!(
            "settings.server.port '{}' must be an integer in range 0-65535",
            settings.server.port
        ));
    }

    let metrics = &settings.metrics;
    if !metrics.path.starts_with('/') {
        errors.push(format!(
            "settings.metrics.path '{}' must start with '/'",
            metrics.path
        ));
    }
    if ["/token", "/health"].contains(&metrics.path.as_str()) {
        errors.push(format!(
            "settings.metrics.path '{}' collides with a built-in route",
            metrics.path
        ));
    }

    if let Some(logging) = &settings.logging {
        let valid = ["trace", "debug", "info", "warn", "error"];
        if !valid.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' invalid; allowed: {:?}",
                logging.level, valid
            ));
        }
    }
}
