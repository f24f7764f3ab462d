use std::path::Path;

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use tracing::{debug, error};

use crate::config::proc_validator;
use crate::config::settings::AppConfig;
use crate::observability::metrics::get_metrics;

/// Load and validate config from YAML file
pub async fn file_to_config(path: &Path) -> Result<AppConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading config file {}", path.display()))?;

    let expanded = expand_env_vars(&content)?;
    parse_config(expanded).await
}

pub async fn parse_config(content: String) -> Result<AppConfig> {
    let metrics = get_metrics().await;
    let app_config: AppConfig = serde_yaml::from_str(&content).inspect_err(|e| {
        error!("parse config error: {}", e);
        metrics.config_parse_failures.inc();
    })?;

    debug!("validation config ...");
    proc_validator::validate_app_config(&app_config)
        .await
        .map_err(|errors| {
            anyhow!(
                "config is not valid, total errors: {}\n{}",
                errors.len(),
                errors.join("\n")
            )
        })?;

    Ok(app_config)
}

/// Replace `${VAR}` and `${VAR:default}` with environment values.
fn expand_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{(\w+)(?::([^\}]*))?\}")?;
    let expanded = re.replace_all(input, |caps: &regex::Captures| {
        let var = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(var).unwrap_or_else(|_| default.to_string())
    });
    Ok(expanded.into_owned())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serial_test::serial;

    use super::{expand_env_vars, file_to_config, parse_config};
    use crate::config::settings::LogFormat;

    const MINIMAL: &str = r#"
credentials:
  audience: "https://api.example.com"
  client_id: "client-1"
  client_secret: "s3cr3t"
  tenant: "https://tenant.eu.auth0.com"
"#;

    #[tokio::test]
    async fn minimal_config_gets_defaults() {
        let cfg = parse_config(MINIMAL.to_owned()).await.unwrap();

        assert_eq!(cfg.http.connect_timeout_ms, 10_000);
        assert_eq!(cfg.http.call_timeout_ms, 10_000);
        assert_eq!(cfg.http.pool_max_idle_per_host, 2);
        assert_eq!(cfg.http.retry.attempts, 1);
        assert_eq!(cfg.refresh.max_age_seconds, 12 * 60 * 60);
        assert_eq!(cfg.refresh.expiration_threshold_seconds, 20 * 60);
        assert_eq!(cfg.settings.server.port, "8080");
        assert!(!cfg.settings.metrics.is_enabled);
        assert!(cfg.settings.logging.is_none());
    }

    #[tokio::test]
    async fn full_config_is_parsed() {
        let yaml = r#"
credentials:
  audience: "https://api.example.com"
  client_id: "client-1"
  client_secret: "s3cr3t"
  tenant: "https://tenant.eu.auth0.com"
http:
  connect_timeout_ms: 2000
  call_timeout_ms: 5000
  pool_max_idle_per_host: 4
  pool_idle_timeout_seconds: 30
  retry:
    attempts: 3
    base_delay_ms: 100
    max_delay_ms: 400
refresh:
  max_age_seconds: 3600
  expiration_threshold_seconds: 300
settings:
  server:
    host: 0.0.0.0
    port: "9000"
  metrics:
    is_enabled: true
    path: /metrics
  logging:
    level: debug
    format: json
"#;
        let cfg = parse_config(yaml.to_owned()).await.unwrap();
        assert_eq!(cfg.http.retry.attempts, 3);
        assert_eq!(cfg.http.call_timeout().as_millis(), 5000);
        assert_eq!(cfg.refresh.policy().max_age().num_seconds(), 3600);
        assert_eq!(cfg.settings.server.host, "0.0.0.0");
        assert_eq!(cfg.settings.logging.unwrap().format, LogFormat::Json);
    }

    #[tokio::test]
    async fn invalid_config_reports_all_errors() {
        let yaml = r#"
credentials:
  audience: "https://api.example.com"
  client_id: "client-1"
  client_secret: ""
  tenant: "http://tenant.eu.auth0.com"
http:
  call_timeout_ms: 0
  retry:
    attempts: 0
    base_delay_ms: 500
    max_delay_ms: 100
settings:
  metrics:
    path: metrics
"#;
        let err = parse_config(yaml.to_owned()).await.unwrap_err().to_string();
        assert!(err.contains("total errors: 5"), "{}", err);
        assert!(err.contains("credentials"));
        assert!(err.contains("http.call_timeout_ms"));
        assert!(err.contains("http.retry.attempts"));
        assert!(err.contains("http.retry.max_delay_ms"));
        assert!(err.contains("settings.metrics.path"));
    }

    #[tokio::test]
    async fn missing_credentials_section_fails() {
        assert!(parse_config("settings: {}".to_owned()).await.is_err());
    }

    #[test]
    #[serial]
    fn env_vars_are_expanded_with_defaults() {
        std::env::set_var("M2M_TEST_CLIENT", "from-env");
        std::env::remove_var("M2M_TEST_MISSING");

        let out = expand_env_vars("a: ${M2M_TEST_CLIENT}\nb: ${M2M_TEST_MISSING:fallback}\nc: ${M2M_TEST_MISSING}")
            .unwrap();
        assert_eq!(out, "a: from-env\nb: fallback\nc: ");

        std::env::remove_var("M2M_TEST_CLIENT");
    }

    #[tokio::test]
    #[serial]
    async fn config_file_is_loaded_with_env_expansion() {
        std::env::set_var("M2M_TEST_SECRET", "file-secret");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
credentials:
  audience: "https://api.example.com"
  client_id: "client-1"
  client_secret: "${{M2M_TEST_SECRET}}"
  tenant: "${{M2M_TEST_TENANT:https://tenant.eu.auth0.com}}"
"#
        )
        .unwrap();

        let cfg = file_to_config(file.path()).await.unwrap();
        let service = cfg.credentials.to_service_config().unwrap();
        assert_eq!(service.client_secret(), "file-secret");
        assert_eq!(service.tenant(), "https://tenant.eu.auth0.com");

        std::env::remove_var("M2M_TEST_SECRET");
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let res = file_to_config(&dir.path().join("absent.yaml")).await;
        assert!(res.is_err());
    }
}
