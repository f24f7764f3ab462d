use std::path::Path;

use anyhow::{anyhow, Result};

use crate::config::proc_loader::file_to_config;
use crate::config::service_config::ServiceConfig;
use crate::config::settings::{AppConfig, CredentialsConfig};

/// YAML file when a path is given, otherwise `AUTH0_*` env vars plus defaults.
pub async fn run(config_path: Option<&str>) -> Result<AppConfig> {
    match config_path {
        Some(path) => file_to_config(Path::new(path))
            .await
            .map_err(|e| anyhow!("Invalid config: {:#}", e)),
        None => {
            let service_config = ServiceConfig::from_env()?;
            Ok(AppConfig::with_credentials(CredentialsConfig::from(&service_config)))
        }
    }
}
