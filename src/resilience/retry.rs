use std::future::Future;

use tokio::time::{sleep, Duration};
use tracing::{error, warn};

use crate::config::settings::RetryConfig;

#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl From<&RetryConfig> for RetrySettings {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            attempts: cfg.attempts.max(1),
            base_delay_ms: cfg.base_delay_ms,
            max_delay_ms: cfg.max_delay_ms,
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl RetrySettings {
    /// Run `operation` until it succeeds, fails with an error `retryable`
    /// rejects, or attempts run out. Delay doubles up to `max_delay_ms`.
    pub async fn run_with_retry<F, Fut, T, E, R>(&self, mut operation: F, retryable: R) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        R: Fn(&E) -> bool,
    {
        let attempts = self.attempts.max(1);
        let mut delay = self.base_delay_ms;
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts && retryable(&e) => {
                    warn!("Attempt {attempt}/{attempts} failed: {e}");
                    sleep(Duration::from_millis(delay)).await;
                    delay = (delay * 2).min(self.max_delay_ms);
                    attempt += 1;
                }
                Err(e) => {
                    if attempts > 1 {
                        error!("giving up after {attempt} attempt(s): {e}");
                    }
                    return Err(e);
                }
            }
        }
    }
}
