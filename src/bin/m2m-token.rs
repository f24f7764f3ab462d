use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use m2m_token::service::TokenService;
use m2m_token::server;
use m2m_token::utils::config_loader;
use m2m_token::utils::logging::{self, LogLevel};
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML config; without it credentials come from AUTH0_* variables
    #[arg(short, long, env = "CONFIG")]
    config: Option<String>,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print one token to stdout
    Token,
    /// Print issue/expiry details of a fresh token, never the token itself
    Inspect,
    /// Serve tokens over HTTP until interrupted
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load config, start logging
    // -------------------------------

    let args = Args::parse();
    let app_config = config_loader::run(args.config.as_deref()).await?;
    logging::run(app_config.settings.logging.as_ref(), args.log_level);

    // -------------------------------
    // 2. Build the token service
    // -------------------------------

    let service_config = app_config.credentials.to_service_config()?;
    let service = TokenService::from_config(&service_config, &app_config.http)?
        .with_default_policy(app_config.refresh.policy());

    // -------------------------------
    // 3. Run the requested command
    // -------------------------------

    match args.command {
        Command::Token => {
            let token = service.request_token().await.context("requesting token")?;
            println!("{}", token);
            service.shutdown();
        }
        Command::Inspect => {
            service.request_token().await.context("requesting token")?;
            if let Some(token) = service.cached_token().await {
                println!("issued_at:         {}", token.issued_at().to_rfc3339());
                println!("expires_at:        {}", token.expires_at().to_rfc3339());
                println!("age:               {}s", token.age().num_seconds());
                println!("time_until_expiry: {}s", token.time_until_expiry().num_seconds());
            }
            service.shutdown();
        }
        Command::Serve => {
            let service = Arc::new(service);
            // warm the cache; failures are retried on the first request
            if let Err(e) = service.request_token().await {
                warn!(error = %e, "initial token request failed");
            }
            info!("Service starting...");
            server::server::start(&app_config.settings, service, async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;
        }
    }

    Ok(())
}
