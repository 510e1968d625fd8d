use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;

use tracing::info;

use streamrelay::{AppConfig, ApplicationServer, Logger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let config = Arc::new(AppConfig::parse());

    // guards are kept alive to flush logs and keep sentry connected
    let _guards = Logger::init(
        config.cargo_env,
        config.sentry_dsn.clone(),
        &config.log_dir,
    );

    info!("logger and env prepped, starting relay...");

    ApplicationServer::serve(config)
        .await
        .context("relay failed to start")?;

    Ok(())
}
