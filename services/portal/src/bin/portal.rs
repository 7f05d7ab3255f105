//! services/portal/src/bin/portal.rs

use clap::Parser;
use portal_lib::{
    adapters::{FileSessionStore, HttpBackend},
    cli::Cli,
    commands::Portal,
    config::Config,
    error::PortalError,
};
use std::sync::Arc;
use tracing::{debug, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), PortalError> {
    // --- 1. Parse Arguments, Load Configuration & Set Up Logging ---
    let cli = Cli::parse();
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    debug!(api_url = %config.api_url, "Configuration loaded");

    // --- 2. Initialize the Session Store & Backend Adapter ---
    let session = Arc::new(FileSessionStore::new(config.session_file.clone()));
    let backend = Arc::new(HttpBackend::new(
        config.api_url.clone(),
        config.request_timeout,
        session.clone(),
    )?);

    // --- 3. Run the Command ---
    let portal = Portal::new(backend, session);
    if let Err(e) = portal.run(cli.command).await {
        error!(error = %e, "Command failed");
        return Err(e);
    }
    Ok(())
}
