//! Tenant Shield - guided letter drafting for tenants
//!
//! Walks a tenant through picking a letter category, describing their
//! situation and answering follow-up questions, then fetches the filled
//! letter from the drafting backend.

mod backend;
mod catalog;
mod config;
mod console;
mod prompts;
mod runtime;
mod state_machine;
mod store;

use backend::{HttpBackend, LoggingBackend};
use config::AppConfig;
use console::Console;
use state_machine::FlowContext;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    // Logs go to stderr so the conversation owns stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tenant_shield=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!(
        api_url = %config.api_url,
        timeout_secs = config.request_timeout.as_secs(),
        output_dir = %config.output_dir.display(),
        "Configuration loaded"
    );

    let http = HttpBackend::new(&config.api_url, config.request_timeout)?;
    let backend = LoggingBackend::new(Arc::new(http));

    let catalog = match catalog::fetch_catalog(&backend).await {
        Ok(catalog) => catalog,
        Err(e) => {
            eprintln!("Failed to load letter categories from {}: {e}", config.api_url);
            eprintln!("Check that the drafting service is running and TENANT_SHIELD_API_URL points at it.");
            return Ok(ExitCode::FAILURE);
        }
    };

    let session_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(%session_id, categories = catalog.entries().len(), "Starting session");

    let context = FlowContext::new(session_id, catalog.clone());
    let handle = runtime::spawn_session(context, backend, config.request_timeout);

    Console::new(handle, catalog, config.output_dir).run().await?;

    tracing::info!("Goodbye");
    Ok(ExitCode::SUCCESS)
}
