pub mod api; // Local app API for the web shell
pub mod chat;
pub mod config;
pub mod context;
pub mod core_state;
pub mod dashboard;
pub mod models;
pub mod onboarding;
pub mod result_view;
pub mod session;
pub mod store;
pub mod subscription;
pub mod triage_api; // Remote triage inference service client
pub mod triage_form;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::api::ServerError;
use crate::config::AppConfig;
use crate::context::{AppContext, ContextError};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Start the client: wire services from the environment, serve the app API
/// and run until Ctrl-C.
pub async fn run() -> Result<(), RunError> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = AppConfig::from_env();
    tracing::info!(
        api_base = %config.api_base_url,
        data_dir = %config.data_dir.display(),
        require_vitals = config.require_vitals,
        "Configuration loaded"
    );

    let ctx = Arc::new(AppContext::from_config(config)?);
    let mut server = api::start_app_server(Arc::clone(&ctx), ctx.config.bind_addr).await?;
    tracing::info!(
        addr = %server.session.server_addr,
        origin = %ctx.config.web_origin,
        "App API ready"
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for shutdown signal: {e}");
    }

    if let Err(e) = ctx.unmount_dashboard() {
        tracing::warn!(error = %e, "Dashboard teardown failed");
    }
    server.shutdown();
    server.stopped().await;
    tracing::info!("{} stopped", config::APP_NAME);
    Ok(())
}
