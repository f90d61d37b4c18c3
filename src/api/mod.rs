//! HTTP API: chat queries, cancellation, conversation threads and feedback.

mod inflight;
mod routes;
pub mod types;

use std::sync::Arc;

pub use inflight::{InFlightGuard, InFlightRequests};
pub use routes::{router, AppState};

use crate::agent::Agent;
use crate::config::Config;

/// Build the agent from `config` and serve until Ctrl-C.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let agent = Agent::from_config(&config)?;
    tracing::info!(
        "Agent ready with tools: {}",
        agent.tools().names().join(", ")
    );

    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(config, agent));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
