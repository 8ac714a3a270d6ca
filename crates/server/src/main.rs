use anyhow::Context;
use deployment::Deployment;
use server::{DeploymentImpl, routes};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    utils::logging::init();

    let deployment = DeploymentImpl::new()
        .await
        .context("failed to initialise deployment")?;

    let address = deployment.config().server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!("Server running on http://{}", listener.local_addr()?);

    axum::serve(listener, routes::router(deployment))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutting down");
}
