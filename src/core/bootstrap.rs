use anyhow::{Context, Result};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

pub fn init_env() {
    // Missing .env is fine in deployed environments.
    let _ = dotenvy::dotenv();
}

pub async fn serve(service_name: &str, app: Router, port: u16) -> Result<()> {
    let app = app.layer(TraceLayer::new_for_http());
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;
    tracing::info!("{} listening on port {}", service_name, port);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
