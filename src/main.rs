use dotenvy::dotenv;
use std::env;

use price_signal_back_end::api::{self, config::ApiConfig};
use price_signal_back_end::utils::app_config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv();
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            env::var("RUST_LOG")
                .unwrap_or_else(|_| "info".to_string())
                .as_str(),
        )
        .init();

    let api_config = ApiConfig::from_env();

    let app_config = AppConfig::from_env()?;
    let aggregators = app_config.aggregators();
    tracing::info!(
        bucket_size_seconds = aggregators.bucket_size_seconds,
        window_minutes = aggregators.window_minutes,
        threshold_pct = %aggregators.signal_threshold_pct,
        window_source = ?aggregators.window_source,
        parallel_assets = aggregators.parallel_assets,
        "Application configuration loaded successfully"
    );

    let router = api::router(app_config);

    let addr = api_config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Starting price signal API server on {}", addr);

    axum::serve(listener, router).await?;

    Ok(())
}
