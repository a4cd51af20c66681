use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use scene_core::Settings;
use scene_studio::StudioApp;

/// Worker daemon: builds the studio, recovers unfinished work, and drives
/// the pool until interrupted. HTTP serving lives in front of this process.
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env();
    info!(
        workers = settings.worker_concurrency,
        database = %settings.database_url,
        "starting scene-studio"
    );

    let app = StudioApp::build(settings).await?;
    let recovered = app.recover().await?;
    if recovered > 0 {
        info!(recovered, "re-admitted unfinished jobs");
    }
    app.start_workers().await;

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    app.shutdown().await;

    let stats = app.stats();
    info!(
        total = stats.total,
        completed = stats.completed,
        failed = stats.failed,
        cancelled = stats.cancelled,
        "final job counters"
    );
    Ok(())
}
