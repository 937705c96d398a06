use artisan_service::config::ArtisanConfig;
use artisan_service::startup::Application;
use service_core::observability::{init_metrics, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = ArtisanConfig::load()?;

    init_tracing(
        "artisan-service",
        &config.common.log_level,
        config.otlp_endpoint.as_deref(),
    );
    init_metrics();

    tracing::info!(
        port = config.common.port,
        catalog = ?config.catalog.backend,
        media_dir = %config.media.dir.display(),
        originals_dir = %config.media.originals_dir.display(),
        genai_key_present = config.genai.key_present(),
        "Starting artisan-service"
    );

    let application = Application::build(config).await?;
    application.run_until_stopped().await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}
