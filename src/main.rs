use api_rest::{ServerConfig, build_router};
use media_core::config::{storage_dir_from_env_value, url_prefix_from_env_value};
use media_core::{CoreConfig, MediaService, STAGING_MAX_AGE};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the media server
///
/// Resolves configuration from the environment once, prepares the storage root, clears uploads
/// abandoned by a previous process and serves the REST API.
///
/// # Environment Variables
/// - `MEDIA_STORAGE_DIR`: storage root (default: "uploads"), created if missing
/// - `MEDIA_ADDR`: listen address (default: "0.0.0.0:5000")
/// - `MEDIA_URL_PREFIX`: mount point of the media routes (default: "/media")
/// - `MEDIA_ALLOWED_ORIGINS`: comma separated CORS origins
/// - `MEDIA_MAX_UPLOAD_BYTES`: upload body limit (default: 100 MiB)
///
/// # Errors
/// Returns an error if the configuration is invalid, the storage root cannot be created, the
/// address cannot be bound, or the server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("media_run=info".parse()?)
                .add_directive("media_files=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = CoreConfig::new(
        storage_dir_from_env_value(std::env::var("MEDIA_STORAGE_DIR").ok()),
        &url_prefix_from_env_value(std::env::var("MEDIA_URL_PREFIX").ok()),
    )?;
    let server = ServerConfig::from_env_values(
        std::env::var("MEDIA_ADDR").ok(),
        std::env::var("MEDIA_ALLOWED_ORIGINS").ok(),
        std::env::var("MEDIA_MAX_UPLOAD_BYTES").ok(),
    )
    .map_err(anyhow::Error::msg)?;

    cfg.ensure_storage_dir()?;
    if !cfg.storage_dir().is_dir() {
        anyhow::bail!(
            "Storage directory is not a directory: {}",
            cfg.storage_dir().display()
        );
    }

    let purged = MediaService::new(&cfg)
        .purge_staging(STAGING_MAX_AGE)
        .await?;
    if purged > 0 {
        tracing::info!("-- Removed {} abandoned uploads", purged);
    }

    tracing::info!(
        "++ Starting media API on {} (routes under '{}', storage at {})",
        server.addr(),
        cfg.url_prefix(),
        cfg.storage_dir().display()
    );

    let app = build_router(&cfg, &server);
    let listener = tokio::net::TcpListener::bind(server.addr()).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
