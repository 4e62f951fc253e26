use std::sync::Arc;

use discovery_session::{
    config::Config,
    routes::{create_router, AppState},
    services::{
        providers::{HttpCatalogueClient, HttpMediaLocator},
        BatchCache, ClockSink, PlaybackController, SessionController,
    },
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("discovery_session=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let catalogue = HttpCatalogueClient::new(
        config.recommender_url.clone(),
        config.recommender_token.clone(),
        config.upstream_timeout(),
    )?;
    let locator = HttpMediaLocator::new(config.media_locator_url.clone(), config.upstream_timeout())?;

    let session = SessionController::new(
        BatchCache::new(Arc::new(catalogue)),
        PlaybackController::new(Arc::new(locator), Box::<ClockSink>::default()),
    );

    let app = create_router(AppState::new(session));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        addr = %addr,
        recommender = %config.recommender_url,
        "Discovery session server listening"
    );
    axum::serve(listener, app).await?;

    Ok(())
}
