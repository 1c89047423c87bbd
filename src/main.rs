use plauth::{
    init_session, MissingKeyPolicy, SpotifyConfig, SpotifySessionFactory,
    DEFAULT_CREDENTIALS_PATH,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let factory = SpotifySessionFactory::new(SpotifyConfig::default());
    let _spotify =
        init_session(&factory, DEFAULT_CREDENTIALS_PATH, MissingKeyPolicy::default()).await?;

    info!("spotify session ready");

    Ok(())
}
