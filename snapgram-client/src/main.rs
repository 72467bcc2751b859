use repl::ReplError;
use snapgram_client::{
    config::{ClientConfig, ConfigError},
    query::QueryClient,
};
use snapgram_remote::{client::Api, memory::InMemoryBackend};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod repl;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error loading configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Repl(#[from] ReplError),
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "snapgram_client=debug,snapgram_remote=debug,snapgram_common=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let config = ClientConfig::load()?;
    info!(?config, "Starting snapgram");

    let api = Api::new(InMemoryBackend::new(), config.page_limits());
    let client = QueryClient::with_stale_time(api, config.stale_time());

    repl::run(
        client,
        config.search_debounce(),
        tokio::io::stdin(),
        tokio::io::stdout(),
    )
    .await?;

    Ok(())
}
