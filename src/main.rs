//! Weekend Planner Agent - HTTP server entry point.

use weekend_planner::{api, config::Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configuration first: a missing API key must fail fast, before the
    // listener binds.
    let config = Config::from_env()?;

    // `RUST_LOG` wins; otherwise `LOG_LEVEL` sets the default directive.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("weekend_planner={},tower_http=info", config.log.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Loaded configuration: model={}", config.openai.model);
    info!("Starting server on {}:{}", config.host, config.port);

    api::serve(config).await?;

    Ok(())
}
