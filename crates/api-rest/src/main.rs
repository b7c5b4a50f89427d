//! Standalone REST API server binary.
//!
//! The workspace's main `dentachart-run` binary serves the same router; this one is handy when
//! working on the API crate alone.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{router, RestSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = RestSettings::from_env()?;
    tracing::info!(
        "-- Starting Dentachart REST API on {} ({:?} store, data dir {})",
        settings.addr,
        settings.store,
        settings.cfg.data_dir().display()
    );

    let app = router(settings.app_state());
    let listener = tokio::net::TcpListener::bind(&settings.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
