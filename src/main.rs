use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{router, RestSettings};

/// Main entry point for the Dentachart application
///
/// Loads `.env`, installs tracing and serves the REST API with OpenAPI/Swagger UI.
///
/// # Environment Variables
/// - `DENTACHART_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `DENTACHART_DATA_DIR`: directory for plan and budget storage (default: "dentachart_data")
/// - `DENTACHART_BUDGET_TITLE`: title given to draft budgets created on save
/// - `DENTACHART_STORE`: `files` or `memory`
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, binding or serving fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dentachart_run=info".parse()?)
                .add_directive("dentachart_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = RestSettings::from_env()?;
    tracing::info!("++ Starting Dentachart REST on {}", settings.addr);
    tracing::info!(
        "++ Using {:?} store at {}",
        settings.store,
        settings.cfg.data_dir().display()
    );

    let app = router(settings.app_state());
    let listener = tokio::net::TcpListener::bind(&settings.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
