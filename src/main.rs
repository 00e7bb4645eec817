use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use ga_report::api::{create_router, AppState};
use ga_report::config::Config;
use ga_report::report::{ReportSettings, Reporter};
use ga_report::storage;

#[tokio::main]
async fn main() -> Result<()> {
    ga_report::init_tracing();

    let config = Config::load()?;
    info!("Loaded configuration");

    let storage = storage::connect(&config.database).await?;
    storage.init().await.context("failed to initialise the database")?;
    info!("Database initialized successfully");

    let settings = ReportSettings::from_config(&config)?;
    let state = Arc::new(AppState {
        reporter: Reporter::new(Arc::clone(&storage), settings),
        static_dir: config.report.static_dir.clone(),
    });

    if let Some(ref static_dir) = config.report.static_dir {
        info!("Serving assets from directory: {}", static_dir);
    } else {
        info!("Serving embedded assets");
    }

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot listen on {addr}"))?;
    info!("Report server listening on http://{}", addr);
    info!("   - Site usage at http://{}/site-usage", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
