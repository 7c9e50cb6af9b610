mod controller;
mod error;
mod fetcher;
mod format;
mod handlers;
mod models;
mod series;
mod state;
mod views;

use anyhow::Context as _;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::controller::ViewController;
use crate::fetcher::DiseaseClient;
use crate::state::{build_tera, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("covidash=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env();

    let tera = build_tera(&config.template_glob)
        .with_context(|| format!("loading templates from {}", config.template_glob))?;
    let client = DiseaseClient::new(&config).context("building upstream client")?;
    let controller = Arc::new(ViewController::new(client));

    // Serve immediately; the page shows loading state until the first fetches land.
    let initial = Arc::clone(&controller);
    tokio::spawn(async move { initial.start().await });

    let scheduler = JobScheduler::new().await?;
    let scheduled = Arc::clone(&controller);
    let job = Job::new_async(config.refresh_cron.as_str(), move |_uuid, _lock| {
        let controller = Arc::clone(&scheduled);
        Box::pin(async move {
            info!("Scheduled refresh started");
            controller.refresh_scheduled().await;
        })
    })
    .with_context(|| format!("invalid REFRESH_CRON '{}'", config.refresh_cron))?;
    scheduler.add(job).await?;
    scheduler.start().await?;
    info!("Refresh scheduled with '{}'", config.refresh_cron);

    let state = Arc::new(AppState::new(tera, controller));
    let app = handlers::router(state, &config.static_dir);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("binding {}", config.bind_address))?;
    info!("Listening on http://{}", listener.local_addr()?);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }
    Ok(())
}
