//! HTTP front end for the hireflow evaluation pipeline.

mod errors;
mod routes;
mod state;

use anyhow::{Context, Result};
use hireflow::config::HireflowConfig;
use hireflow::events::LoggingEventSink;
use hireflow::observability::init_tracing;
use hireflow::persistence::RecordPersister;
use hireflow::pipeline::{candidate_evaluation_pipeline, PipelineDriver};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; the real environment still applies.
    dotenvy::dotenv().ok();

    let config = HireflowConfig::from_env().context("invalid configuration")?;
    init_tracing(config.log_format)?;

    info!("Starting hireflow API v{}", env!("CARGO_PKG_VERSION"));
    info!(?config, "configuration loaded");

    let collaborators = config.collaborators()?;
    let pipeline = candidate_evaluation_pipeline(&collaborators)?;
    info!(
        pipeline = pipeline.name(),
        stages = pipeline.task_ids().len(),
        "pipeline built"
    );

    let persister = RecordPersister::new(config.warehouse_sink()?).with_table(config.table.clone());
    let driver = PipelineDriver::new(pipeline, persister)
        .with_event_sink(Arc::new(LoggingEventSink::default()));

    let app = build_router(AppState::new(driver, config.model.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
