//! Startup command handler.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;

use startgate::bus::{LifecycleBus, LifecycleEvent};
use startgate::orchestrator::Orchestrator;

use super::common::{load_graph, load_manifest};

/// Run the orchestrator against the manifest and print the status.
///
/// Exits non-zero when anything failed or is still pending.
pub(crate) async fn cmd_up(path: &Path, hold: bool) -> Result<()> {
    let config = load_manifest(path)?;
    let dag = load_graph(&config)?;

    let bus = LifecycleBus::with_buffer_size(config.startup.event_buffer);
    // Keep the bus moving so a graph larger than the buffer cannot stall.
    let consumer = bus.clone();
    let event_logger = tokio::spawn(async move {
        while let Some(event) = consumer.consume().await {
            log_event(&event);
        }
    });

    let mut orchestrator = Orchestrator::new(config.startup.clone(), bus);
    let status = orchestrator.initialize_until_settled(&dag).await;

    event_logger.abort();
    let _ = event_logger.await;
    for event in orchestrator.bus().drain().await {
        log_event(&event);
    }
    let status = status?;

    println!("{}", serde_json::to_string_pretty(&status)?);

    if !status.is_complete() {
        bail!(
            "{} service(s) failed, {} pending",
            status.failed_services.len(),
            status.pending_services.len()
        );
    }

    if hold {
        info!("all services up; press Ctrl-C to stop");
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;
        info!("stopping");
    }

    // Spawned children are killed when the graph is dropped.
    Ok(())
}

fn log_event(event: &LifecycleEvent) {
    info!(
        service = %event.service_id,
        event = event.kind.as_str(),
        health_score = event.health_score,
        "lifecycle event"
    );
}
