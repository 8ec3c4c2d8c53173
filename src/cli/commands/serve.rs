//! `serve`: HTTP API plus the escalation scheduler.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api;
use crate::app::Desk;
use crate::cli::args::ServeArgs;
use crate::config::ParcelKeepConfig;
use crate::error::ParcelKeepError;

/// Serve until `cancel` fires.
///
/// The scheduler runs on its own task; on shutdown the HTTP server stops
/// accepting requests and an in-flight sweep is allowed to finish.
///
/// # Errors
///
/// Returns an I/O error if the listener cannot bind, or a config/store
/// error if the desk cannot be assembled.
pub async fn run(
    config: &ParcelKeepConfig,
    args: &ServeArgs,
    cancel: CancellationToken,
) -> Result<(), ParcelKeepError> {
    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        info!(port, "Prometheus metrics endpoint started");
    }

    let desk = Arc::new(Desk::from_config(config).await?);
    // Publishes the initial occupancy gauge.
    let summary = desk.slots().occupancy_summary().await?;
    info!(occupied = summary.occupied, available = summary.available, "slot bank loaded");

    let bind = args.bind.unwrap_or(config.http.bind);
    let listener = TcpListener::bind(bind).await?;

    let scheduler = if config.sweep.enabled && !args.no_sweep {
        let scheduler = desk.scheduler();
        let scheduler_cancel = cancel.clone();
        Some(tokio::spawn(async move {
            scheduler.run(scheduler_cancel).await;
        }))
    } else {
        info!("escalation scheduler disabled");
        None
    };

    let served = api::serve(desk, listener, cancel.clone()).await;
    cancel.cancel();

    if let Some(handle) = scheduler
        && let Err(e) = handle.await
    {
        warn!(error = %e, "escalation scheduler task ended abnormally");
    }
    served?;
    info!("parcelkeep stopped");
    Ok(())
}
