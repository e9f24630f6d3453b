//! Daemon command: scheduling passes on a fixed interval.
//!
//! Passes run back-to-back on one task, so overlapping invocations cannot
//! happen; the interval is the gap between the end of one pass and the start
//! of the next.

use std::time::Duration;

use miette::Result;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crier_engine::Driver;

/// Run the daemon until ctrl-c.
pub async fn run(driver: Driver, template: String, interval_secs: u64) -> Result<()> {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received ctrl-c, shutting down after current pass");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => error!(error = %e, "failed to listen for ctrl-c"),
        }
    });

    info!(interval_secs, "daemon starting");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // A failed pass is this invocation's problem, not the daemon's:
        // log it and try again on the next tick.
        if let Err(e) = crate::run_pass(&driver, &template).await {
            warn!(error = %e, "pass failed");
        }

        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("daemon received shutdown signal");
                }
            }
            _ = sleep(Duration::from_secs(interval_secs)) => {}
        }
    }

    info!("daemon shut down gracefully");
    Ok(())
}
