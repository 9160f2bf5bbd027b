use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::days_api::DayStore;
use crate::error::ScanError;
use crate::presence::{reconcile, ReconcileReport, ScanSource};

/// Periodic scan + reconciliation against the days API
pub struct SyncService<C: ?Sized, S> {
    scanner: Arc<C>,
    store: S,
    interval: Duration,
}

impl<C, S> SyncService<C, S>
where
    C: ScanSource + ?Sized,
    S: DayStore,
{
    pub fn new(scanner: Arc<C>, store: S, interval: Duration) -> Self {
        SyncService { scanner, store, interval }
    }

    /// Runs one cycle right away, then one per interval until cancelled.
    /// Ticks missed while a cycle is running are skipped, never stacked.
    pub async fn run(&self, cancel: CancellationToken) {
        info!("🔄 Starting days API sync every {:?}", self.interval);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.run_cycle(&cancel).await {
                Ok(report) => {
                    info!(
                        "[SYNC] Cycle done: {} created, {} merged, {} unchanged, {} failed",
                        report.created,
                        report.merged,
                        report.unchanged,
                        report.failures.len()
                    );
                }
                Err(ScanError::Cancelled) => break,
                Err(e) => error!("[SYNC] Scan failed: {}", e),
            }
        }

        info!("Days API sync stopped");
    }

    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<ReconcileReport, ScanError> {
        let summary = self.scanner.scan(cancel).await?;
        Ok(reconcile(&summary, &self.store, cancel).await)
    }
}
