use std::sync::Arc;

use retention_core::worker::Worker;
use tokio::task::JoinHandle;

use crate::state::AppState;

/// Run the playbooks queue consumer on the configured interval.
///
/// Each tick runs on the blocking pool. A failed tick is logged and the loop
/// keeps going; jobs stay in the queue until a later tick takes them.
pub fn spawn_worker(state: &AppState) -> JoinHandle<()> {
    let worker = Arc::new(Worker::new(state.db.clone(), &state.config));
    let interval = state.config.worker.tick_interval();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(interval_ms = interval.as_millis() as u64, "queue worker started");
        loop {
            ticker.tick().await;
            let worker = worker.clone();
            match tokio::task::spawn_blocking(move || worker.tick(chrono::Utc::now())).await {
                Ok(Ok(report)) if report.processed > 0 => {
                    tracing::info!(
                        processed = report.processed,
                        sent = report.sent,
                        skipped = report.skipped,
                        retried = report.retried,
                        failed = report.failed,
                        "queue tick"
                    );
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "queue tick failed"),
                Err(e) => tracing::error!(error = %e, "queue tick panicked"),
            }
        }
    })
}
