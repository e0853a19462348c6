use crate::cmd::open;
use crate::output::print_json;
use anyhow::Context;
use retention_core::worker::Worker;
use retention_server::AppState;
use std::path::Path;
use std::sync::Arc;

/// Consume the playbooks queue.
///
/// `--once` drains every job due now and prints the totals. Without it the
/// worker ticks on the configured interval until Ctrl-C.
pub fn run(root: &Path, once: bool, json: bool) -> anyhow::Result<()> {
    let (config, db) = open(root)?;

    if once {
        let worker = Worker::new(Arc::new(db), &config);
        let report = worker.drain(chrono::Utc::now()).context("queue drain failed")?;
        if json {
            return print_json(&report);
        }
        println!(
            "Processed {} job(s): {} sent, {} skipped, {} retried, {} failed",
            report.processed, report.sent, report.skipped, report.retried, report.failed
        );
        return Ok(());
    }

    let state = AppState::new(root.to_path_buf(), config, db);
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let handle = retention_server::worker::spawn_worker(&state);
        tokio::signal::ctrl_c().await?;
        handle.abort();
        tracing::info!("queue worker stopped");
        Ok::<(), anyhow::Error>(())
    })
}
