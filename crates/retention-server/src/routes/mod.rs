pub mod campaigns;
pub mod executions;
pub mod playbooks;
pub mod policy;
pub mod risk;
pub mod settings;

use crate::error::AppError;

/// Run a synchronous core call on the blocking pool.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> retention_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))?;
    Ok(result?)
}
