use std::path::Path;

/// Serve the HTTP API with the queue worker until Ctrl-C.
pub fn run(root: &Path, port: Option<u16>) -> anyhow::Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let root = root.to_path_buf();
    rt.block_on(async move {
        tokio::select! {
            res = retention_server::serve(root, port) => res,
            _ = tokio::signal::ctrl_c() => Ok(()),
        }
    })
}
