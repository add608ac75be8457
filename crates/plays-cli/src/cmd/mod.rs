pub mod init;
pub mod job;
pub mod playbook;
pub mod serve;

use std::future::Future;
use std::path::Path;

use anyhow::{bail, Context};
use plays_core::config::Config;
use plays_core::paths;
use plays_engine::Engine;

/// Open the engine over an initialized root.
pub fn open_engine(root: &Path) -> anyhow::Result<Engine> {
    if !paths::config_path(root).is_file() {
        bail!(
            "no {} found in {} (run `plays init` first)",
            paths::CONFIG_FILE,
            root.display()
        );
    }
    let config = Config::load(root).context("failed to load configuration")?;
    if config.has_errors() {
        bail!("configuration has errors; run `plays init` to review them");
    }
    Engine::open(root).context("failed to open plays root")
}

/// Drive an async engine call to completion from a synchronous command.
/// Tool processes run in their own process group, so Ctrl-C is forwarded
/// to the engine, which kills them and lets the call record the outcome.
pub fn block_on<F: Future>(engine: &Engine, fut: F) -> anyhow::Result<F::Output> {
    let rt = tokio::runtime::Runtime::new()?;
    Ok(rt.block_on(async {
        tokio::pin!(fut);
        tokio::select! {
            out = &mut fut => out,
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("interrupted; cancelling active runs");
                engine.shutdown();
                fut.await
            }
        }
    }))
}
