//! RepoSync daemon binary.

use anyhow::Context;
use reposync_daemon::{Daemon, Settings, signal::shutdown_signal, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading settings")?;
    telemetry::init(&settings.log_level);

    tracing::info!("Starting RepoSync daemon v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Storage root: {}", settings.storage_root.display());
    tracing::info!("Repository store: {}", settings.store_path.display());

    let daemon = Daemon::new(&settings).context("configuring daemon")?;
    daemon
        .run(shutdown_signal())
        .await
        .context("running scheduler")?;

    tracing::info!("RepoSync daemon stopped");
    Ok(())
}
