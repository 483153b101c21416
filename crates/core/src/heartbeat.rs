//! Liveness file for external supervisors.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Environment variable naming the heartbeat file.
pub const HEARTBEAT_ENV: &str = "TALLY_HEARTBEAT_FILE";

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// Write the current RFC 3339 timestamp to `path`.
pub async fn write_heartbeat(path: &Path) -> std::io::Result<()> {
    tokio::fs::write(path, Utc::now().to_rfc3339()).await
}

/// Write the heartbeat now and then every `interval` until the task is aborted.
pub fn spawn_heartbeat(path: PathBuf, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
        loop {
            ticker.tick().await;
            match write_heartbeat(&path).await {
                Ok(()) => debug!("Heartbeat written to {}", path.display()),
                Err(e) => warn!("Failed to write heartbeat {}: {}", path.display(), e),
            }
        }
    })
}
