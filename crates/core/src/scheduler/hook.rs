use tokio::process::Command;
use tracing::{info, warn};

use super::SchedulerError;

/// Run the configured post-run command, if any, and wait for it.
pub async fn run_post_run_command(command: &[String]) -> Result<(), SchedulerError> {
    let Some((program, args)) = command.split_first() else {
        return Ok(());
    };

    info!("Running post-run command: {}", command.join(" "));
    let status = Command::new(program)
        .args(args)
        .status()
        .await
        .map_err(|e| SchedulerError::Hook(format!("failed to start '{}': {}", program, e)))?;

    if !status.success() {
        warn!("Post-run command exited with {}", status);
        return Err(SchedulerError::Hook(format!("'{}' exited with {}", program, status)));
    }
    Ok(())
}
