// Run an external command with a timeout and return its stdout.

use crate::error::SourceError;
use std::time::Duration;

pub(super) async fn run_command(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<String, SourceError> {
    let command_line = || format!("{} {}", program, args.join(" "));
    let output = tokio::time::timeout(
        timeout,
        tokio::process::Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| SourceError::Command {
        command: command_line(),
        details: format!("timed out after {:?}", timeout),
    })??;

    if !output.status.success() {
        return Err(SourceError::Command {
            command: command_line(),
            details: format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
