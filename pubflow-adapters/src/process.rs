//! Shared subprocess plumbing for tool adapters.

use std::path::Path;

use pubflow_core::error::{Error, Result};
use tokio::process::Command;
use tracing::debug;

/// Runs a tool to completion and returns its stdout.
///
/// A non-zero exit wraps the exit status and captured stderr in
/// [`Error::ToolInvocation`].
pub async fn run_tool(program: &str, args: &[&str], cwd: &Path) -> Result<String> {
    debug!(program, ?args, cwd = %cwd.display(), "invoking tool");
    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .output()
        .await
        .map_err(|e| Error::ToolInvocation {
            command: format!("{program} {}", args.join(" ")),
            status: None,
            output: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(Error::ToolInvocation {
            command: format!("{program} {}", args.join(" ")),
            status: output.status.code(),
            output: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
