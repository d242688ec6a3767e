//! External tool invocation
//!
//! All compiler/test-runner/analyzer/report-generator work happens in
//! external processes. Gantry resolves the command on PATH, runs it
//! blocking with inherited stdio, and only inspects the exit status.

use std::path::Path;
use std::process::Command;

use anyhow::Context;
use tracing::info;

/// Run an external tool to completion, failing on a non-zero exit status
pub fn run_tool(program: &str, args: &[String], cwd: &Path) -> anyhow::Result<()> {
    let resolved = which::which(program)
        .map_err(|_| anyhow::anyhow!("'{program}' not found on PATH"))?;

    info!(program, args = %args.join(" "), "running external tool");

    let status = Command::new(&resolved)
        .args(args)
        .current_dir(cwd)
        .status()
        .with_context(|| format!("failed to start '{program}'"))?;

    if !status.success() {
        anyhow::bail!("'{program}' exited with {status}");
    }
    Ok(())
}
