//! Invocation of external command-line tools.

use std::{ffi::OsStr, path::Path, process::Stdio};

use anyhow::Context as _;
use tokio::process::Command;
use tracing::{debug, error};

use crate::error::RelayError;

/// Captured output of a successful tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Standard output, lossily decoded.
    pub stdout: String,
    /// Standard error, lossily decoded.
    pub stderr: String,
}

/// Runs `program` with `args` to completion, optionally feeding a file to its standard input.
///
/// Only the program and its first argument are logged, as later arguments may carry credentials.
///
/// # Errors
///
/// Returns [`RelayError::Tool`] if the tool exits unsuccessfully, or any failure spawning it.
pub async fn run_tool<I, S>(program: &str, args: I, stdin: Option<&Path>) -> Result<ToolOutput, RelayError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    spawn_tool(program, args, stdin, None).await
}

/// Runs `program` with `args` to completion from within `dir`, so it picks up configuration files there.
///
/// See: [`run_tool`]
///
/// # Errors
///
/// Returns [`RelayError::Tool`] if the tool exits unsuccessfully, or any failure spawning it.
pub async fn run_tool_in<I, S>(dir: &Path, program: &str, args: I) -> Result<ToolOutput, RelayError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    spawn_tool(program, args, None, Some(dir)).await
}

async fn spawn_tool<I, S>(
    program: &str,
    args: I,
    stdin: Option<&Path>,
    dir: Option<&Path>,
) -> Result<ToolOutput, RelayError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args = args
        .into_iter()
        .map(|arg| arg.as_ref().to_owned())
        .collect::<Vec<_>>();
    let command_line = match args.first() {
        Some(subcommand) => format!("{program} {}", subcommand.to_string_lossy()),
        None => program.to_owned(),
    };
    debug!("running {command_line}…");

    let stdin = match stdin {
        Some(path) => Stdio::from(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {path:?}"))?
                .into_std()
                .await,
        ),
        None => Stdio::null(),
    };

    let mut command = Command::new(program);
    if let Some(dir) = dir {
        command.current_dir(dir);
    }
    let output = command
        .args(&args)
        .stdin(stdin)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .with_context(|| format!("failed to run {command_line}"))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if output.status.success() {
        Ok(ToolOutput { stdout, stderr })
    } else {
        error!("{command_line} exited with {}", output.status);
        Err(RelayError::Tool(format!(
            "{command_line} exited with {}: {}",
            output.status,
            stderr.trim()
        )))
    }
}
