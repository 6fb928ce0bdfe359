//! External command execution with captured output.

use std::ffi::OsStr;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

/// Exit status and captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// The most useful diagnostic text: stderr, else stdout, else the exit code.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.code {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        }
    }

    /// Case-insensitive search over stdout and stderr.
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.stdout.to_lowercase().contains(&needle)
            || self.stderr.to_lowercase().contains(&needle)
    }

    fn from_status(status: ExitStatus, stdout: Vec<u8>, stderr: Vec<u8>) -> Self {
        Self {
            success: status.success(),
            code: status.code(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        }
    }
}

/// The command could not be run to completion.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to execute `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {timeout:?}")]
    TimedOut { command: String, timeout: Duration },
}

/// Run `program` with `args`, capturing stdout and stderr.
///
/// The child is driven on a current-thread tokio runtime so the call stays
/// blocking for callers. With a `timeout` the child is killed once it
/// expires. A non-zero exit is not an error here: callers classify
/// [`CommandOutput::success`] themselves.
pub fn run_cmd_capture<S: AsRef<OsStr>>(
    program: &Path,
    args: &[S],
    timeout: Option<Duration>,
) -> Result<CommandOutput, CommandError> {
    let cmd_line = command_line(program, args);
    tracing::debug!("exec (capture): {cmd_line}");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|source| CommandError::Io {
            command: cmd_line.clone(),
            source,
        })?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let finished = runtime.block_on(async {
        match timeout {
            None => cmd.output().await.map(Some),
            // Dropping the `output` future kills the child.
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_or(Ok(None), |result| result.map(Some)),
        }
    });

    let output = match finished {
        Ok(Some(output)) => output,
        Ok(None) => {
            let limit = timeout.unwrap_or_default();
            tracing::debug!("killed after {limit:?}: {cmd_line}");
            return Err(CommandError::TimedOut {
                command: cmd_line,
                timeout: limit,
            });
        }
        Err(source) => {
            return Err(CommandError::Io {
                command: cmd_line,
                source,
            });
        }
    };

    let output = CommandOutput::from_status(output.status, output.stdout, output.stderr);
    if !output.success {
        tracing::debug!("command failed: {cmd_line}\nstderr: {}", output.stderr.trim());
    }
    Ok(output)
}

fn command_line<S: AsRef<OsStr>>(program: &Path, args: &[S]) -> String {
    let mut line = program.display().to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&arg.as_ref().to_string_lossy());
    }
    line
}
