// Bounded subprocess execution for system-information utilities (sysctl, netstat, nvidia-smi...).

use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::error::CollectError;

/// Upper bound for a single utility invocation.
pub(crate) const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub(crate) struct CommandOutput {
    pub(crate) success: bool,
    pub(crate) status: String,
    pub(crate) stdout: String,
    pub(crate) stderr: String,
}

impl CommandOutput {
    /// Both streams, for diagnostics.
    pub(crate) fn combined(&self) -> String {
        let (out, err) = (self.stdout.trim(), self.stderr.trim());
        match (out.is_empty(), err.is_empty()) {
            (_, true) => out.to_string(),
            (true, false) => err.to_string(),
            (false, false) => format!("{}\n{}", out, err),
        }
    }
}

/// Executes system utilities. Collectors go through this so their argument building and
/// aggregation can run against canned output.
pub(crate) trait CommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CollectError>;

    /// Stdout of a successful run; a non-zero exit status is a collection error.
    async fn run_checked(&self, program: &str, args: &[&str]) -> Result<String, CollectError> {
        let out = self.run(program, args).await?;
        if !out.success {
            return Err(CollectError::Status {
                command: display(program, args),
                status: out.status.clone(),
                output: out.combined(),
            });
        }
        Ok(out.stdout)
    }
}

/// Runs the real binaries with a bounded wait.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SystemRunner {
    timeout: Duration,
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self {
            timeout: COMMAND_TIMEOUT,
        }
    }
}

impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CollectError> {
        run(program, args, self.timeout).await
    }
}

/// Runs `program args...`, killing it if it does not exit within `timeout`.
pub(crate) async fn run(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<CommandOutput, CollectError> {
    let command_line = display(program, args);
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| CollectError::Spawn {
            command: command_line.clone(),
            source,
        })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|source| CollectError::Spawn {
            command: command_line.clone(),
            source,
        })?,
        Err(_) => {
            return Err(CollectError::Timeout {
                command: command_line,
                timeout,
            });
        }
    };

    tracing::trace!(command = %command_line, status = %output.status, "command finished");
    Ok(CommandOutput {
        success: output.status.success(),
        status: output.status.to_string(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

pub(crate) fn display(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_checked_returns_stdout() {
        let out = SystemRunner::default()
            .run_checked("echo", &["hello"])
            .await
            .unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn stderr_is_kept_out_of_stdout() {
        let runner = SystemRunner::default();
        let out = runner
            .run("sh", &["-c", "echo 42; echo 'warning: slow' >&2"])
            .await
            .unwrap();
        assert_eq!(out.stdout, "42\n");
        assert_eq!(out.stderr, "warning: slow\n");
        let checked = runner
            .run_checked("sh", &["-c", "echo 42; echo 'warning: slow' >&2"])
            .await
            .unwrap();
        assert_eq!(checked, "42\n");
    }

    #[tokio::test]
    async fn run_checked_rejects_failing_status() {
        let err = SystemRunner::default()
            .run_checked("sh", &["-c", "echo oops >&2; exit 3"])
            .await
            .unwrap_err();
        let CollectError::Status { output, .. } = err else {
            panic!("expected a status error, got {:?}", err);
        };
        assert_eq!(output, "oops");
    }

    #[tokio::test]
    async fn run_times_out() {
        let err = run("sleep", &["5"], Duration::from_millis(50))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, CollectError::Timeout { .. }));
    }

    #[tokio::test]
    async fn run_reports_missing_program() {
        let err = run("definitely-not-a-real-binary-xyz", &[], COMMAND_TIMEOUT)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, CollectError::Spawn { .. }));
    }
}
