//! External process execution.
//!
//! Every fetcher and script step goes through a [`CommandRunner`], so tests
//! can substitute a recording fake for the real [`SystemRunner`].

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::environment::EnvironmentOverlay;
use crate::{Error, Result};

/// A fully described process launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    /// Program name or path.
    pub program: String,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// Working directory; inherits the current one when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    /// Body written to stdin; stdin is closed when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdin: Option<String>,
    /// Stream stdout and stderr to the terminal instead of capturing them.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub inherit_output: bool,
}

impl Invocation {
    /// Start describing a launch of `program`.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            stdin: None,
            inherit_output: false,
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a path argument.
    #[must_use]
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run inside `dir`.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Feed `body` on stdin.
    #[must_use]
    pub fn stdin(mut self, body: impl Into<String>) -> Self {
        self.stdin = Some(body.into());
        self
    }

    /// Let the process write to the terminal directly.
    #[must_use]
    pub fn inherit_output(mut self) -> Self {
        self.inherit_output = true;
        self
    }

    /// Program and arguments joined for log and error messages.
    #[must_use]
    pub fn display_command(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// What a finished process left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` when terminated by a signal.
    pub exit_code: Option<i32>,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

impl ProcessOutput {
    /// A successful run that printed `stdout`.
    #[must_use]
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed run with the given exit code and stderr.
    #[must_use]
    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Whether the process exited with status zero.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Human-readable exit status.
    #[must_use]
    pub fn status_description(&self) -> String {
        self.exit_code.map_or_else(
            || "terminated by signal".to_string(),
            |code| format!("exit code {code}"),
        )
    }

    /// Stdout followed by stderr, verbatim, for error reports.
    #[must_use]
    pub fn transcript(&self) -> String {
        let mut out = String::new();
        for stream in [&self.stdout, &self.stderr] {
            let trimmed = stream.trim_end();
            if trimmed.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(trimmed);
        }
        out
    }
}

/// Launches external processes.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `invocation` to completion with `env` layered over the inherited
    /// environment, capturing its output.
    ///
    /// A non-zero exit is not an error at this level; callers map it to the
    /// failure kind of their operation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Spawn`] if the process could not be started.
    async fn run(&self, invocation: &Invocation, env: &EnvironmentOverlay) -> Result<ProcessOutput>;
}

/// Runs processes on the real system via `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    /// Create a new system runner.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation, env: &EnvironmentOverlay) -> Result<ProcessOutput> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }
        env.apply(&mut cmd);

        cmd.stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        if invocation.inherit_output {
            cmd.stdout(Stdio::inherit());
            cmd.stderr(Stdio::inherit());
        } else {
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());
        }

        debug!(command = %invocation.display_command(), cwd = ?invocation.cwd, "Spawning process");

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::spawn(&invocation.program, e))?;

        if let (Some(body), Some(mut stdin)) = (&invocation.stdin, child.stdin.take()) {
            stdin
                .write_all(body.as_bytes())
                .await
                .map_err(|e| Error::io(e, None, format!("write stdin of {}", invocation.program)))?;
            // Dropping closes the pipe so the child sees EOF
            drop(stdin);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::io(e, None, format!("wait for {}", invocation.program)))?;

        let result = ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };
        trace!(
            program = %invocation.program,
            exit_code = ?result.exit_code,
            stdout_len = result.stdout.len(),
            stderr_len = result.stderr.len(),
            "Process finished"
        );
        Ok(result)
    }
}
