#![allow(clippy::result_large_err)] // Command runners return AppError so callers keep the full diagnostic context.

use crate::core::error::AppError;
use crate::core::logger::LogSink;
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// One external program invocation.
#[derive(Clone, Debug, Default)]
pub struct CommandRequest {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Variables layered on top of the inherited process environment.
    pub env: HashMap<String, String>,
}

impl CommandRequest {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn envs(mut self, env: &HashMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(key, value)| (key.clone(), value.clone())));
        self
    }

    /// Printable form used for the `$ ...` log line.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Exit code plus decoded output of a finished command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync + 'static {
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutput, AppError>;
}

/// Runs programs on the tokio runtime, one attempt per call.
#[derive(Clone, Debug, Default)]
pub struct TokioCommandRunner {
    timeout: Option<Duration>,
}

impl TokioCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutput, AppError> {
        let mut command = Command::new(&request.program);
        command
            .args(&request.args)
            .envs(&request.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &request.cwd {
            command.current_dir(cwd);
        }

        let child = command.spawn().map_err(|err| {
            AppError::new(
                ErrorCategory::CommandError,
                format!("failed to execute {}: {}", request.program, err),
            )
            .with_code("CMD-002")
        })?;

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(result) => result,
                // Dropping the future drops the child, and kill_on_drop terminates it.
                Err(_) => {
                    return Err(AppError::new(
                        ErrorCategory::TimeoutError,
                        format!(
                            "{} timed out after {}s",
                            request.program,
                            limit.as_secs()
                        ),
                    )
                    .with_code("CMD-003")
                    .with_context("command", request.display()));
                }
            },
            None => child.wait_with_output().await,
        }
        .map_err(|err| {
            AppError::new(
                ErrorCategory::CommandError,
                format!("failed to collect output of {}: {}", request.program, err),
            )
            .with_code("CMD-002")
        })?;

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Run `request` and record it in `sink`: the command line, any output, then the exit code.
pub async fn run_logged(
    runner: &dyn CommandRunner,
    request: &CommandRequest,
    sink: &LogSink,
) -> Result<CommandOutput, AppError> {
    sink.append(&format!("$ {}", request.display()));
    let output = match runner.run(request).await {
        Ok(output) => output,
        Err(err) => {
            sink.append(&format!("command error: {}", err.message));
            return Err(err);
        }
    };
    let stdout = output.stdout.trim_end();
    if !stdout.is_empty() {
        sink.append(stdout);
    }
    let stderr = output.stderr.trim_end();
    if !stderr.is_empty() {
        sink.append(stderr);
    }
    sink.append(&format!("exit code: {}", output.exit_code));
    Ok(output)
}
