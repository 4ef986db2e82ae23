#![allow(clippy::result_large_err)]

mod branch;
mod commit;
mod reset;

pub use branch::{generate_parking_branch, resolve_default_branch, BranchManager};
pub use commit::CommitManager;
pub use reset::reset_cached_repo;

use crate::core::command::{run_logged, CommandOutput, CommandRequest, CommandRunner};
use crate::core::error::AppError;
use crate::core::logger::LogSink;
use crate::core::types::ErrorCategory;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Null device used to disable repository hooks.
pub const NULL_DEVICE: &str = if cfg!(windows) { "NUL" } else { "/dev/null" };

/// Git invocations for one run: shared runner, per-run env overrides, run log.
#[derive(Clone)]
pub struct GitSession {
    runner: Arc<dyn CommandRunner>,
    env: HashMap<String, String>,
    sink: LogSink,
}

impl GitSession {
    pub fn new(runner: Arc<dyn CommandRunner>, sink: LogSink) -> Self {
        Self {
            runner,
            env: HashMap::new(),
            sink,
        }
    }

    /// Add an environment override applied to every later invocation.
    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env.insert(key.into(), value.into());
    }

    pub fn sink(&self) -> &LogSink {
        &self.sink
    }

    /// Run `git <args>`; a non-zero exit is returned, not raised.
    pub async fn run(&self, cwd: Option<&Path>, args: &[&str]) -> Result<CommandOutput, AppError> {
        let mut request = CommandRequest::new("git").args(args.iter().copied()).envs(&self.env);
        if let Some(cwd) = cwd {
            request = request.cwd(cwd);
        }
        run_logged(self.runner.as_ref(), &request, &self.sink).await
    }

    /// Run `git -c core.hooksPath=<null> <args>` so repository hooks never fire.
    pub async fn run_unhooked(
        &self,
        cwd: Option<&Path>,
        args: &[&str],
    ) -> Result<CommandOutput, AppError> {
        let hooks = format!("core.hooksPath={}", NULL_DEVICE);
        let mut full: Vec<&str> = vec!["-c", hooks.as_str()];
        full.extend_from_slice(args);
        self.run(cwd, &full).await
    }

    /// Like [`GitSession::run`] but a non-zero exit becomes a command failure named `failure`.
    pub async fn run_checked(
        &self,
        cwd: Option<&Path>,
        args: &[&str],
        failure: &str,
    ) -> Result<CommandOutput, AppError> {
        let output = self.run(cwd, args).await?;
        ensure_success(output, failure)
    }

    pub async fn run_unhooked_checked(
        &self,
        cwd: Option<&Path>,
        args: &[&str],
        failure: &str,
    ) -> Result<CommandOutput, AppError> {
        let output = self.run_unhooked(cwd, args).await?;
        ensure_success(output, failure)
    }

    /// `git show-ref --verify <reference>` succeeded.
    pub async fn ref_exists(&self, repo: &Path, reference: &str) -> Result<bool, AppError> {
        let output = self
            .run(Some(repo), &["show-ref", "--verify", reference])
            .await?;
        Ok(output.success())
    }
}

/// Check that the workspace directory contains a repository marker.
pub fn is_git_repo(path: &Path) -> bool {
    path.join(".git").exists()
}

fn ensure_success(output: CommandOutput, failure: &str) -> Result<CommandOutput, AppError> {
    if output.success() {
        return Ok(output);
    }
    let mut err = AppError::new(ErrorCategory::CommandError, failure).with_code("GIT-001");
    err.add_context("exit_code", &output.exit_code.to_string());
    let stderr = output.stderr.trim();
    if !stderr.is_empty() {
        err.add_context("stderr", stderr);
    }
    Err(err)
}
