#![allow(clippy::result_large_err)] // Pipeline steps return AppError directly so the run log keeps full diagnostics.

//! Patch delivery: one submission in, one [`Outcome`] out.
//!
//! The run is split in two phases. Everything that can be decided without
//! touching disk (field normalization, validation, registry selections) runs
//! inline and produces [`RunFailure::Declined`]. The side-effecting phase runs
//! on its own task holding the workspace lock, so a dropped caller never
//! interrupts a git operation halfway and a panic is reported as
//! [`RunFailure::Internal`] instead of tearing down the server.

mod submission;

pub use submission::{fields_from_json, FormValues, Submission};

use crate::core::command::CommandRunner;
use crate::core::config::{expand_home, AppConfig, RuntimeSettings};
use crate::core::error::AppError;
use crate::core::git::{
    reset_cached_repo, resolve_default_branch, BranchManager, CommitManager, GitSession,
};
use crate::core::logger::LogSink;
use crate::core::types::{BranchMode, ErrorCategory};
use crate::core::workspace::WorkspaceCache;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::Instrument;

/// Terminal result of one submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    pub log: Vec<String>,
    pub form_values: FormValues,
}

/// Why a run did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum RunFailure {
    /// Rejected before any side effect.
    #[error("{0}")]
    Declined(AppError),
    /// A step failed after the workspace was touched.
    #[error("{0}")]
    Aborted(AppError),
    /// The run panicked or was torn down unexpectedly.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RunFailure {
    fn report(&self, logs: &LogSink) {
        match self {
            RunFailure::Declined(err) => {
                logs.append(&err.message);
            }
            RunFailure::Aborted(err) => {
                logs.append(&format!("ERROR: {}", err.message));
                logs.append(&err.diagnostic_trace());
            }
            RunFailure::Internal(detail) => {
                let err = AppError::new(ErrorCategory::InternalError, detail.clone())
                    .with_code("RUN-500");
                logs.append(&format!("ERROR: {}", self));
                logs.append(&err.diagnostic_trace());
            }
        }
        logs.debug("Request failed.");
    }
}

/// Everything the side-effecting phase needs, resolved up front.
struct RunPlan {
    submission: Submission,
    mode: BranchMode,
    identity: Option<(String, String)>,
    ssh: Option<SshKey>,
}

struct SshKey {
    path: PathBuf,
    command: String,
}

/// Per-run scratch directory for `patch.diff` and `commit_message.txt`.
enum Scratch {
    Temporary(TempDir),
    Kept(PathBuf),
}

impl Scratch {
    fn create(keep: bool, logs: &LogSink) -> Result<Self, AppError> {
        let dir = tempfile::Builder::new()
            .prefix("patchrelay-")
            .tempdir()
            .map_err(|err| {
                AppError::new(
                    ErrorCategory::IoError,
                    format!("Failed to create temporary workspace: {}", err),
                )
                .with_code("RUN-001")
            })?;
        if !keep {
            logs.debug(&format!("Created temporary workspace at {}.", dir.path().display()));
            return Ok(Scratch::Temporary(dir));
        }
        let path = dir.keep();
        logs.append(&format!("Keeping temporary workspace at {}", path.display()));
        logs.debug("Temporary workspace will be preserved for debugging.");
        Ok(Scratch::Kept(path))
    }

    fn path(&self) -> &Path {
        match self {
            Scratch::Temporary(dir) => dir.path(),
            Scratch::Kept(path) => path,
        }
    }

    async fn write(&self, name: &str, content: &str) -> Result<PathBuf, AppError> {
        let path = self.path().join(name);
        tokio::fs::write(&path, content).await.map_err(|err| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to write {}: {}", path.display(), err),
            )
            .with_code("RUN-002")
        })?;
        Ok(path)
    }
}

/// Orchestrates submissions against the shared workspace cache.
#[derive(Clone)]
pub struct PatchPipeline {
    config: Arc<AppConfig>,
    settings: Arc<RuntimeSettings>,
    cache: Arc<WorkspaceCache>,
    runner: Arc<dyn CommandRunner>,
}

impl PatchPipeline {
    pub fn new(
        config: Arc<AppConfig>,
        settings: RuntimeSettings,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let cache = Arc::new(WorkspaceCache::new(settings.repo_root.clone()));
        Self {
            config,
            settings: Arc::new(settings),
            cache,
            runner,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn cache(&self) -> &WorkspaceCache {
        &self.cache
    }

    /// Run one submission to completion. Never fails: every failure kind ends
    /// up as `success = false` plus log lines.
    pub async fn process_submission(
        &self,
        fields: &HashMap<String, String>,
        logs: &LogSink,
    ) -> Outcome {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("submission", run_id = %run_id);
        let logs = logs.clone().with_run_id(run_id);

        logs.debug("Received submission payload.");
        let mut submission = Submission::from_fields(fields);
        let mode = submission.mode();
        if let Ok(BranchMode::FromCommit) = mode {
            let ignored = submission.discard_commit_fields();
            if !ignored.is_empty() {
                logs.append(&format!(
                    "Ignoring {} for branch creation from commit.",
                    ignored.join(", ")
                ));
            }
        }
        submission.log_parsed(&logs);
        let form_values = submission.form_values();

        let result = match mode {
            Ok(mode) => self.run(submission, mode, &logs).instrument(span.clone()).await,
            Err(err) => Err(RunFailure::Declined(err)),
        };

        let success = match result {
            Ok(()) => true,
            Err(failure) => {
                span.in_scope(|| tracing::warn!("submission failed: {}", failure));
                failure.report(&logs);
                false
            }
        };
        span.in_scope(|| tracing::info!(success, "submission finished"));

        Outcome {
            success,
            log: logs.lines(),
            form_values,
        }
    }

    async fn run(
        &self,
        submission: Submission,
        mode: BranchMode,
        logs: &LogSink,
    ) -> Result<(), RunFailure> {
        let plan = self.plan(submission, mode, logs).map_err(RunFailure::Declined)?;

        let pipeline = self.clone();
        let task_logs = logs.clone();
        let handle = tokio::spawn(
            async move { pipeline.deliver(plan, task_logs).await }.in_current_span(),
        );
        match handle.await {
            Ok(result) => result.map_err(RunFailure::Aborted),
            Err(join_err) if join_err.is_panic() => {
                let payload = join_err.into_panic();
                let detail = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "run panicked".to_string());
                Err(RunFailure::Internal(detail))
            }
            Err(join_err) => Err(RunFailure::Internal(join_err.to_string())),
        }
    }

    /// Validation and registry lookups; no side effects.
    fn plan(
        &self,
        submission: Submission,
        mode: BranchMode,
        logs: &LogSink,
    ) -> Result<RunPlan, AppError> {
        if mode == BranchMode::FromCommit
            && submission.base_is_tip()
            && !submission.base_commit.is_empty()
        {
            logs.debug("Base commit set to HEAD for branch creation; will resolve to default branch.");
        }
        submission.validate(mode)?;

        let identity = match self.config.select_git_user(&submission.git_user)? {
            Some(user) => {
                logs.debug(&format!(
                    "Resolved git user selection={} name='{}'.",
                    submission.git_user,
                    user.name.trim()
                ));
                Some((user.name.trim().to_string(), user.email.trim().to_string()))
            }
            None => None,
        };
        logs.debug("Validated git user selection.");

        let ssh = match self.config.select_ssh_key(&submission.ssh_key)? {
            Some(entry) => Some(ssh_key(&entry.path)?),
            None => {
                logs.debug("No SSH key selected; using default SSH configuration.");
                None
            }
        };

        Ok(RunPlan {
            submission,
            mode,
            identity,
            ssh,
        })
    }

    async fn deliver(self, plan: RunPlan, logs: LogSink) -> Result<(), AppError> {
        let RunPlan {
            submission,
            mode,
            identity,
            ssh,
        } = plan;
        let scratch = Scratch::create(self.settings.keep_temp, &logs)?;

        let mut git = GitSession::new(self.runner.clone(), logs.clone());
        if let Some(key) = ssh {
            git.set_env("GIT_SSH_COMMAND", key.command.clone());
            logs.append(&format!("Using SSH key: {}", key.path.display()));
            logs.debug(&format!("GIT_SSH_COMMAND set to: {}", key.command));
        }

        let (workspace, fresh) = self.cache.acquire(&submission.repository_url, &git).await?;
        let repo = workspace.path.as_path();
        let mut default_branch = None;

        if !fresh {
            let default = known_default(&mut default_branch, &git, repo).await?;
            let target = match mode {
                BranchMode::Default => submission.target_branch(mode).or(Some(default.as_str())),
                _ => None,
            };
            logs.debug("Resetting cached repository state to match remote default branch.");
            reset_cached_repo(&git, repo, &default, target).await?;
        }

        let commits = CommitManager::new(&git, repo);
        if let Some((name, email)) = &identity {
            if !name.is_empty() {
                logs.debug("Configuring git user.name.");
                commits.set_config("user.name", name).await?;
            }
            if !email.is_empty() {
                logs.debug("Configuring git user.email.");
                commits.set_config("user.email", email).await?;
            }
        }

        let branches = BranchManager::new(&git, repo);
        let target = match mode {
            BranchMode::FromCommit => {
                let base = if submission.base_is_tip() {
                    let default = known_default(&mut default_branch, &git, repo).await?;
                    let base = format!("origin/{}", default);
                    logs.append(&format!("Using {} as the base for branch creation.", base));
                    base
                } else {
                    submission.base_commit.clone()
                };
                logs.append(&format!(
                    "Creating branch {} from commit {}.",
                    submission.new_branch, base
                ));
                branches.create_from(&submission.new_branch, &base).await?;
                logs.debug("Pushing branch created from commit to origin.");
                commits.push(&submission.new_branch).await?;
                logs.append("Branch created from commit and pushed successfully.");
                return Ok(());
            }
            BranchMode::Orphan => {
                logs.append(&format!("Creating orphan branch {}.", submission.new_branch));
                branches.create_orphan(&submission.new_branch).await?;
                submission.new_branch.clone()
            }
            BranchMode::Default => {
                let branch = match submission.target_branch(mode) {
                    Some(branch) => branch.to_string(),
                    None => {
                        logs.debug("No branch specified; using default branch.");
                        known_default(&mut default_branch, &git, repo).await?
                    }
                };
                if fresh {
                    branches.checkout_or_create(&branch).await?;
                }
                branch
            }
        };

        if submission.has_patch() {
            logs.append(&submission.patch);
            let patch_file = scratch.write("patch.diff", &submission.patch).await?;
            logs.append("Patch written to temporary file.");
            logs.debug("Applying patch with git apply --3way -v.");
            commits.apply_patch(&patch_file).await?;
            logs.debug("Patch applied successfully.");
        } else {
            logs.append("No patch provided; skipping git apply.");
        }

        logs.debug("Staging changes with git add -A.");
        commits.stage_all().await?;

        if submission.commit_message.is_empty() {
            logs.append("No commit message provided. Skipping commit.");
            logs.append("Push skipped because no commit was created.");
            return Ok(());
        }

        let message_file = scratch
            .write("commit_message.txt", &submission.commit_message)
            .await?;
        logs.debug("Creating git commit.");
        commits
            .commit_from_file(&message_file, submission.allow_empty_commit)
            .await?;
        logs.debug("Pushing commit to origin.");
        commits.push(&format!("HEAD:{}", target)).await?;
        logs.append("Patch applied, committed, and pushed successfully.");
        Ok(())
    }
}

async fn known_default(
    cached: &mut Option<String>,
    git: &GitSession,
    repo: &Path,
) -> Result<String, AppError> {
    if let Some(name) = cached {
        return Ok(name.clone());
    }
    let name = resolve_default_branch(git, repo).await?;
    *cached = Some(name.clone());
    Ok(name)
}

/// Resolve a configured key path and build the `GIT_SSH_COMMAND` for it.
fn ssh_key(raw_path: &str) -> Result<SshKey, AppError> {
    let path = expand_home(Path::new(raw_path));
    if raw_path.is_empty() || !path.exists() {
        return Err(AppError::new(
            ErrorCategory::SelectionError,
            format!("SSH key path not found: {}", path.display()),
        )
        .with_code("CFG-SEL-002"));
    }
    Ok(SshKey {
        command: ssh_command(raw_path, &path),
        path,
    })
}

/// Windows-style paths are passed to ssh with forward slashes.
fn ssh_command(raw_path: &str, resolved: &Path) -> String {
    let key = if raw_path.contains('\\') || raw_path.contains(':') {
        raw_path.replace('\\', "/")
    } else {
        resolved.display().to_string()
    };
    format!(
        "ssh -i {} -o StrictHostKeyChecking=no",
        shell_escape::unix::escape(Cow::Owned(key))
    )
}
