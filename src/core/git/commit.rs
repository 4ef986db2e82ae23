#![allow(clippy::result_large_err)] // Git commit helpers return AppError directly to preserve run diagnostics without boxing.

use super::GitSession;
use crate::core::error::AppError;
use std::path::{Path, PathBuf};

/// Manages patch application, staging, commit and push operations
pub struct CommitManager<'a> {
    git: &'a GitSession,
    repo: PathBuf,
}

impl<'a> CommitManager<'a> {
    pub fn new(git: &'a GitSession, repo: &Path) -> Self {
        Self {
            git,
            repo: repo.to_path_buf(),
        }
    }

    /// `git apply --3way -v <patch_file>`; any non-zero exit is fatal
    pub async fn apply_patch(&self, patch_file: &Path) -> Result<(), AppError> {
        let patch_arg = patch_file.display().to_string();
        self.git
            .run_checked(
                Some(&self.repo),
                &["apply", "--3way", "-v", &patch_arg],
                "git apply failed",
            )
            .await
            .map(|_| ())
    }

    /// Stage every working-tree change, then log a short status
    pub async fn stage_all(&self) -> Result<(), AppError> {
        self.git
            .run_checked(Some(&self.repo), &["add", "-A"], "git add failed")
            .await?;
        self.git.sink().debug("Checking git status after staging.");
        self.git.run(Some(&self.repo), &["status", "-sb"]).await?;
        Ok(())
    }

    /// Commit with the message read from `message_file` (`git commit -F`)
    pub async fn commit_from_file(
        &self,
        message_file: &Path,
        allow_empty: bool,
    ) -> Result<(), AppError> {
        let message_arg = message_file.display().to_string();
        let mut args = vec!["commit"];
        if allow_empty {
            args.push("--allow-empty");
        }
        args.extend_from_slice(&["-F", &message_arg]);
        self.git
            .run_unhooked_checked(Some(&self.repo), &args, "git commit failed")
            .await
            .map(|_| ())
    }

    /// Push `refspec` to origin
    pub async fn push(&self, refspec: &str) -> Result<(), AppError> {
        self.git
            .run_unhooked_checked(
                Some(&self.repo),
                &["push", "origin", refspec],
                "git push failed",
            )
            .await
            .map(|_| ())
    }

    /// Set a repository-local config value such as `user.name`
    pub async fn set_config(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.git
            .run_checked(
                Some(&self.repo),
                &["config", key, value],
                &format!("Failed to set git {}", key),
            )
            .await
            .map(|_| ())
    }
}
