#![allow(clippy::result_large_err)]

//! Persistent clone cache keyed by repository URL.
//!
//! Each URL maps to one directory under the cache root. Access to a directory
//! is serialized through a per-identity async mutex; the guard lives inside
//! the returned [`Workspace`] and is released when the run drops it, on every
//! exit path.

use crate::core::error::AppError;
use crate::core::git::{is_git_repo, GitSession};
use crate::core::types::ErrorCategory;
use dashmap::DashMap;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tokio::sync::{Mutex, OwnedMutexGuard};

const HASH_LEN: usize = 10;

/// Filesystem-safe, stable directory name for a repository URL.
///
/// Last path segment without trailing slash or `.git`, runs of characters
/// outside `[A-Za-z0-9._-]` replaced by `-`, surrounding `-` trimmed, then a
/// short SHA-256 of the full URL.
pub fn workspace_identity(repository_url: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let unsafe_chars =
        UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("valid identity regex"));

    let trimmed = repository_url.trim_end_matches('/');
    let segment = trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(trimmed);
    let segment = segment.strip_suffix(".git").unwrap_or(segment);
    let sanitized = unsafe_chars.replace_all(segment, "-");
    let name = sanitized.trim_matches('-');
    let name = if name.is_empty() { "repo" } else { name };

    let digest = hex::encode(Sha256::digest(repository_url.as_bytes()));
    format!("{}-{}", name, &digest[..HASH_LEN])
}

/// A checked-out clone held exclusively by one run.
pub struct Workspace {
    pub identity: String,
    pub path: PathBuf,
    _guard: OwnedMutexGuard<()>,
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("identity", &self.identity)
            .field("path", &self.path)
            .finish()
    }
}

pub struct WorkspaceCache {
    root: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl WorkspaceCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, repository_url: &str) -> PathBuf {
        self.root.join(workspace_identity(repository_url))
    }

    /// Wait for exclusive use of the workspace for `repository_url`.
    pub async fn lock(&self, repository_url: &str) -> Workspace {
        let identity = workspace_identity(repository_url);
        let lock = self
            .locks
            .entry(identity.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        Workspace {
            path: self.root.join(&identity),
            identity,
            _guard: guard,
        }
    }

    /// Lock the workspace, then clone it (fresh) or fetch into it (reused).
    ///
    /// Returns the held workspace and whether it was freshly cloned. An
    /// existing directory without a repository marker is a fatal error and is
    /// never overwritten.
    pub async fn acquire(
        &self,
        repository_url: &str,
        git: &GitSession,
    ) -> Result<(Workspace, bool), AppError> {
        let logs = git.sink();
        let workspace = self.lock(repository_url).await;
        logs.debug(&format!("Repository directory will be {}.", workspace.path.display()));

        if workspace.path.exists() {
            if !is_git_repo(&workspace.path) {
                return Err(AppError::new(
                    ErrorCategory::ResolutionError,
                    format!(
                        "Existing repository path is not a git repo: {}",
                        workspace.path.display()
                    ),
                )
                .with_code("WS-002"));
            }
            logs.append(&format!(
                "Using existing repository at {}",
                workspace.path.display()
            ));
            logs.debug("Fetching latest changes from all remotes.");
            git.run_unhooked_checked(
                Some(&workspace.path),
                &["fetch", "--prune", "--all"],
                "git fetch failed",
            )
            .await?;
            logs.debug("git fetch completed.");
            return Ok((workspace, false));
        }

        logs.append(&format!("Cloning repository {}", repository_url));
        if let Some(parent) = workspace.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|err| {
                AppError::new(
                    ErrorCategory::IoError,
                    format!("failed to create {}: {}", parent.display(), err),
                )
                .with_code("WS-001")
            })?;
        }
        let target = workspace.path.display().to_string();
        git.run_unhooked_checked(
            None,
            &["clone", repository_url, &target],
            "git clone failed",
        )
        .await?;
        logs.debug("git clone completed.");
        Ok((workspace, true))
    }
}
