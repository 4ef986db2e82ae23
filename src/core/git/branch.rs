#![allow(clippy::result_large_err)] // Git branch operations bubble AppError for command failures so extra boxing is unnecessary.

use super::GitSession;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use rand::Rng;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const PARKING_PREFIX: &str = "tmp-clean-";
const CONVENTIONAL_DEFAULTS: [&str; 2] = ["main", "master"];

fn head_branch_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"HEAD branch:\s*(\S+)").expect("valid HEAD branch regex"))
}

/// Resolve the remote's default branch name.
///
/// Tries, in order: the `origin/HEAD` symbolic ref, the `HEAD branch:` line of
/// `git remote show origin`, then `main` and `master` on the remote. The
/// result must exist as `refs/remotes/origin/<name>`.
pub async fn resolve_default_branch(git: &GitSession, repo: &Path) -> Result<String, AppError> {
    let logs = git.sink();
    logs.debug("Resolving default branch from origin/HEAD.");
    let symbolic = git
        .run(
            Some(repo),
            &[
                "symbolic-ref",
                "--quiet",
                "--short",
                "refs/remotes/origin/HEAD",
            ],
        )
        .await?;
    let mut resolved = if symbolic.success() {
        symbolic.stdout.trim().to_string()
    } else {
        String::new()
    };

    if resolved.is_empty() {
        logs.debug("origin/HEAD not available; checking 'git remote show origin'.");
        let remote_show = git.run(Some(repo), &["remote", "show", "origin"]).await?;
        if remote_show.success() {
            if let Some(captures) = head_branch_pattern().captures(&remote_show.stdout) {
                let candidate = captures[1].trim();
                if candidate != "(unknown)" {
                    resolved = candidate.to_string();
                }
            }
        }
    }

    if resolved.is_empty() {
        logs.debug("Unable to parse HEAD branch; falling back to common defaults.");
        for candidate in CONVENTIONAL_DEFAULTS {
            if git
                .ref_exists(repo, &format!("refs/remotes/origin/{}", candidate))
                .await?
            {
                resolved = candidate.to_string();
                break;
            }
        }
    }

    if resolved.is_empty() {
        return Err(resolution_error("Unable to resolve default branch from origin"));
    }

    if let Some(stripped) = resolved.strip_prefix("origin/") {
        resolved = stripped.to_string();
    }
    if resolved.is_empty() {
        return Err(resolution_error("Resolved default branch name is empty"));
    }
    if !git
        .ref_exists(repo, &format!("refs/remotes/origin/{}", resolved))
        .await?
    {
        return Err(resolution_error(&format!("origin/{} does not exist", resolved)));
    }
    logs.debug(&format!("Resolved default branch '{}'.", resolved));
    Ok(resolved)
}

/// Pick a `tmp-clean-<hex>` branch name that no local branch uses yet.
pub async fn generate_parking_branch(git: &GitSession, repo: &Path) -> Result<String, AppError> {
    loop {
        let suffix: u32 = rand::thread_rng().gen();
        let candidate = format!("{}{:08x}", PARKING_PREFIX, suffix);
        if !git
            .ref_exists(repo, &format!("refs/heads/{}", candidate))
            .await?
        {
            git.sink()
                .debug(&format!("Generated temporary branch '{}'.", candidate));
            return Ok(candidate);
        }
        git.sink().debug(&format!(
            "Temporary branch '{}' already exists; regenerating.",
            candidate
        ));
    }
}

fn resolution_error(message: &str) -> AppError {
    AppError::new(ErrorCategory::ResolutionError, message).with_code("GIT-010")
}

/// Branch checkout and creation inside one repository.
pub struct BranchManager<'a> {
    git: &'a GitSession,
    repo: PathBuf,
}

impl<'a> BranchManager<'a> {
    pub fn new(git: &'a GitSession, repo: &Path) -> Self {
        Self {
            git,
            repo: repo.to_path_buf(),
        }
    }

    /// Local branch names, as listed by `for-each-ref refs/heads/`.
    pub async fn local_branches(&self) -> Result<Vec<String>, AppError> {
        let output = self
            .git
            .run_checked(
                Some(&self.repo),
                &["for-each-ref", "--format=%(refname:short)", "refs/heads/"],
                "Failed to list local branches",
            )
            .await?;
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub async fn remote_branch_exists(&self, name: &str) -> Result<bool, AppError> {
        self.git
            .ref_exists(&self.repo, &format!("refs/remotes/origin/{}", name))
            .await
    }

    pub async fn force_delete(&self, name: &str) -> Result<(), AppError> {
        self.git
            .run_checked(
                Some(&self.repo),
                &["branch", "-D", name],
                &format!("Failed to delete branch {}", name),
            )
            .await
            .map(|_| ())
    }

    /// `git switch -C <name> origin/<name>`: point the local branch at the remote tip.
    pub async fn switch_to_remote_tip(&self, name: &str) -> Result<(), AppError> {
        let upstream = format!("origin/{}", name);
        self.git
            .run_checked(
                Some(&self.repo),
                &["switch", "-C", name, &upstream],
                &format!("Failed to switch to {}", upstream),
            )
            .await
            .map(|_| ())
    }

    /// `git switch -c <name>` from the current commit.
    pub async fn create_from_current(&self, name: &str) -> Result<(), AppError> {
        self.git
            .run_checked(
                Some(&self.repo),
                &["switch", "-c", name],
                &format!("Failed to create local branch {}", name),
            )
            .await
            .map(|_| ())
    }

    /// `git checkout -b <name> <base>`.
    pub async fn create_from(&self, name: &str, base: &str) -> Result<(), AppError> {
        self.git
            .run_unhooked_checked(
                Some(&self.repo),
                &["checkout", "-b", name, base],
                "Failed to create branch from commit",
            )
            .await
            .map(|_| ())
    }

    /// Create an orphan branch and empty its working tree.
    pub async fn create_orphan(&self, name: &str) -> Result<(), AppError> {
        self.git
            .run_unhooked_checked(
                Some(&self.repo),
                &["checkout", "--orphan", name],
                "Failed to create orphan branch",
            )
            .await?;
        self.git.sink().debug("Removing working tree files for orphan branch.");
        // An already empty tree makes `git rm` fail; that is not an error here.
        self.git.run(Some(&self.repo), &["rm", "-rf", "."]).await?;
        Ok(())
    }

    /// Check out `name`, creating it when missing, else fast-forward it from origin.
    pub async fn checkout_or_create(&self, name: &str) -> Result<(), AppError> {
        self.git
            .sink()
            .debug(&format!("Checking out branch '{}'.", name));
        let checkout = self
            .git
            .run_unhooked(Some(&self.repo), &["checkout", name])
            .await?;
        if !checkout.success() {
            self.git
                .sink()
                .append(&format!("Branch {} not found. Creating new branch.", name));
            self.git
                .run_unhooked_checked(
                    Some(&self.repo),
                    &["checkout", "-b", name],
                    "Failed to create branch",
                )
                .await?;
            self.git.sink().debug(&format!("Branch '{}' created.", name));
            return Ok(());
        }
        self.git
            .sink()
            .debug(&format!("Pulling latest changes for branch '{}'.", name));
        self.git
            .run_unhooked_checked(
                Some(&self.repo),
                &["pull", "--ff-only", "origin", name],
                "git pull failed",
            )
            .await?;
        Ok(())
    }
}
