#![allow(clippy::result_large_err)]

use super::{generate_parking_branch, BranchManager, GitSession};
use crate::core::error::AppError;
use std::path::Path;

const PARKING_IDENTITY: [&str; 4] = [
    "-c",
    "user.name=patchrelay",
    "-c",
    "user.email=patchrelay@localhost",
];

/// Bring a reused clone back to the state of a fresh clone.
///
/// Every local branch is destroyed from a temporary orphan "parking" branch,
/// `default_branch` is recreated at `origin/<default_branch>`, the tree is
/// hard-reset and cleaned, and `target_branch` (when given and distinct) is
/// checked out from its remote tip or branched from the default. The parking
/// branch is deleted last. Apart from the initial best-effort discard of
/// uncommitted changes, any failing step aborts the reset.
pub async fn reset_cached_repo(
    git: &GitSession,
    repo: &Path,
    default_branch: &str,
    target_branch: Option<&str>,
) -> Result<(), AppError> {
    let logs = git.sink();
    let branches = BranchManager::new(git, repo);

    // Leftover edits or conflict entries would block the orphan switch below.
    logs.debug("Discarding uncommitted changes left by a previous run.");
    git.run(Some(repo), &["reset", "--hard"]).await?;

    let parking = generate_parking_branch(git, repo).await?;
    logs.debug(&format!(
        "Switching to orphan temporary branch '{}'.",
        parking
    ));
    git.run_checked(
        Some(repo),
        &["switch", "--orphan", &parking],
        "Failed to create temporary orphan branch",
    )
    .await?;

    logs.debug("Creating empty commit on temporary branch.");
    let mut commit_args: Vec<&str> = PARKING_IDENTITY.to_vec();
    commit_args.extend_from_slice(&["commit", "--allow-empty", "-m", "temporary cleanup branch"]);
    git.run_checked(
        Some(repo),
        &commit_args,
        "Failed to create temporary empty commit",
    )
    .await?;

    for branch in branches.local_branches().await? {
        if branch == parking {
            continue;
        }
        logs.debug(&format!("Deleting local branch '{}'.", branch));
        branches.force_delete(&branch).await?;
    }

    logs.debug(&format!(
        "Recreating default branch '{}' from origin/{}.",
        default_branch, default_branch
    ));
    branches.switch_to_remote_tip(default_branch).await?;

    logs.debug("Resetting and cleaning working tree.");
    git.run_checked(Some(repo), &["reset", "--hard"], "git reset --hard failed")
        .await?;
    git.run_checked(Some(repo), &["clean", "-fd"], "git clean -fd failed")
        .await?;

    if let Some(target) = target_branch.filter(|target| *target != default_branch) {
        if branches.remote_branch_exists(target).await? {
            logs.debug(&format!(
                "Switching to target branch '{}' from origin/{}.",
                target, target
            ));
            branches.switch_to_remote_tip(target).await?;
        } else {
            logs.debug(&format!(
                "Creating new local branch '{}' from default branch.",
                target
            ));
            branches.create_from_current(target).await?;
        }
    }

    logs.debug(&format!("Deleting temporary branch '{}'.", parking));
    branches.force_delete(&parking).await?;
    Ok(())
}
