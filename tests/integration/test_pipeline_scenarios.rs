mod common;

use common::*;
use tempfile::TempDir;

#[tokio::test]
async fn default_mode_applies_commits_and_pushes() {
    let temp_dir = TempDir::new().unwrap();
    let remote = seeded_remote(temp_dir.path());
    let url = remote.display().to_string();
    let pipeline = pipeline(temp_dir.path());

    let outcome = submit(
        &pipeline,
        &[
            ("repository_url", &url),
            ("patch", README_PATCH),
            ("commit_message", "Add patched line\r\n"),
            ("git_user", "0"),
        ],
    )
    .await;

    assert!(outcome.success, "{}", dump(&outcome));
    assert!(has_line(&outcome, "Cloning repository"));
    assert!(has_line(&outcome, "Patch applied, committed, and pushed successfully."));
    assert!(ran(&outcome, "push origin HEAD:main"));
    assert_eq!(git(&remote, &["log", "-1", "--format=%s", "main"]), "Add patched line");
    assert_eq!(git(&remote, &["log", "-1", "--format=%an", "main"]), "Relay Bot");
    assert_eq!(git(&remote, &["show", "main:README.md"]), "seed\npatched");
    assert_eq!(outcome.form_values.commit_message, "Add patched line");
    assert_eq!(outcome.form_values.git_user_selection, "0");
}

#[tokio::test]
async fn missing_branch_is_created_and_pushed() {
    let temp_dir = TempDir::new().unwrap();
    let remote = seeded_remote(temp_dir.path());
    let url = remote.display().to_string();
    let pipeline = pipeline(temp_dir.path());

    let outcome = submit(
        &pipeline,
        &[
            ("repository_url", &url),
            ("branch", "feature/x"),
            ("patch", README_PATCH),
            ("commit_message", "Feature work"),
            ("git_user", "0"),
        ],
    )
    .await;

    assert!(outcome.success, "{}", dump(&outcome));
    assert!(has_line(&outcome, "Branch feature/x not found. Creating new branch."));
    assert!(ran(&outcome, "push origin HEAD:feature/x"));
    assert_eq!(
        git(&remote, &["log", "-1", "--format=%s", "feature/x"]),
        "Feature work"
    );
    assert_eq!(git(&remote, &["log", "-1", "--format=%s", "main"]), "Initial commit");
}

#[tokio::test]
async fn blank_commit_message_skips_commit_and_push() {
    let temp_dir = TempDir::new().unwrap();
    let remote = seeded_remote(temp_dir.path());
    let url = remote.display().to_string();
    let before = git(&remote, &["rev-parse", "main"]);
    let pipeline = pipeline(temp_dir.path());

    let outcome = submit(
        &pipeline,
        &[
            ("repository_url", &url),
            ("patch", README_PATCH),
            ("commit_message", "  \n"),
            ("git_user", "0"),
        ],
    )
    .await;

    assert!(outcome.success, "{}", dump(&outcome));
    assert!(ran(&outcome, "apply --3way -v"));
    assert!(has_line(&outcome, "No commit message provided. Skipping commit."));
    assert!(has_line(&outcome, "Push skipped because no commit was created."));
    assert!(!ran(&outcome, " push "));
    assert_eq!(git(&remote, &["rev-parse", "main"]), before);
}

#[tokio::test]
async fn from_commit_only_creates_and_pushes_branch() {
    let temp_dir = TempDir::new().unwrap();
    let remote = seeded_remote(temp_dir.path());
    let url = remote.display().to_string();
    let main_tip = git(&remote, &["rev-parse", "main"]);
    let pipeline = pipeline(temp_dir.path());

    let outcome = submit(
        &pipeline,
        &[
            ("repository_url", &url),
            ("branch_mode", "from_commit"),
            ("new_branch", "release/1.0"),
            ("base_commit", "HEAD"),
            ("patch", README_PATCH),
            ("commit_message", "should be ignored"),
            ("allow_empty_commit", "true"),
        ],
    )
    .await;

    assert!(outcome.success, "{}", dump(&outcome));
    assert!(has_line(
        &outcome,
        "Ignoring patch, commit_message, allow_empty_commit for branch creation from commit."
    ));
    assert!(has_line(&outcome, "Using origin/main as the base for branch creation."));
    assert!(has_line(&outcome, "Branch created from commit and pushed successfully."));
    assert!(!ran(&outcome, "apply"));
    assert!(!ran(&outcome, "commit"));
    assert!(outcome
        .log
        .last()
        .unwrap()
        .ends_with("Branch created from commit and pushed successfully."));
    assert_eq!(git(&remote, &["rev-parse", "release/1.0"]), main_tip);
    assert_eq!(outcome.form_values.commit_message, "");
    assert_eq!(outcome.form_values.allow_empty_commit, "");
}

#[tokio::test]
async fn from_commit_uses_explicit_base() {
    let temp_dir = TempDir::new().unwrap();
    let remote = seeded_remote(temp_dir.path());
    let url = remote.display().to_string();
    let seed_commit = git(&remote, &["rev-parse", "main"]);
    let pipeline = pipeline(temp_dir.path());

    let advanced = submit(
        &pipeline,
        &[
            ("repository_url", &url),
            ("patch", README_PATCH),
            ("commit_message", "Advance main"),
            ("git_user", "0"),
        ],
    )
    .await;
    assert!(advanced.success, "{}", dump(&advanced));

    let outcome = submit(
        &pipeline,
        &[
            ("repository_url", &url),
            ("branch_mode", "from_commit"),
            ("new_branch", "hotfix"),
            ("base_commit", &seed_commit),
        ],
    )
    .await;

    assert!(outcome.success, "{}", dump(&outcome));
    assert!(has_line(
        &outcome,
        &format!("Creating branch hotfix from commit {}.", seed_commit)
    ));
    assert_eq!(git(&remote, &["rev-parse", "hotfix"]), seed_commit);
    assert_ne!(git(&remote, &["rev-parse", "main"]), seed_commit);
}

#[tokio::test]
async fn orphan_branch_starts_from_empty_tree() {
    let temp_dir = TempDir::new().unwrap();
    let remote = seeded_remote(temp_dir.path());
    let url = remote.display().to_string();
    let pipeline = pipeline(temp_dir.path());

    let outcome = submit(
        &pipeline,
        &[
            ("repository_url", &url),
            ("branch_mode", "orphan"),
            ("new_branch", "gh-pages"),
            ("patch", NEW_FILE_PATCH),
            ("commit_message", "Start pages"),
            ("git_user", "1"),
        ],
    )
    .await;

    assert!(outcome.success, "{}", dump(&outcome));
    assert!(has_line(&outcome, "Creating orphan branch gh-pages."));
    assert!(ran(&outcome, "push origin HEAD:gh-pages"));
    assert_eq!(git(&remote, &["rev-list", "--count", "gh-pages"]), "1");
    assert_eq!(git(&remote, &["ls-tree", "--name-only", "gh-pages"]), "NOTES.md");
    assert_eq!(git(&remote, &["log", "-1", "--format=%ae", "gh-pages"]), "second@example.com");
}

#[tokio::test]
async fn failing_apply_stops_before_commit() {
    let temp_dir = TempDir::new().unwrap();
    let remote = seeded_remote(temp_dir.path());
    let url = remote.display().to_string();
    let before = git(&remote, &["rev-parse", "main"]);
    let pipeline = pipeline(temp_dir.path());

    let outcome = submit(
        &pipeline,
        &[
            ("repository_url", &url),
            ("patch", CONFLICTING_PATCH),
            ("commit_message", "Never lands"),
            ("git_user", "0"),
        ],
    )
    .await;

    assert!(!outcome.success);
    assert!(
        outcome.log.iter().any(|line| line.ends_with("git apply failed")),
        "{}",
        dump(&outcome)
    );
    assert!(has_line(&outcome, "trace: code=GIT-001 category=CommandError"));
    assert!(!ran(&outcome, "commit"));
    assert!(!ran(&outcome, " push "));
    assert_eq!(git(&remote, &["rev-parse", "main"]), before);
}

#[tokio::test]
async fn empty_repository_url_never_touches_cache() {
    let temp_dir = TempDir::new().unwrap();
    let pipeline = pipeline(temp_dir.path());

    let outcome = submit(
        &pipeline,
        &[("repository_url", "   "), ("patch", README_PATCH)],
    )
    .await;

    assert!(!outcome.success);
    assert!(has_line(&outcome, "Repository URL is required."));
    assert!(!has_line(&outcome, "Cloning repository"));
    assert!(!ran(&outcome, "fetch"));
    assert!(!temp_dir.path().join("repos").exists());
}

#[tokio::test]
async fn out_of_range_git_user_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let remote = seeded_remote(temp_dir.path());
    let url = remote.display().to_string();
    let pipeline = pipeline(temp_dir.path());

    let outcome = submit(
        &pipeline,
        &[
            ("repository_url", &url),
            ("patch", README_PATCH),
            ("commit_message", "msg"),
            ("git_user", "5"),
        ],
    )
    .await;

    assert!(!outcome.success);
    assert!(has_line(&outcome, "invalid selection"));
    assert!(!ran(&outcome, "clone"));
    assert!(!temp_dir.path().join("repos").exists());
}

#[tokio::test]
async fn missing_patch_requires_allow_empty() {
    let temp_dir = TempDir::new().unwrap();
    let remote = seeded_remote(temp_dir.path());
    let url = remote.display().to_string();
    let pipeline = pipeline(temp_dir.path());

    let declined = submit(
        &pipeline,
        &[("repository_url", &url), ("commit_message", "Empty")],
    )
    .await;
    assert!(!declined.success);
    assert!(has_line(
        &declined,
        "Patch content is required unless empty commit is allowed."
    ));

    let accepted = submit(
        &pipeline,
        &[
            ("repository_url", &url),
            ("commit_message", "Empty"),
            ("allow_empty_commit", "true"),
            ("git_user", "0"),
        ],
    )
    .await;
    assert!(accepted.success, "{}", dump(&accepted));
    assert!(has_line(&accepted, "No patch provided; skipping git apply."));
    assert!(ran(&accepted, "commit --allow-empty -F"));
    assert_eq!(git(&remote, &["log", "-1", "--format=%s", "main"]), "Empty");
}

#[tokio::test]
async fn keep_temp_preserves_scratch_files() {
    let temp_dir = TempDir::new().unwrap();
    let remote = seeded_remote(temp_dir.path());
    let url = remote.display().to_string();
    let pipeline = pipeline_with(temp_dir.path(), true);

    let outcome = submit(
        &pipeline,
        &[
            ("repository_url", &url),
            ("patch", README_PATCH),
            ("commit_message", "Kept"),
            ("git_user", "0"),
        ],
    )
    .await;
    assert!(outcome.success, "{}", dump(&outcome));

    let kept = outcome
        .log
        .iter()
        .find_map(|line| line.split("Keeping temporary workspace at ").nth(1))
        .expect("scratch path logged")
        .to_string();
    let kept = std::path::PathBuf::from(kept);
    assert_eq!(
        std::fs::read_to_string(kept.join("commit_message.txt")).unwrap(),
        "Kept"
    );
    assert!(kept.join("patch.diff").exists());
    std::fs::remove_dir_all(kept).unwrap();
}
