#![allow(dead_code)]

use patchrelay::core::command::TokioCommandRunner;
use patchrelay::core::config::{AppConfig, GitUserEntry, RuntimeSettings};
use patchrelay::core::pipeline::{Outcome, PatchPipeline};
use patchrelay::core::logger::LogSink;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

pub const README_PATCH: &str = concat!(
    "diff --git a/README.md b/README.md\n",
    "--- a/README.md\n",
    "+++ b/README.md\n",
    "@@ -1 +1,2 @@\n",
    " seed\n",
    "+patched\n",
);

pub const CONFLICTING_PATCH: &str = concat!(
    "diff --git a/README.md b/README.md\n",
    "--- a/README.md\n",
    "+++ b/README.md\n",
    "@@ -1 +1,2 @@\n",
    " not what the file says\n",
    "+patched\n",
);

pub const NEW_FILE_PATCH: &str = concat!(
    "diff --git a/NOTES.md b/NOTES.md\n",
    "new file mode 100644\n",
    "--- /dev/null\n",
    "+++ b/NOTES.md\n",
    "@@ -0,0 +1 @@\n",
    "+fresh start\n",
);

pub fn git(path: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(path)
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Bare repository on `main` seeded with `README.md` containing `seed`.
pub fn seeded_remote(root: &Path) -> PathBuf {
    let remote = root.join("remote.git");
    let seed = root.join("seed");
    std::fs::create_dir_all(&remote).unwrap();
    std::fs::create_dir_all(&seed).unwrap();
    git(&remote, &["init", "--bare", "--initial-branch=main"]);
    git(&seed, &["init", "--initial-branch=main"]);
    git(&seed, &["config", "user.email", "seed@example.com"]);
    git(&seed, &["config", "user.name", "Seeder"]);
    std::fs::write(seed.join("README.md"), "seed\n").unwrap();
    git(&seed, &["add", "."]);
    git(&seed, &["commit", "-m", "Initial commit"]);
    git(&seed, &["push", remote.to_str().unwrap(), "HEAD:main"]);
    remote
}

pub fn test_config() -> AppConfig {
    AppConfig {
        git_users: vec![
            GitUserEntry {
                name: "Relay Bot".to_string(),
                email: "relay@example.com".to_string(),
                label: Some("Bot".to_string()),
                default: true,
            },
            GitUserEntry {
                name: "Second".to_string(),
                email: "second@example.com".to_string(),
                label: None,
                default: false,
            },
        ],
        ..AppConfig::default()
    }
}

pub fn settings(root: &Path, keep_temp: bool) -> RuntimeSettings {
    RuntimeSettings {
        repo_root: root.join("repos"),
        keep_temp,
        command_timeout: Some(Duration::from_secs(120)),
    }
}

pub fn pipeline(root: &Path) -> PatchPipeline {
    pipeline_with(root, false)
}

pub fn pipeline_with(root: &Path, keep_temp: bool) -> PatchPipeline {
    let settings = settings(root, keep_temp);
    let runner = Arc::new(TokioCommandRunner::with_timeout(settings.command_timeout));
    PatchPipeline::new(Arc::new(test_config()), settings, runner)
}

pub fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub async fn submit(pipeline: &PatchPipeline, pairs: &[(&str, &str)]) -> Outcome {
    pipeline
        .process_submission(&fields(pairs), &LogSink::new())
        .await
}

pub fn has_line(outcome: &Outcome, needle: &str) -> bool {
    outcome.log.iter().any(|line| line.contains(needle))
}

/// Command lines (`$ git ...`) whose text contains `needle`.
pub fn ran(outcome: &Outcome, needle: &str) -> bool {
    outcome
        .log
        .iter()
        .any(|line| line.contains("] $ git") && line.contains(needle))
}

pub fn dump(outcome: &Outcome) -> String {
    outcome.log.join("\n")
}
