#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::logger::LogSink;
use crate::core::types::{BranchMode, ErrorCategory};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Flatten a JSON form payload into string fields.
///
/// `null` becomes empty, booleans become `true`/`false`, everything else uses
/// its JSON text.
pub fn fields_from_json(payload: &Map<String, Value>) -> HashMap<String, String> {
    payload
        .iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(text) => text.clone(),
                Value::Null => String::new(),
                Value::Bool(flag) => flag.to_string(),
                other => other.to_string(),
            };
            (key.clone(), text)
        })
        .collect()
}

/// Normalized submission fields, echoed back to the caller with every outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormValues {
    pub repository_url: String,
    pub branch: String,
    pub new_branch: String,
    pub commit_message: String,
    /// `"true"` or empty.
    pub allow_empty_commit: String,
    pub git_user_selection: String,
    pub ssh_key_selection: String,
    pub branch_mode: String,
    pub base_commit: String,
}

/// One normalized change request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submission {
    pub repository_url: String,
    pub branch: String,
    pub new_branch: String,
    /// Raw mode text; blank input is stored as `default`.
    pub branch_mode: String,
    pub base_commit: String,
    pub commit_message: String,
    pub allow_empty_commit: bool,
    pub patch: String,
    pub git_user: String,
    pub ssh_key: String,
}

impl Submission {
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        let trimmed = |key: &str| {
            fields
                .get(key)
                .map(|value| value.trim().to_string())
                .unwrap_or_default()
        };
        let raw = |key: &str| {
            fields
                .get(key)
                .map(|value| value.replace("\r\n", "\n"))
                .unwrap_or_default()
        };

        let branch_mode = trimmed("branch_mode");
        Self {
            repository_url: trimmed("repository_url"),
            branch: trimmed("branch"),
            new_branch: trimmed("new_branch"),
            branch_mode: if branch_mode.is_empty() {
                BranchMode::Default.as_str().to_string()
            } else {
                branch_mode
            },
            base_commit: trimmed("base_commit"),
            commit_message: raw("commit_message").trim_matches('\n').to_string(),
            allow_empty_commit: fields.get("allow_empty_commit").map(String::as_str) == Some("true"),
            patch: raw("patch"),
            git_user: trimmed("git_user"),
            ssh_key: trimmed("ssh_key_path"),
        }
    }

    pub fn mode(&self) -> Result<BranchMode, AppError> {
        self.branch_mode.parse::<BranchMode>().map_err(|_| {
            declined(format!("Unsupported branch mode '{}'.", self.branch_mode)).with_code("SUB-004")
        })
    }

    pub fn has_patch(&self) -> bool {
        !self.patch.trim().is_empty()
    }

    /// Base commit text means "current tip of the default branch".
    pub fn base_is_tip(&self) -> bool {
        self.base_commit.is_empty() || self.base_commit.eq_ignore_ascii_case("HEAD")
    }

    /// Drop the fields a branch-only run never uses, returning the names of
    /// those that carried a value.
    pub fn discard_commit_fields(&mut self) -> Vec<&'static str> {
        let mut ignored = Vec::new();
        if self.has_patch() {
            ignored.push("patch");
        }
        if !self.commit_message.is_empty() {
            ignored.push("commit_message");
        }
        if self.allow_empty_commit {
            ignored.push("allow_empty_commit");
        }
        self.patch.clear();
        self.commit_message.clear();
        self.allow_empty_commit = false;
        ignored
    }

    /// Reject incomplete submissions before any workspace is touched.
    pub fn validate(&self, mode: BranchMode) -> Result<(), AppError> {
        if self.repository_url.is_empty() {
            return Err(declined("Repository URL is required.").with_code("SUB-001"));
        }
        if mode != BranchMode::FromCommit && !self.has_patch() && !self.allow_empty_commit {
            return Err(
                declined("Patch content is required unless empty commit is allowed.")
                    .with_code("SUB-002"),
            );
        }
        if mode.creates_branch() && self.new_branch.is_empty() {
            return Err(declined(
                "New branch name is required for commit/orphan branch creation modes.",
            )
            .with_code("SUB-003"));
        }
        Ok(())
    }

    /// Branch the final push targets when it is known up front.
    pub fn target_branch(&self, mode: BranchMode) -> Option<&str> {
        let name = if mode.creates_branch() {
            &self.new_branch
        } else {
            &self.branch
        };
        (!name.is_empty()).then_some(name.as_str())
    }

    pub fn form_values(&self) -> FormValues {
        FormValues {
            repository_url: self.repository_url.clone(),
            branch: self.branch.clone(),
            new_branch: self.new_branch.clone(),
            commit_message: self.commit_message.clone(),
            allow_empty_commit: if self.allow_empty_commit {
                "true".to_string()
            } else {
                String::new()
            },
            git_user_selection: self.git_user.clone(),
            ssh_key_selection: self.ssh_key.clone(),
            branch_mode: self.branch_mode.clone(),
            base_commit: self.base_commit.clone(),
        }
    }

    pub fn log_parsed(&self, logs: &LogSink) {
        let or = |value: &str, placeholder: &str| {
            if value.is_empty() {
                placeholder.to_string()
            } else {
                value.to_string()
            }
        };
        logs.debug(&format!("Parsed repository_url='{}'.", self.repository_url));
        logs.debug(&format!("Parsed branch='{}'.", or(&self.branch, "(default)")));
        logs.debug(&format!("Parsed new_branch='{}'.", or(&self.new_branch, "(none)")));
        logs.debug(&format!("Parsed branch_mode='{}'.", self.branch_mode));
        logs.debug(&format!("Parsed base_commit='{}'.", or(&self.base_commit, "(none)")));
        logs.debug(&format!("Parsed git_user selection='{}'.", or(&self.git_user, "(none)")));
        logs.debug(&format!("Parsed ssh_key selection='{}'.", or(&self.ssh_key, "(none)")));
        logs.debug(&format!("Commit message length={}.", self.commit_message.chars().count()));
        logs.debug(&format!("Allow empty commit={}.", self.allow_empty_commit));
        logs.debug(&format!("Patch length={}.", self.patch.chars().count()));
    }
}

fn declined(message: impl Into<String>) -> AppError {
    AppError::new(ErrorCategory::ValidationError, message)
}
