#![allow(clippy::result_large_err)]

mod loader;

pub use loader::{parse_port, ConfigLoader, RuntimeSettings, ServerBind};
pub(crate) use loader::expand_home;

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Service configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// SSH keys a submission may select by index
    #[serde(default)]
    pub ssh_keys: Vec<SshKeyEntry>,

    /// Committer identities a submission may select by index
    #[serde(default)]
    pub git_users: Vec<GitUserEntry>,

    /// Listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Workspace cache and command execution settings
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// SSH key registry entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshKeyEntry {
    /// Private key path; `~` is expanded
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default)]
    pub default: bool,
}

/// Committer identity registry entry
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GitUserEntry {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub email: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default)]
    pub default: bool,
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,

    /// Accepts an integer or a numeric string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<PortValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortValue {
    Number(i64),
    Flag(bool),
    Text(String),
}

/// Runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RuntimeConfig {
    /// Root directory of the workspace cache
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_root: Option<PathBuf>,

    /// Keep per-run scratch directories for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_temp: Option<bool>,

    /// Per-command timeout; 0 disables it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_timeout_secs: Option<u64>,
}

/// Presentation-only view of the registries; key paths are never exposed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigSummary {
    pub ssh_keys: Vec<SshKeySummary>,
    pub git_users: Vec<GitUserSummary>,
    pub default_ssh_key_index: Option<usize>,
    pub default_git_user_index: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SshKeySummary {
    pub label: String,
    pub default: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitUserSummary {
    pub label: String,
    pub name: String,
    pub email: String,
    pub default: bool,
}

impl AppConfig {
    /// Resolve a `git_user` form selection. Blank means "no selection".
    pub fn select_git_user(&self, selection: &str) -> Result<Option<&GitUserEntry>, AppError> {
        select_entry(&self.git_users, selection, "git user").map(|entry| entry.map(|(_, e)| e))
    }

    /// Resolve an `ssh_key_path` form selection. Blank means "no selection".
    pub fn select_ssh_key(&self, selection: &str) -> Result<Option<&SshKeyEntry>, AppError> {
        select_entry(&self.ssh_keys, selection, "SSH key").map(|entry| entry.map(|(_, e)| e))
    }

    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            ssh_keys: self
                .ssh_keys
                .iter()
                .map(|entry| SshKeySummary {
                    label: display_label(entry.label.as_deref(), || {
                        if entry.path.is_empty() {
                            "Unknown Key".to_string()
                        } else {
                            entry.path.clone()
                        }
                    }),
                    default: entry.default,
                })
                .collect(),
            git_users: self
                .git_users
                .iter()
                .map(|entry| GitUserSummary {
                    label: display_label(entry.label.as_deref(), || {
                        let fallback = match (entry.name.is_empty(), entry.email.is_empty()) {
                            (false, false) => format!("{} <{}>", entry.name, entry.email),
                            (false, true) => entry.name.clone(),
                            (true, false) => format!("<{}>", entry.email),
                            (true, true) => String::new(),
                        };
                        if fallback.is_empty() {
                            "Unknown User".to_string()
                        } else {
                            fallback
                        }
                    }),
                    name: entry.name.clone(),
                    email: entry.email.clone(),
                    default: entry.default,
                })
                .collect(),
            default_ssh_key_index: self.ssh_keys.iter().position(|entry| entry.default),
            default_git_user_index: self.git_users.iter().position(|entry| entry.default),
        }
    }
}

fn select_entry<'a, T>(
    entries: &'a [T],
    selection: &str,
    what: &str,
) -> Result<Option<(usize, &'a T)>, AppError> {
    let selection = selection.trim();
    if selection.is_empty() {
        return Ok(None);
    }
    let invalid = || {
        AppError::new(
            ErrorCategory::SelectionError,
            format!(
                "{}: invalid selection '{}' ({} configured)",
                what,
                selection,
                entries.len()
            ),
        )
        .with_code("CFG-SEL-001")
    };
    let index: usize = selection.parse().map_err(|_| invalid())?;
    entries
        .get(index)
        .map(|entry| Some((index, entry)))
        .ok_or_else(invalid)
}

fn display_label(label: Option<&str>, fallback: impl FnOnce() -> String) -> String {
    match label {
        Some(label) if !label.trim().is_empty() => label.to_string(),
        _ => fallback(),
    }
}
