#![allow(clippy::result_large_err)]

use super::{AppConfig, PortValue};
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_REPO_ROOT: &str = "repos";
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 600;

/// Settings the pipeline needs at run time, after env overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub repo_root: PathBuf,
    pub keep_temp: bool,
    pub command_timeout: Option<Duration>,
}

/// Resolved listener address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerBind {
    pub bind: String,
    pub port: u16,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Path of the config file: explicit override, then PATCHRELAY_CONFIG, then config.toml
    pub fn config_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        env::var("PATCHRELAY_CONFIG")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Load config from a file path
    /// A missing file yields empty registries and defaults
    pub fn load(path: &Path) -> Result<AppConfig, AppError> {
        Ok(Self::load_from_file(path)?.unwrap_or_default())
    }

    /// Returns Ok(None) if file doesn't exist
    pub fn load_from_file(path: &Path) -> Result<Option<AppConfig>, AppError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to read config file {}: {}", path.display(), e),
            )
        })?;

        Self::parse(&content).map(Some).map_err(|mut err| {
            err.message = format!(
                "Failed to parse configuration file {}: {}",
                path.display(),
                err.message
            );
            err
        })
    }

    pub fn parse(content: &str) -> Result<AppConfig, AppError> {
        toml::from_str(content).map_err(|e| {
            AppError::new(ErrorCategory::ConfigError, e.to_string()).with_code("CFG-001")
        })
    }

    /// Runtime settings with precedence: env, then file, then defaults
    pub fn runtime_settings(config: &AppConfig) -> Result<RuntimeSettings, AppError> {
        let repo_root = env::var("PATCHRELAY_REPO_ROOT")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| config.runtime.repo_root.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_REPO_ROOT));

        let keep_temp = match env::var("PATCHRELAY_KEEP_TEMP") {
            Ok(value) if !value.trim().is_empty() => is_truthy(&value),
            _ => config.runtime.keep_temp.unwrap_or(false),
        };

        let timeout_secs = match env::var("PATCHRELAY_COMMAND_TIMEOUT_SECS") {
            Ok(value) if !value.trim().is_empty() => value.trim().parse::<u64>().map_err(|_| {
                AppError::new(
                    ErrorCategory::ConfigError,
                    format!(
                        "PATCHRELAY_COMMAND_TIMEOUT_SECS must be a non-negative integer, got {:?}",
                        value
                    ),
                )
                .with_code("CFG-003")
            })?,
            _ => config
                .runtime
                .command_timeout_secs
                .unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS),
        };

        Ok(RuntimeSettings {
            repo_root: expand_home(&repo_root),
            keep_temp,
            command_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        })
    }

    /// Listener address with precedence: CLI flag, env, file, default
    pub fn server_bind(
        config: &AppConfig,
        bind_override: Option<&str>,
        port_override: Option<u16>,
    ) -> Result<ServerBind, AppError> {
        let env_bind = env::var("PATCHRELAY_BIND").unwrap_or_default();
        let env_port = env::var("PATCHRELAY_PORT").unwrap_or_default();

        let bind = bind_override
            .map(str::to_string)
            .filter(|value| !value.trim().is_empty())
            .or_else(|| Some(env_bind.trim().to_string()).filter(|value| !value.is_empty()))
            .or_else(|| config.server.bind.clone())
            .unwrap_or_else(|| DEFAULT_BIND.to_string());

        let port = match port_override {
            Some(port) => parse_port(&PortValue::Number(i64::from(port)))?,
            None if !env_port.trim().is_empty() => {
                parse_port(&PortValue::Text(env_port.trim().to_string()))?
            }
            None => match &config.server.port {
                Some(value) => parse_port(value)?,
                None => DEFAULT_PORT,
            },
        };

        Ok(ServerBind { bind, port })
    }

    /// Get documentation for supported environment variables
    pub fn env_var_documentation() -> &'static [&'static str] {
        &[
            "PATCHRELAY_CONFIG - Path of the TOML config file (default: config.toml)",
            "PATCHRELAY_REPO_ROOT - Root directory of the workspace cache (default: repos)",
            "PATCHRELAY_KEEP_TEMP - Keep per-run scratch directories (1/true/yes/on)",
            "PATCHRELAY_BIND - Listener bind address (default: 0.0.0.0)",
            "PATCHRELAY_PORT - Listener port (default: 8080)",
            "PATCHRELAY_COMMAND_TIMEOUT_SECS - Per-command timeout, 0 disables (default: 600)",
        ]
    }
}

/// Validate a port value from config, env, or CLI.
pub fn parse_port(value: &PortValue) -> Result<u16, AppError> {
    let out_of_range = || {
        AppError::new(
            ErrorCategory::ConfigError,
            "Server port must be an integer between 1 and 65535",
        )
        .with_code("CFG-002")
    };
    let port = match value {
        PortValue::Flag(_) => return Err(out_of_range()),
        PortValue::Number(number) => *number,
        PortValue::Text(text) if text.trim().is_empty() => return Err(out_of_range()),
        PortValue::Text(text) => text.trim().parse::<i64>().map_err(|_| {
            AppError::new(
                ErrorCategory::ConfigError,
                format!("Server port must be an integer, got {:?}", text),
            )
            .with_code("CFG-002")
        })?,
    };
    if !(1..=65535).contains(&port) {
        return Err(out_of_range());
    }
    u16::try_from(port).map_err(|_| out_of_range())
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

pub(crate) fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs_next::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}
