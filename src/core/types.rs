use serde::{Deserialize, Serialize};

/// Error category enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    ValidationError,
    SelectionError,
    CommandError,
    ResolutionError,
    TimeoutError,
    IoError,
    ConfigError,
    InternalError,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Error severity enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Error,
    Warning,
}

/// How the target branch of a submission is prepared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BranchMode {
    /// Check out the requested branch (or the remote default) and commit on top.
    #[default]
    Default,
    /// Create and push a new branch from a base commit; nothing else.
    FromCommit,
    /// Create a history-less branch with an empty tree, then commit on it.
    Orphan,
}

impl BranchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BranchMode::Default => "default",
            BranchMode::FromCommit => "from_commit",
            BranchMode::Orphan => "orphan",
        }
    }

    /// Modes whose target is `new_branch` rather than `branch`.
    pub fn creates_branch(&self) -> bool {
        matches!(self, BranchMode::FromCommit | BranchMode::Orphan)
    }
}

impl std::str::FromStr for BranchMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "" | "default" => Ok(BranchMode::Default),
            "from_commit" => Ok(BranchMode::FromCommit),
            "orphan" => Ok(BranchMode::Orphan),
            other => Err(format!(
                "unknown branch mode '{}'; supported values are default, from_commit, orphan",
                other
            )),
        }
    }
}

impl std::fmt::Display for BranchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
