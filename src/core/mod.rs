pub mod command;
pub mod config;
pub mod error;
pub mod git;
pub mod logger;
pub mod pipeline;
pub mod types;
pub mod workspace;

pub use command::{CommandOutput, CommandRequest, CommandRunner, TokioCommandRunner};
pub use config::{AppConfig, ConfigLoader, ConfigSummary, RuntimeSettings};
pub use error::AppError;
pub use logger::LogSink;
pub use pipeline::{Outcome, PatchPipeline, RunFailure, Submission};
pub use types::*;
pub use workspace::{workspace_identity, Workspace, WorkspaceCache};
