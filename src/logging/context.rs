use crate::cli::Command;

/// Execution contexts that influence how logging is routed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionContext {
    /// Long-running HTTP/WebSocket service.
    Service,
    /// One-shot commands whose stdout is the product (`submit`, `config`).
    OneShot,
}

impl ExecutionContext {
    /// Returns `true` when console sinks are off unless configured explicitly.
    pub fn quiet_by_default(self) -> bool {
        matches!(self, ExecutionContext::OneShot)
    }
}

/// Derive the active execution context from a parsed CLI command.
pub fn detect_context(command: &Command) -> ExecutionContext {
    match command {
        Command::Serve(_) => ExecutionContext::Service,
        Command::Submit(_) | Command::Config(_) => ExecutionContext::OneShot,
    }
}
