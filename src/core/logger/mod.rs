//! Per-run progress log.
//!
//! A [`LogSink`] keeps the authoritative ordered record of a run in memory and
//! optionally forwards every line to an attached observer channel. Forwarding
//! never blocks and never fails the caller: a dropped receiver just means
//! nobody is watching anymore.

use chrono::Utc;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;

const DEBUG_PREFIX: &str = "DEBUG: ";

/// Format a message with the UTC timestamp prefix used in every log line.
pub fn timestamped(message: &str) -> String {
    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S");
    format!("[{} UTC] {}", timestamp, message)
}

#[derive(Clone, Default)]
pub struct LogSink {
    entries: Arc<Mutex<Vec<String>>>,
    observer: Option<UnboundedSender<String>>,
    run_id: Option<String>,
}

impl LogSink {
    /// Sink that only buffers locally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that buffers locally and forwards every line to `observer`.
    pub fn with_observer(observer: UnboundedSender<String>) -> Self {
        Self {
            observer: Some(observer),
            ..Self::default()
        }
    }

    /// Tag tracing events emitted for this sink with a run id.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Append a user-facing narrative line.
    pub fn append(&self, message: &str) {
        self.push(timestamped(message));
    }

    /// Append a debug line; shares the same ordered stream as narrative lines.
    pub fn debug(&self, message: &str) {
        self.push(timestamped(&format!("{}{}", DEBUG_PREFIX, message)));
    }

    fn push(&self, line: String) {
        tracing::debug!(
            run_id = self.run_id.as_deref().unwrap_or("-"),
            "{}",
            line
        );
        if let Some(observer) = &self.observer {
            // Closed receivers are ignored.
            let _ = observer.send(line.clone());
        }
        match self.entries.lock() {
            Ok(mut entries) => entries.push(line),
            Err(poisoned) => poisoned.into_inner().push(line),
        }
    }

    /// Copy of every line appended so far, in append order.
    pub fn lines(&self) -> Vec<String> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self.entries.lock() {
            Ok(entries) => entries.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink")
            .field("lines", &self.len())
            .field("observed", &self.observer.is_some())
            .finish()
    }
}
