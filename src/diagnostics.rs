use std::sync::{Mutex, PoisonError};

use tracing::warn;

use crate::error::ParseFailure;
use crate::parser::State;

/// One recoverable failure while extracting quotes from a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub post: String,
    pub state: State,
    pub failure: ParseFailure,
    /// The block's lines at the moment of failure, when there was a block.
    pub snapshot: Option<Vec<String>>,
}

impl Diagnostic {
    pub fn new(post: &str, state: State, failure: ParseFailure) -> Self {
        Diagnostic {
            post: post.to_string(),
            state,
            failure,
            snapshot: None,
        }
    }

    pub fn with_snapshot(mut self, lines: Vec<String>) -> Self {
        self.snapshot = Some(lines);
        self
    }
}

pub trait DiagnosticsSink: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

/// Logs every diagnostic as a `warn` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn report(&self, d: Diagnostic) {
        match &d.snapshot {
            Some(lines) => warn!(post = %d.post, state = %d.state, lines = ?lines, "{}", d.failure),
            None => warn!(post = %d.post, state = %d.state, "{}", d.failure),
        }
    }
}

/// Keeps diagnostics in memory so a batch driver can order, count or
/// replay them once parallel work is done.
#[derive(Debug, Default)]
pub struct CollectingSink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        CollectingSink::default()
    }

    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.entries.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl DiagnosticsSink for CollectingSink {
    fn report(&self, diagnostic: Diagnostic) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diagnostic);
    }
}
