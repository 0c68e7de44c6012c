//! Logging hook for completion traffic.
//!
//! The [`CompletionLogger`] trait lets callers capture every exchange that
//! passes through the [`CompletionOrchestrator`](crate::CompletionOrchestrator):
//! the outgoing query view, each streamed fragment, and the final answer.

use crate::types::QueryMessage;

/// A trait for logging completion exchanges.
///
/// # Example
///
/// ```rust,ignore
/// use parley::{CompletionLogger, QueryMessage};
/// use std::sync::Mutex;
///
/// struct TranscriptLogger {
///     lines: Mutex<Vec<String>>,
/// }
///
/// impl CompletionLogger for TranscriptLogger {
///     fn log_request(&self, session: &str, payload: &[QueryMessage]) {
///         let mut lines = self.lines.lock().unwrap();
///         lines.push(format!("{session}: {} messages", payload.len()));
///     }
///
///     fn log_fragment(&self, _session: &str, _fragment: &str) {}
///
///     fn log_answer(&self, session: &str, answer: &str) {
///         self.lines.lock().unwrap().push(format!("{session}: {answer}"));
///     }
/// }
/// ```
pub trait CompletionLogger: Send + Sync {
    /// Called once per turn with the exact payload sent to the service.
    fn log_request(&self, session: &str, payload: &[QueryMessage]);

    /// Called for every non-empty streamed fragment, in order.
    fn log_fragment(&self, session: &str, fragment: &str);

    /// Called once a turn completes with the full answer text.
    fn log_answer(&self, session: &str, answer: &str);
}

/// Sends every exchange to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl CompletionLogger for TracingLogger {
    fn log_request(&self, session: &str, payload: &[QueryMessage]) {
        match serde_json::to_string(payload) {
            Ok(json) => tracing::debug!(session = %session, payload = %json, "completion request"),
            Err(err) => tracing::debug!(session = %session, error = %err, "unserializable request"),
        }
    }

    fn log_fragment(&self, session: &str, fragment: &str) {
        tracing::trace!(session = %session, fragment = %fragment, "completion fragment");
    }

    fn log_answer(&self, session: &str, answer: &str) {
        tracing::debug!(session = %session, chars = answer.chars().count(), "completion answer");
    }
}
