//! The completion-service contract.
//!
//! The orchestrator never talks HTTP directly. It hands a query view and a set
//! of options to a [`CompletionService`] and receives either the whole answer
//! or a [`FragmentStream`] of incremental text.

use std::fmt;
use std::pin::Pin;

use futures::Stream;

use crate::error::Result;
use crate::types::{Model, QueryMessage};

/// A lazy, finite, forward-only sequence of answer fragments.
///
/// The stream ends after the last fragment or after the first error; it
/// cannot be restarted.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Fragment>> + Send>>;

/// One increment of a streamed answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    /// The text to append, or `None` for a heartbeat.
    pub text: Option<String>,
}

impl Fragment {
    /// A fragment carrying text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    /// A fragment carrying nothing.
    pub fn heartbeat() -> Self {
        Self { text: None }
    }

    /// True when the fragment carries no text.
    pub fn is_heartbeat(&self) -> bool {
        self.text.is_none()
    }
}

/// How the caller wants the answer delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// One complete answer.
    SingleShot,
    /// Incremental fragments.
    Stream,
}

impl ResponseMode {
    /// Picks a mode from a streaming flag.
    pub fn from_streaming(streaming: bool) -> Self {
        if streaming {
            ResponseMode::Stream
        } else {
            ResponseMode::SingleShot
        }
    }

    /// True for [`ResponseMode::Stream`].
    pub fn is_stream(&self) -> bool {
        matches!(self, ResponseMode::Stream)
    }
}

/// Per-request knobs forwarded to the service.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    /// The model to ask.
    pub model: Model,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Streamed or single-shot delivery.
    pub mode: ResponseMode,
}

impl CompletionOptions {
    /// Creates options for `model` with no temperature.
    pub fn new(model: Model, mode: ResponseMode) -> Self {
        Self {
            model,
            temperature: None,
            mode,
        }
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }
}

/// What a completion service hands back.
pub enum Completion {
    /// The whole answer at once.
    Full(String),
    /// The answer as it is generated.
    Stream(FragmentStream),
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completion::Full(text) => f.debug_tuple("Full").field(text).finish(),
            Completion::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// A chat-completion backend.
///
/// Implementations report an HTTP 429 or equivalent as
/// [`Error::RateLimit`](crate::Error::RateLimit) and never retry on their own.
#[async_trait::async_trait]
pub trait CompletionService: Send + Sync {
    /// Completes `payload`, honoring `options.mode`.
    async fn complete(
        &self,
        payload: Vec<QueryMessage>,
        options: &CompletionOptions,
    ) -> Result<Completion>;
}

#[async_trait::async_trait]
impl<S: CompletionService + ?Sized> CompletionService for std::sync::Arc<S> {
    async fn complete(
        &self,
        payload: Vec<QueryMessage>,
        options: &CompletionOptions,
    ) -> Result<Completion> {
        (**self).complete(payload, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_fragment() {
        assert!(Fragment::heartbeat().is_heartbeat());
        assert!(!Fragment::text("x").is_heartbeat());
    }

    #[test]
    fn response_mode_from_flag() {
        assert_eq!(ResponseMode::from_streaming(true), ResponseMode::Stream);
        assert_eq!(ResponseMode::from_streaming(false), ResponseMode::SingleShot);
        assert!(ResponseMode::Stream.is_stream());
    }

    #[test]
    fn completion_debug_hides_stream() {
        let stream: FragmentStream = Box::pin(futures::stream::empty());
        assert_eq!(format!("{:?}", Completion::Stream(stream)), "Stream(..)");
        assert_eq!(
            format!("{:?}", Completion::Full("hi".to_string())),
            "Full(\"hi\")"
        );
    }
}
