// Public modules
pub mod app;
pub mod chat;
pub mod cli;
pub mod client;
pub mod client_logger;
pub mod completion;
pub mod error;
pub mod prompts;
pub mod render;
pub mod sse;
pub mod types;
pub mod utils;

mod observability;

// Re-exports
pub use app::{App, SessionStats};
pub use chat::{
    ChatConfig, CompletionOrchestrator, Message, PlainTextRenderer, Renderer, Session,
    SessionManager,
};
pub use client::{OpenAi, is_valid_api_key};
pub use client_logger::{CompletionLogger, TracingLogger};
pub use completion::{
    Completion, CompletionOptions, CompletionService, Fragment, FragmentStream, ResponseMode,
};
pub use error::{EXIT_RATE_LIMITED, Error, Result};
pub use observability::register_biometrics;
pub use prompts::{PromptLibrary, PromptLookup};
pub use types::*;
