//! Interactive chat: sessions, their registry and the turn state machine.
//!
//! # Architecture
//!
//! The module is organized into several components:
//!
//! - [`message`]: one recorded turn
//! - [`session`]: a named conversation and its query view
//! - [`manager`]: the registry of sessions and the current-session pointer
//! - [`orchestrator`]: drives a question through the completion service
//! - [`config`]: CLI argument parsing and configuration
//! - [`commands`]: slash command parsing

mod commands;
mod config;
mod manager;
mod message;
mod orchestrator;
mod session;

pub use crate::render::{PlainTextRenderer, Renderer, describe_session, prompt_label};
pub use commands::{ChatCommand, help_text, parse_command, split_command_line};
pub use config::{
    ChatArgs, ChatConfig, ConfigFile, DEFAULT_TEMPERATURE, MAX_TEMPERATURE, config_dir,
    config_path, history_path, onboard_api_key, parse_temperature,
};
pub use manager::{DEFAULT_SESSION_NAME, SessionDefaults, SessionManager};
pub use message::Message;
pub use orchestrator::{CompletionOrchestrator, TurnState};
pub use session::{Session, SessionId};
