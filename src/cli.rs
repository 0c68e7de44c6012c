//! Top-level commands of the `parley` binary.
//!
//! Commands live in a static table rather than being discovered at runtime;
//! adding one means adding a row to [`COMMANDS`] and a variant to
//! [`CliCommand`].

use std::fmt;

use crate::chat::ChatConfig;
use crate::error::{Error, Result};
use crate::types::KnownModel;

/// A top-level command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliCommand {
    /// The interactive chat loop.
    Chat,
    /// Answer one question and exit.
    Ask,
    /// Inspect configuration.
    Config,
}

impl fmt::Display for CliCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CliCommand::Chat => "chat",
            CliCommand::Ask => "ask",
            CliCommand::Config => "config",
        };
        f.write_str(name)
    }
}

/// One row of the command table.
#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    pub usage: &'static str,
    pub summary: &'static str,
    pub command: CliCommand,
}

/// Every command the binary understands.
pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "chat",
        usage: "chat",
        summary: "Start an interactive chat (the default)",
        command: CliCommand::Chat,
    },
    CommandSpec {
        name: "ask",
        usage: "ask <question...>",
        summary: "Answer a single question and exit",
        command: CliCommand::Ask,
    },
    CommandSpec {
        name: "config",
        usage: "config list-prompt|list-model",
        summary: "Show available prompts or models",
        command: CliCommand::Config,
    },
];

/// The command used when none is named.
pub const DEFAULT_COMMAND: CliCommand = CliCommand::Chat;

/// Finds the command called `name`.
pub fn lookup(name: &str) -> Result<CliCommand> {
    COMMANDS
        .iter()
        .find(|entry| entry.name == name)
        .map(|entry| entry.command)
        .ok_or_else(|| {
            Error::validation(
                format!("unknown command {name:?}; try one of: chat, ask, config"),
                Some("command".to_string()),
            )
        })
}

/// Splits the free arguments into a command and its operands.
pub fn split_command(free: &[String]) -> Result<(CliCommand, &[String])> {
    match free.split_first() {
        Some((name, rest)) => Ok((lookup(name)?, rest)),
        None => Ok((DEFAULT_COMMAND, &[])),
    }
}

/// What `config` should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    ListPrompt,
    ListModel,
}

impl ConfigAction {
    pub fn parse(operands: &[String]) -> Result<Self> {
        match operands {
            [action] if action == "list-prompt" => Ok(ConfigAction::ListPrompt),
            [action] if action == "list-model" => Ok(ConfigAction::ListModel),
            _ => Err(Error::validation(
                "usage: parley config list-prompt|list-model",
                Some("config".to_string()),
            )),
        }
    }
}

/// One line per prompt: `name: first line of template`.
pub fn list_prompts(config: &ChatConfig) -> Vec<String> {
    config
        .prompts
        .iter()
        .map(|(name, template)| {
            let first = template.lines().next().unwrap_or_default();
            let marker = if name == config.default_prompt {
                " (default)"
            } else {
                ""
            };
            format!("{name}{marker}: {first}")
        })
        .collect()
}

/// One line per known model, marking the configured one.
pub fn list_models(config: &ChatConfig) -> Vec<String> {
    KnownModel::ALL
        .iter()
        .map(|model| {
            let name = model.as_str();
            if name == config.model.to_string() {
                format!("{name} (current)")
            } else {
                name.to_string()
            }
        })
        .collect()
}

/// The usage banner passed to the argument parser.
pub fn usage() -> String {
    let mut text = String::from("parley [OPTIONS] [COMMAND]\n\nCommands:\n");
    for entry in COMMANDS {
        text.push_str(&format!("  {:<32} {}\n", entry.usage, entry.summary));
    }
    text
}
