//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to manage sessions and settings without sending messages
//! to the API.

use crate::chat::config::parse_temperature;

/// A parsed chat command.
///
/// These commands control the chat and are not sent to the API.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Print the current session's history.
    History,

    /// List every session.
    Sessions,

    /// Make a session current, creating it if needed.
    Switch(String),

    /// Start a fresh session, replacing any with the same name.
    New {
        name: String,
        prompt: Option<String>,
    },

    /// Rename a session; `old` of `None` means the current one.
    Rename { old: Option<String>, new: String },

    /// Send full history (`true`) or only the latest question (`false`).
    Context(bool),

    /// Set or clear the current session's prompt template.
    Prompt(Option<String>),

    /// Change the model.
    Model(String),

    /// Set the sampling temperature.
    Temperature(f32),

    /// Toggle streaming.
    Stream(bool),

    /// Display session statistics.
    Stats,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it
/// should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use parley::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/switch work").is_some());
/// assert!(parse_command("Hello there!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let words = match split_command_line(rest) {
        Ok(words) => words,
        Err(err) => return Some(ChatCommand::Invalid(err)),
    };
    let Some((command, args)) = words.split_first() else {
        return Some(ChatCommand::Invalid("Empty command".to_string()));
    };
    let command = command.to_lowercase();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    let result = match (command.as_str(), args.as_slice()) {
        ("help" | "?", _) => ChatCommand::Help,
        ("quit" | "exit" | "q", _) => ChatCommand::Quit,
        ("hist" | "history", _) => ChatCommand::History,
        ("sessions" | "ls", _) => ChatCommand::Sessions,
        ("stats" | "status", _) => ChatCommand::Stats,
        ("switch", [name]) => ChatCommand::Switch(name.to_string()),
        ("switch", _) => ChatCommand::Invalid("/switch requires one session name".to_string()),
        ("new", [name]) => ChatCommand::New {
            name: name.to_string(),
            prompt: None,
        },
        ("new", [name, prompt]) => ChatCommand::New {
            name: name.to_string(),
            prompt: Some(prompt.to_string()),
        },
        ("new", _) => ChatCommand::Invalid("/new expects <name> [prompt]".to_string()),
        ("rename", [new]) => ChatCommand::Rename {
            old: None,
            new: new.to_string(),
        },
        ("rename", [old, new]) => ChatCommand::Rename {
            old: Some(old.to_string()),
            new: new.to_string(),
        },
        ("rename", _) => ChatCommand::Invalid("/rename expects [old] <new>".to_string()),
        ("context", [value]) => match parse_on_off(value) {
            Some(on) => ChatCommand::Context(on),
            None => ChatCommand::Invalid("/context expects 'on' or 'off'".to_string()),
        },
        ("context", _) => ChatCommand::Invalid("/context expects 'on' or 'off'".to_string()),
        ("prompt", []) => ChatCommand::Prompt(None),
        ("prompt", [name]) => ChatCommand::Prompt(Some(name.to_string())),
        ("prompt", _) => ChatCommand::Invalid("/prompt expects at most one name".to_string()),
        ("model", [model]) => ChatCommand::Model(model.to_string()),
        ("model", _) => ChatCommand::Invalid("/model requires a model name".to_string()),
        ("temperature", [value]) => match parse_temperature(value) {
            Ok(value) => ChatCommand::Temperature(value),
            Err(err) => ChatCommand::Invalid(format!("/temperature: {err}")),
        },
        ("temperature", _) => ChatCommand::Invalid("/temperature requires a value".to_string()),
        ("stream", [value]) => match parse_on_off(value) {
            Some(on) => ChatCommand::Stream(on),
            None => ChatCommand::Invalid("/stream expects 'on' or 'off'".to_string()),
        },
        ("stream", _) => ChatCommand::Invalid("/stream expects 'on' or 'off'".to_string()),
        _ => ChatCommand::Invalid(format!("Unknown command: /{command}")),
    };

    Some(result)
}

fn parse_on_off(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "yes" => Some(true),
        "off" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Splits a line into words the way a POSIX shell would.
///
/// Words are separated by whitespace. Single quotes keep everything literal,
/// double quotes allow backslash escapes, and a backslash outside quotes
/// escapes the next character. An unterminated quote or trailing backslash
/// is an error.
pub fn split_command_line(line: &str) -> Result<Vec<String>, String> {
    #[derive(Clone, Copy, PartialEq)]
    enum Quote {
        None,
        Single,
        Double,
    }

    let mut words = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut quote = Quote::None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Quote::Single, '\'') => quote = Quote::None,
            (Quote::Single, c) => word.push(c),
            (Quote::Double, '"') => quote = Quote::None,
            (Quote::Double, '\\') => match chars.next() {
                Some(next @ ('"' | '\\' | '$' | '`')) => word.push(next),
                Some(next) => {
                    word.push('\\');
                    word.push(next);
                }
                None => return Err("unterminated double quote".to_string()),
            },
            (Quote::Double, c) => word.push(c),
            (Quote::None, '\'') => {
                quote = Quote::Single;
                in_word = true;
            }
            (Quote::None, '"') => {
                quote = Quote::Double;
                in_word = true;
            }
            (Quote::None, '\\') => match chars.next() {
                Some(next) => {
                    word.push(next);
                    in_word = true;
                }
                None => return Err("trailing backslash".to_string()),
            },
            (Quote::None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut word));
                    in_word = false;
                }
            }
            (Quote::None, c) => {
                word.push(c);
                in_word = true;
            }
        }
    }

    match quote {
        Quote::Single => Err("unterminated single quote".to_string()),
        Quote::Double => Err("unterminated double quote".to_string()),
        Quote::None => {
            if in_word {
                words.push(word);
            }
            Ok(words)
        }
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /sessions              List sessions
  /switch <name>         Switch to a session (created if missing)
  /new <name> [prompt]   Start a fresh session, replacing one with that name
  /rename [old] <new>    Rename a session (default: the current one)
  /hist                  Show the current session's history
  /context on|off        Send full history or only the latest question
  /prompt [name]         Set the prompt template (no argument clears it)
  /model <name>          Change the model (e.g., /model gpt-4o)
  /temperature <v>       Set temperature 0.0-2.0
  /stream on|off         Stream answers as they arrive
  /stats                 Show session statistics
  /help                  Show this help message
  /quit                  Exit the chat"#
}
