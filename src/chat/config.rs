//! Configuration types for the chat application.
//!
//! Settings come from three places, highest priority first: command-line
//! arguments parsed with `arrrg`, a YAML config file, and built-in defaults.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use arrrg_derive::CommandLine;
use serde::{Deserialize, Serialize};

use crate::chat::manager::SessionDefaults;
use crate::client::{API_KEY_ENV, is_valid_api_key};
use crate::completion::{CompletionOptions, ResponseMode};
use crate::error::{Error, Result};
use crate::prompts::PromptLibrary;
use crate::types::Model;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 1.0;
/// Highest temperature the API accepts.
pub const MAX_TEMPERATURE: f32 = 2.0;

const CONFIG_DIR_NAME: &str = "parley";
const CONFIG_FILE_NAME: &str = "config.yaml";
const HISTORY_FILE_NAME: &str = "cli_history";
const API_KEY_URL: &str = "https://platform.openai.com/account/api-keys";

/// Command-line arguments for parley.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: gpt-3.5-turbo)", "MODEL")]
    pub model: Option<String>,

    /// Sampling temperature, kept as text until validated.
    #[arrrg(optional, "Sampling temperature between 0 and 2 (default: 1.0)", "TEMP")]
    pub temperature: Option<String>,

    /// Prompt template applied to new sessions.
    #[arrrg(optional, "Prompt template for new sessions", "PROMPT")]
    pub prompt: Option<String>,

    /// System message seeded into new sessions.
    #[arrrg(optional, "System message for new sessions", "TEXT")]
    pub system: Option<String>,

    /// Send only the latest question upstream.
    #[arrrg(flag, "Start sessions without conversation context")]
    pub contextless: bool,

    /// Wait for whole answers instead of streaming.
    #[arrrg(flag, "Disable streaming responses")]
    pub no_stream: bool,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Path of the YAML config file.
    #[arrrg(optional, "Config file (default: <config dir>/parley/config.yaml)", "PATH")]
    pub config: Option<String>,

    /// Log debug diagnostics to stderr.
    #[arrrg(flag, "Enable debug logging")]
    pub verbose: bool,
}

/// The on-disk YAML config file.
///
/// Every field is optional; a missing file is the same as an empty one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// API key; falls back to the environment when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Endpoint of an OpenAI-compatible server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    /// Prompt template applied to new sessions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_contextless: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Additional or overriding prompt templates.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub prompts: BTreeMap<String, String>,
}

impl ConfigFile {
    /// The default location of the config file, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
    }

    /// Loads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file; using defaults");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(Error::config(format!(
                    "cannot read {}: {err}",
                    path.display()
                )));
            }
        };
        Self::parse(&text)
            .map_err(|err| Error::config(format!("invalid config {}: {err}", path.display())))
    }

    /// Writes this file to `path` as YAML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                Error::config(format!("cannot create {}: {err}", parent.display()))
            })?;
        }
        let text = serde_yaml::to_string(self)?;
        fs::write(path, text)
            .map_err(|err| Error::config(format!("cannot write {}: {err}", path.display())))
    }

    /// Records `api_key` in the file at `path`, keeping its other settings.
    pub fn store_api_key(path: &Path, api_key: &str) -> Result<Self> {
        let mut file = Self::load(path)?;
        file.api_key = Some(api_key.to_string());
        file.save(path)?;
        tracing::debug!(path = %path.display(), "stored API key");
        Ok(file)
    }

    /// Parses YAML text. Empty text yields the defaults.
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }
}

/// `<config dir>/parley`, if the platform has a config dir.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME))
}

/// Where the line editor keeps its history.
pub fn history_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(HISTORY_FILE_NAME))
}

/// The config file `args` names, or the default one.
pub fn config_path(args: &ChatArgs) -> Option<PathBuf> {
    match &args.config {
        Some(path) => Some(PathBuf::from(path)),
        None => ConfigFile::default_path(),
    }
}

/// Asks for an API key until a well-formed one is entered, then stores it in
/// the config file at `path`.
///
/// `read_key` supplies each attempt; its errors (such as
/// [`Error::Interrupted`]) abort without touching the file. `notify` receives
/// the instructions and outcome lines.
pub fn onboard_api_key(
    path: &Path,
    mut read_key: impl FnMut() -> Result<String>,
    mut notify: impl FnMut(&str),
) -> Result<String> {
    notify(&format!(
        "Please input your OpenAI API key. You can get it from {API_KEY_URL}"
    ));
    let key = loop {
        let attempt = read_key()?;
        let attempt = attempt.trim();
        if is_valid_api_key(attempt) {
            break attempt.to_string();
        }
        notify("Invalid OpenAI API key");
    };
    ConfigFile::store_api_key(path, &key)?;
    notify(&format!("Config file created at {}", path.display()));
    Ok(key)
}

/// Parses and range-checks a temperature.
pub fn parse_temperature(text: &str) -> Result<f32> {
    let value: f32 = text.trim().parse().map_err(|_| {
        Error::validation(
            format!("temperature must be a number, got {text:?}"),
            Some("temperature".to_string()),
        )
    })?;
    check_temperature(value)
}

fn check_temperature(value: f32) -> Result<f32> {
    if (0.0..=MAX_TEMPERATURE).contains(&value) {
        Ok(value)
    } else {
        Err(Error::validation(
            format!("temperature must be between 0 and {MAX_TEMPERATURE}, got {value}"),
            Some("temperature".to_string()),
        ))
    }
}

/// Configuration for a chat process.
///
/// This struct holds the resolved configuration values after merging
/// command-line arguments, the config file and defaults.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// The model to use for generating responses.
    pub model: Model,

    /// Sampling temperature.
    pub temperature: f32,

    /// API key, when configured rather than taken from the environment.
    pub api_key: Option<String>,

    /// Custom endpoint.
    pub base_url: Option<String>,

    /// Prompt template applied to new sessions; empty for none.
    pub default_prompt: String,

    /// Whether new sessions start contextless.
    pub contextless: bool,

    /// Optional system message seeded into new sessions.
    pub system_prompt: Option<String>,

    /// Known prompt templates.
    pub prompts: PromptLibrary,

    /// Whether answers are streamed.
    pub streaming: bool,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Whether debug logging is on.
    pub verbose: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Model: gpt-3.5-turbo
    /// - Temperature: 1.0
    /// - No default prompt, full context
    /// - Streaming and color enabled
    pub fn new() -> Self {
        Self {
            model: Model::default(),
            temperature: DEFAULT_TEMPERATURE,
            api_key: None,
            base_url: None,
            default_prompt: String::new(),
            contextless: false,
            system_prompt: None,
            prompts: PromptLibrary::with_builtins(),
            streaming: true,
            use_color: true,
            verbose: false,
        }
    }

    /// Reads the config file named by `args` (or the default one) and merges.
    pub fn load(args: &ChatArgs) -> Result<Self> {
        let file = match config_path(args) {
            Some(path) => ConfigFile::load(&path)?,
            None => ConfigFile::default(),
        };
        Self::resolve(args, file)
    }

    /// Merges `args` over `file` over the defaults.
    pub fn resolve(args: &ChatArgs, file: ConfigFile) -> Result<Self> {
        let defaults = Self::new();

        let model = args
            .model
            .as_deref()
            .or(file.model.as_deref())
            .map(Model::from)
            .unwrap_or(defaults.model);

        let temperature = match (&args.temperature, file.temperature) {
            (Some(text), _) => parse_temperature(text)?,
            (None, Some(value)) => check_temperature(value)?,
            (None, None) => defaults.temperature,
        };

        let mut prompts = defaults.prompts;
        prompts.extend(file.prompts);

        Ok(ChatConfig {
            model,
            temperature,
            api_key: file.api_key,
            base_url: file.base_url,
            default_prompt: args
                .prompt
                .clone()
                .or(file.default_prompt)
                .unwrap_or_default(),
            contextless: args.contextless || file.default_contextless.unwrap_or(false),
            system_prompt: args.system.clone().or(file.system_prompt),
            prompts,
            streaming: !args.no_stream,
            use_color: !args.no_color,
            verbose: args.verbose,
        })
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: Model) -> Self {
        self.model = model;
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the prompt template for new sessions.
    pub fn with_default_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.default_prompt = prompt.into();
        self
    }

    /// Starts new sessions contextless.
    pub fn with_contextless(mut self, contextless: bool) -> Self {
        self.contextless = contextless;
        self
    }

    /// Sets the system prompt.
    pub fn with_system_prompt(mut self, prompt: String) -> Self {
        self.system_prompt = Some(prompt);
        self
    }

    /// Adds or replaces a prompt template.
    pub fn with_prompt(mut self, name: impl Into<String>, template: impl Into<String>) -> Self {
        self.prompts.insert(name, template);
        self
    }

    /// Sets whether answers are streamed.
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Settings for sessions the manager creates.
    pub fn session_defaults(&self) -> SessionDefaults {
        SessionDefaults {
            prompt_name: self.default_prompt.clone(),
            contextless: self.contextless,
            system_prompt: self.system_prompt.clone(),
        }
    }

    /// True when neither the config nor the environment supplies an API key.
    pub fn needs_api_key(&self) -> bool {
        self.api_key.is_none() && std::env::var_os(API_KEY_ENV).is_none()
    }

    /// Request options for the completion service.
    pub fn completion_options(&self) -> CompletionOptions {
        CompletionOptions::new(
            self.model.clone(),
            ResponseMode::from_streaming(self.streaming),
        )
        .with_temperature(Some(self.temperature))
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}
