//! The application context.
//!
//! [`App`] bundles the resolved configuration, the prompt library, the session
//! registry and the orchestrator. It is built once at startup and handed to
//! whichever command runs; nothing in parley is process-global.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::chat::{
    ChatCommand, ChatConfig, CompletionOrchestrator, Message, Renderer, Session, SessionManager,
    describe_session, help_text,
};
use crate::client_logger::CompletionLogger;
use crate::completion::{CompletionService, ResponseMode};
use crate::error::{Error, Result};
use crate::types::Model;

/// A snapshot of the current session and settings for `/stats`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStats {
    pub session: String,
    pub prompt_name: String,
    pub contextless: bool,
    pub turn_count: usize,
    pub message_count: usize,
    pub session_count: usize,
    pub model: Model,
    pub temperature: Option<f32>,
    pub streaming: bool,
}

/// Everything a command needs to talk to the model.
pub struct App<S: CompletionService> {
    config: ChatConfig,
    manager: SessionManager,
    orchestrator: CompletionOrchestrator<S>,
}

impl<S: CompletionService> App<S> {
    /// Builds the context and its default session.
    pub fn new(config: ChatConfig, service: S) -> Self {
        let manager = SessionManager::with_default_session(config.session_defaults());
        let orchestrator = CompletionOrchestrator::new(service, config.completion_options());
        Self {
            config,
            manager,
            orchestrator,
        }
    }

    /// Aborts streaming answers when `flag` is raised.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.orchestrator = self.orchestrator.with_interrupt(flag);
        self
    }

    /// Reports every exchange to `logger`.
    pub fn with_logger(mut self, logger: Arc<dyn CompletionLogger>) -> Self {
        self.orchestrator = self.orchestrator.with_logger(logger);
        self
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut SessionManager {
        &mut self.manager
    }

    pub fn orchestrator(&self) -> &CompletionOrchestrator<S> {
        &self.orchestrator
    }

    /// The current session, choosing the default one when unset.
    pub fn current(&mut self) -> &Session {
        self.manager.current_or_default()
    }

    /// Asks `question` in the current session and renders the answer.
    pub async fn ask(
        &mut self,
        question: &str,
        streaming: bool,
        renderer: &mut dyn Renderer,
    ) -> Result<String> {
        let session = self.manager.current_or_default();
        renderer.start_response(session.name());
        let result = {
            let mut on_progress = |cumulative: &str, fragment: &str| {
                renderer.render_progress(cumulative, fragment)
            };
            self.orchestrator
                .ask(
                    session,
                    &self.config.prompts,
                    question,
                    ResponseMode::from_streaming(streaming),
                    &mut on_progress,
                )
                .await
        };
        match &result {
            Ok(answer) => renderer.finish_response(answer),
            Err(err) if err.is_abort() => renderer.print_interrupted(),
            Err(_) => {}
        }
        result
    }

    /// Makes `name` current, creating it if needed.
    pub fn switch(&mut self, name: &str) -> &Session {
        self.manager.switch_to(name)
    }

    /// Starts a fresh current session called `name`.
    pub fn create(&mut self, name: &str, prompt_name: Option<&str>) -> &Session {
        self.manager.create(name, prompt_name, true)
    }

    /// Renames `old` (the current session when `None`) to `new`.
    pub fn rename(&mut self, old: Option<&str>, new: &str) -> Result<()> {
        let old = match old {
            Some(old) => old.to_string(),
            None => self.current().name().to_string(),
        };
        if self.manager.rename(&old, new) {
            Ok(())
        } else {
            Err(Error::not_found(format!("no session named {old:?}")))
        }
    }

    /// The current session's messages.
    pub fn history(&mut self) -> &[Message] {
        self.manager.current_or_default().history()
    }

    /// Sets or clears the current session's prompt.
    ///
    /// Returns false when the name is not a known prompt. The name is kept
    /// anyway; unknown prompts leave questions unmodified.
    pub fn set_prompt(&mut self, prompt_name: Option<&str>) -> bool {
        let prompt_name = prompt_name.unwrap_or_default();
        let known = prompt_name.is_empty() || self.config.prompts.contains(prompt_name);
        self.manager
            .current_or_default()
            .set_prompt_name(prompt_name);
        known
    }

    pub fn set_contextless(&mut self, contextless: bool) {
        self.manager
            .current_or_default()
            .set_contextless(contextless);
    }

    pub fn set_model(&mut self, model: Model) {
        self.config.model = model.clone();
        self.orchestrator.set_model(model);
    }

    pub fn set_temperature(&mut self, temperature: f32) {
        self.config.temperature = temperature;
        self.orchestrator.set_temperature(Some(temperature));
    }

    pub fn set_streaming(&mut self, streaming: bool) {
        self.config.streaming = streaming;
    }

    pub fn stats(&mut self) -> SessionStats {
        let session_count = self.manager.len();
        let model = self.orchestrator.options().model.clone();
        let temperature = self.orchestrator.options().temperature;
        let streaming = self.config.streaming;
        let session = self.manager.current_or_default();
        SessionStats {
            session: session.name().to_string(),
            prompt_name: session.prompt_name().to_string(),
            contextless: session.is_contextless(),
            turn_count: session.turn_count(),
            message_count: session.history().len(),
            session_count,
            model,
            temperature,
            streaming,
        }
    }

    /// Carries out a slash command.
    ///
    /// Returns [`Error::ExitRequested`] for `/quit`; other failures are
    /// reported through `renderer` and the chat goes on.
    pub fn handle_command(
        &mut self,
        command: ChatCommand,
        renderer: &mut dyn Renderer,
    ) -> Result<()> {
        match command {
            ChatCommand::Quit => return Err(Error::ExitRequested),
            ChatCommand::Help => {
                for line in help_text().lines() {
                    renderer.print_info(&format!("    {line}"));
                }
            }
            ChatCommand::History => {
                let lines = self
                    .history()
                    .iter()
                    .map(|message| serde_json::to_string(&message.to_query_form()))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                if lines.is_empty() {
                    renderer.print_info("(no messages yet)");
                }
                for line in lines {
                    renderer.print_info(&line);
                }
            }
            ChatCommand::Sessions => {
                let current = self.current().id();
                let use_color = self.config.use_color;
                for session in self.manager.sessions() {
                    renderer.print_info(&describe_session(
                        session,
                        session.id() == current,
                        use_color,
                    ));
                }
            }
            ChatCommand::Switch(name) => {
                self.switch(&name);
                renderer.print_info(&format!("Switched to session {name}."));
            }
            ChatCommand::New { name, prompt } => {
                let replaced = self.manager.contains(&name);
                self.create(&name, prompt.as_deref());
                if replaced {
                    renderer.print_info(&format!("Replaced session {name} with a new one."));
                } else {
                    renderer.print_info(&format!("Created session {name}."));
                }
            }
            ChatCommand::Rename { old, new } => match self.rename(old.as_deref(), &new) {
                Ok(()) => renderer.print_info(&format!("Renamed to {new}.")),
                Err(err) => renderer.print_error(&err.to_string()),
            },
            ChatCommand::Context(on) => {
                self.set_contextless(!on);
                if on {
                    renderer.print_info("Context enabled: full history is sent.");
                } else {
                    renderer.print_info("Context disabled: only the latest question is sent.");
                }
            }
            ChatCommand::Prompt(name) => match name {
                Some(name) => {
                    if self.set_prompt(Some(&name)) {
                        renderer.print_info(&format!("Prompt set to {name}."));
                    } else {
                        renderer.print_info(&format!(
                            "Prompt set to {name}, which is not defined; questions are sent as typed."
                        ));
                    }
                }
                None => {
                    self.set_prompt(None);
                    renderer.print_info("Prompt cleared.");
                }
            },
            ChatCommand::Model(name) => {
                renderer.print_info(&format!("Model changed to: {name}"));
                self.set_model(Model::from(name));
            }
            ChatCommand::Temperature(value) => {
                self.set_temperature(value);
                renderer.print_info(&format!("temperature set to {value:.2}"));
            }
            ChatCommand::Stream(on) => {
                self.set_streaming(on);
                if on {
                    renderer.print_info("Streaming enabled.");
                } else {
                    renderer.print_info("Streaming disabled.");
                }
            }
            ChatCommand::Stats => {
                let stats = self.stats();
                renderer.print_info("    Session Statistics:");
                renderer.print_info(&format!("      Session: {}", stats.session));
                renderer.print_info(&format!(
                    "      Prompt: {}",
                    if stats.prompt_name.is_empty() {
                        "(none)"
                    } else {
                        stats.prompt_name.as_str()
                    }
                ));
                renderer.print_info(&format!(
                    "      Context: {}",
                    if stats.contextless { "off" } else { "on" }
                ));
                renderer.print_info(&format!("      Turns: {}", stats.turn_count));
                renderer.print_info(&format!("      Messages: {}", stats.message_count));
                renderer.print_info(&format!("      Sessions: {}", stats.session_count));
                renderer.print_info(&format!("      Model: {}", stats.model));
                renderer.print_info(&format!(
                    "      Temperature: {}",
                    stats
                        .temperature
                        .map(|v| format!("{v:.2}"))
                        .unwrap_or_else(|| "default".to_string())
                ));
                renderer.print_info(&format!(
                    "      Streaming: {}",
                    if stats.streaming { "on" } else { "off" }
                ));
            }
            ChatCommand::Invalid(message) => renderer.print_error(&message),
        }
        Ok(())
    }
}
