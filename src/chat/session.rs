//! A single named conversation.
//!
//! A [`Session`] owns its message history and the two policies that decide
//! what leaves the process: prompt injection on user turns and the context
//! window of the query view.

use std::fmt;

use crate::chat::message::Message;
use crate::prompts::PromptLookup;
use crate::types::{MessageRole, QueryMessage};

/// Process-unique identity of a session.
///
/// Names can change; identities do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One conversation: ordered history plus prompt and context settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: SessionId,
    name: String,
    prompt_name: String,
    history: Vec<Message>,
    turn_count: usize,
    contextless: bool,
}

impl Session {
    /// An empty session with no prompt and full context.
    pub fn new(id: SessionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            prompt_name: String::new(),
            history: Vec::new(),
            turn_count: 0,
            contextless: false,
        }
    }

    /// Sets the prompt template name; empty disables injection.
    pub fn with_prompt_name(mut self, prompt_name: impl Into<String>) -> Self {
        self.prompt_name = prompt_name.into();
        self
    }

    /// Sets the context mode.
    pub fn with_contextless(mut self, contextless: bool) -> Self {
        self.contextless = contextless;
        self
    }

    /// Seeds the history with a system message.
    pub fn with_system_prompt(mut self, text: impl Into<String>) -> Self {
        self.history.push(Message::system(text));
        self
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn prompt_name(&self) -> &str {
        &self.prompt_name
    }

    /// Changes the prompt for future user turns only.
    pub fn set_prompt_name(&mut self, prompt_name: impl Into<String>) {
        self.prompt_name = prompt_name.into();
    }

    pub fn is_contextless(&self) -> bool {
        self.contextless
    }

    /// Changes the context mode for future query views only.
    pub fn set_contextless(&mut self, contextless: bool) {
        self.contextless = contextless;
    }

    /// Messages in the order they were recorded.
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Number of user messages in the history.
    pub fn turn_count(&self) -> usize {
        self.turn_count
    }

    /// Records what the user typed.
    ///
    /// When the session's prompt resolves to non-empty text, the stored message
    /// is `template + "\n\n" + text`. A prompt that does not resolve leaves the
    /// text untouched.
    pub fn record_user_turn(&mut self, text: &str, prompts: &dyn PromptLookup) -> &Message {
        let template = if self.prompt_name.is_empty() {
            None
        } else {
            prompts
                .resolve(&self.prompt_name)
                .filter(|template| !template.is_empty())
        };
        let stored = match template {
            Some(template) => format!("{template}\n\n{text}"),
            None => {
                if !self.prompt_name.is_empty() {
                    tracing::debug!(
                        session = %self.name,
                        prompt = %self.prompt_name,
                        "prompt not found; sending text unmodified"
                    );
                }
                text.to_string()
            }
        };
        self.push(Message::user(stored))
    }

    /// Records the model's answer verbatim.
    pub fn record_assistant_turn(&mut self, text: impl Into<String>) -> &Message {
        self.push(Message::assistant(text))
    }

    fn push(&mut self, message: Message) -> &Message {
        if message.role() == MessageRole::User {
            self.turn_count += 1;
        }
        let index = self.history.len();
        self.history.push(message);
        &self.history[index]
    }

    /// The messages to send upstream.
    ///
    /// With full context this is the whole history. A contextless session sends
    /// only its most recent user message, or nothing when there is none.
    pub fn build_query_view(&self) -> Vec<QueryMessage> {
        if self.contextless {
            self.history
                .iter()
                .rev()
                .find(|message| message.is_user())
                .map(Message::to_query_form)
                .into_iter()
                .collect()
        } else {
            self.history.iter().map(Message::to_query_form).collect()
        }
    }
}
