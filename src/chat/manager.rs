//! The registry of sessions for one process.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::chat::session::{Session, SessionId};
use crate::observability::{SESSIONS_CREATED, SESSIONS_RENAMED};

/// Name of the session every process starts with.
pub const DEFAULT_SESSION_NAME: &str = "Chat01";

/// Settings applied to every newly created session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDefaults {
    /// Prompt template name; empty for none.
    pub prompt_name: String,
    /// Whether new sessions send only the latest user turn.
    pub contextless: bool,
    /// Optional system message seeded into new sessions.
    pub system_prompt: Option<String>,
}

/// Sessions by name plus a pointer to the current one.
///
/// The current pointer follows identity, not name: renaming the current
/// session keeps it current.
#[derive(Debug, Clone)]
pub struct SessionManager {
    sessions: BTreeMap<String, Session>,
    current: Option<SessionId>,
    next_id: u64,
    defaults: SessionDefaults,
}

impl SessionManager {
    /// A manager with no sessions and no current session.
    pub fn new(defaults: SessionDefaults) -> Self {
        Self {
            sessions: BTreeMap::new(),
            current: None,
            next_id: 0,
            defaults,
        }
    }

    /// A manager seeded with [`DEFAULT_SESSION_NAME`] as its current session.
    pub fn with_default_session(defaults: SessionDefaults) -> Self {
        let mut manager = Self::new(defaults);
        manager.switch_to(DEFAULT_SESSION_NAME);
        manager
    }

    pub fn defaults(&self) -> &SessionDefaults {
        &self.defaults
    }

    fn build(
        next_id: &mut u64,
        defaults: &SessionDefaults,
        name: &str,
        prompt_name: Option<&str>,
    ) -> Session {
        *next_id += 1;
        let mut session = Session::new(SessionId::new(*next_id), name)
            .with_prompt_name(prompt_name.unwrap_or(&defaults.prompt_name))
            .with_contextless(defaults.contextless);
        if let Some(system_prompt) = &defaults.system_prompt {
            session = session.with_system_prompt(system_prompt.clone());
        }
        SESSIONS_CREATED.click();
        tracing::debug!(session = %name, id = %session.id(), "created session");
        session
    }

    fn entry<'a>(
        sessions: &'a mut BTreeMap<String, Session>,
        next_id: &mut u64,
        defaults: &SessionDefaults,
        name: &str,
    ) -> &'a mut Session {
        sessions
            .entry(name.to_string())
            .or_insert_with(|| Self::build(next_id, defaults, name, None))
    }

    /// The session called `name`, created with the defaults if absent.
    pub fn get_or_create(&mut self, name: &str) -> &mut Session {
        Self::entry(&mut self.sessions, &mut self.next_id, &self.defaults, name)
    }

    /// Makes `name` current, creating it if needed.
    pub fn switch_to(&mut self, name: &str) -> &mut Session {
        let session = Self::entry(&mut self.sessions, &mut self.next_id, &self.defaults, name);
        self.current = Some(session.id());
        session
    }

    /// Always creates a fresh session called `name`.
    ///
    /// An existing session with that name is discarded. With `auto_switch` the
    /// new session becomes current. Without it, current still moves to the new
    /// session if the discarded one was current.
    pub fn create(
        &mut self,
        name: &str,
        prompt_name: Option<&str>,
        auto_switch: bool,
    ) -> &mut Session {
        let session = Self::build(&mut self.next_id, &self.defaults, name, prompt_name);
        let id = session.id();
        let replaced = match self.sessions.entry(name.to_string()) {
            Entry::Occupied(mut entry) => {
                let discarded = entry.insert(session);
                tracing::debug!(session = %name, id = %discarded.id(), "discarded session");
                Some(discarded.id())
            }
            Entry::Vacant(entry) => {
                entry.insert(session);
                None
            }
        };
        if auto_switch || (replaced.is_some() && replaced == self.current) {
            self.current = Some(id);
        }
        Self::entry(&mut self.sessions, &mut self.next_id, &self.defaults, name)
    }

    /// Moves the session `old` to the name `new`.
    ///
    /// Identity and history are preserved and a session already called `new`
    /// is discarded. Returns false, changing nothing, when `old` is absent.
    pub fn rename(&mut self, old: &str, new: &str) -> bool {
        if old == new {
            return self.sessions.contains_key(old);
        }
        let Some(mut session) = self.sessions.remove(old) else {
            return false;
        };
        session.set_name(new);
        let id = session.id();
        if let Some(discarded) = self.sessions.insert(new.to_string(), session) {
            tracing::debug!(session = %new, id = %discarded.id(), "discarded session");
            if self.current == Some(discarded.id()) {
                self.current = Some(id);
            }
        }
        SESSIONS_RENAMED.click();
        tracing::debug!(from = %old, to = %new, id = %id, "renamed session");
        true
    }

    pub fn get(&self, name: &str) -> Option<&Session> {
        self.sessions.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Session> {
        self.sessions.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sessions.contains_key(name)
    }

    /// The current session, if one has been chosen.
    pub fn current(&self) -> Option<&Session> {
        let id = self.current?;
        self.sessions.values().find(|session| session.id() == id)
    }

    pub fn current_mut(&mut self) -> Option<&mut Session> {
        let id = self.current?;
        self.sessions.values_mut().find(|session| session.id() == id)
    }

    /// The current session, switching to [`DEFAULT_SESSION_NAME`] when unset.
    pub fn current_or_default(&mut self) -> &mut Session {
        let name = self
            .current()
            .map(|session| session.name().to_string())
            .unwrap_or_else(|| DEFAULT_SESSION_NAME.to_string());
        self.switch_to(&name)
    }

    /// Sessions in name order.
    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::with_default_session(SessionDefaults::default())
    }
}
