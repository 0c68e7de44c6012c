//! Named prompt templates.
//!
//! A session with a prompt name asks a [`PromptLookup`] for the template text
//! each time the user speaks. A name that does not resolve is not an error;
//! the user's text is sent as typed.

use std::collections::BTreeMap;

/// Resolves a prompt name to its template text.
pub trait PromptLookup {
    /// The template for `name`, or `None` when there is no such prompt.
    fn resolve(&self, name: &str) -> Option<String>;
}

/// Templates that ship with parley.
const BUILTIN_PROMPTS: &[(&str, &str)] = &[
    (
        "assist",
        "You are a helpful assistant. Answer concisely and accurately.",
    ),
    (
        "translator",
        "Translate the following text. If it is English, translate it into Chinese; \
         otherwise translate it into English. Reply with the translation only.",
    ),
];

/// An in-memory set of prompt templates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptLibrary {
    prompts: BTreeMap<String, String>,
}

impl PromptLibrary {
    /// An empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// A library holding the built-in prompts.
    pub fn with_builtins() -> Self {
        let mut library = Self::new();
        for (name, template) in BUILTIN_PROMPTS {
            library.insert(*name, *template);
        }
        library
    }

    /// Adds or replaces a template.
    pub fn insert(&mut self, name: impl Into<String>, template: impl Into<String>) {
        self.prompts.insert(name.into(), template.into());
    }

    /// Adds or replaces every template in `prompts`.
    pub fn extend<I, K, V>(&mut self, prompts: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, template) in prompts {
            self.insert(name, template);
        }
    }

    /// True when `name` is known.
    pub fn contains(&self, name: &str) -> bool {
        self.prompts.contains_key(name)
    }

    /// Prompt names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.prompts.keys().map(String::as_str)
    }

    /// `(name, template)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prompts
            .iter()
            .map(|(name, template)| (name.as_str(), template.as_str()))
    }

    /// Number of templates.
    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    /// True when there are no templates.
    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}

impl PromptLookup for PromptLibrary {
    fn resolve(&self, name: &str) -> Option<String> {
        self.prompts.get(name).cloned()
    }
}

impl<P: PromptLookup + ?Sized> PromptLookup for &P {
    fn resolve(&self, name: &str) -> Option<String> {
        (**self).resolve(name)
    }
}
