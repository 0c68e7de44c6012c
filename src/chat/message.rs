use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{MessageRole, QueryMessage};

/// One recorded turn of a conversation.
///
/// Messages are never changed once built; prompt injection happens before
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    text: String,
    role: MessageRole,
    /// Seconds since the unix epoch.
    created_at: i64,
}

impl Message {
    /// A message stamped with the current time.
    pub fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self::at(role, text, crate::utils::time::now().unix_timestamp())
    }

    /// A message with an explicit timestamp.
    pub fn at(role: MessageRole, text: impl Into<String>, created_at: i64) -> Self {
        Self {
            text: text.into(),
            role,
            created_at,
        }
    }

    /// Builds a message from a wire role name.
    ///
    /// Fails with [`Error::InvalidRole`](crate::Error::InvalidRole) for
    /// anything but `system`, `user` or `assistant`.
    pub fn from_role_name(role: &str, text: impl Into<String>) -> Result<Self> {
        Ok(Self::new(role.parse()?, text))
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageRole::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, text)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn role(&self) -> MessageRole {
        self.role
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// True for user turns.
    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }

    /// The `{role, content}` pair sent upstream.
    pub fn to_query_form(&self) -> QueryMessage {
        QueryMessage::new(self.role, self.text.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_role_names() {
        for (name, role) in [
            ("system", MessageRole::System),
            ("user", MessageRole::User),
            ("assistant", MessageRole::Assistant),
        ] {
            let message = Message::from_role_name(name, "hi").unwrap();
            assert_eq!(message.role(), role);
            assert_eq!(message.text(), "hi");
        }
    }

    #[test]
    fn invalid_role_name() {
        let err = Message::from_role_name("narrator", "hi").unwrap_err();
        assert!(err.is_invalid_role());
    }

    #[test]
    fn created_at_defaults_to_now() {
        let before = crate::utils::time::now().unix_timestamp();
        let message = Message::user("hi");
        assert!(message.created_at() >= before);
    }

    #[test]
    fn query_form() {
        let message = Message::at(MessageRole::Assistant, "Hello", 7);
        assert_eq!(
            serde_json::to_value(message.to_query_form()).unwrap(),
            json!({"role": "assistant", "content": "Hello"})
        );
    }
}
