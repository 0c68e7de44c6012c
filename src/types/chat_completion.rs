use serde::{Deserialize, Serialize};

use crate::types::{MessageRole, Usage};

/// The assistant message inside a single-shot completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionMessage {
    /// Always `assistant` in practice.
    pub role: MessageRole,

    /// The answer text; absent for refusals and tool calls.
    #[serde(default)]
    pub content: Option<String>,
}

/// One candidate answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionChoice {
    /// Position of this choice.
    #[serde(default)]
    pub index: u32,

    /// The answer.
    pub message: CompletionMessage,

    /// Why generation stopped (`stop`, `length`, ...).
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Response body of a non-streaming `chat/completions` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    /// Response identifier.
    #[serde(default)]
    pub id: String,

    /// The model that produced the answer.
    #[serde(default)]
    pub model: String,

    /// Candidate answers; parley only ever asks for one.
    pub choices: Vec<CompletionChoice>,

    /// Token accounting, when reported.
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatCompletion {
    /// The text of the first choice, or an empty string.
    pub fn text(&self) -> String {
        self.choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn completion_deserialization() {
        let completion: ChatCompletion = serde_json::from_value(json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "created": 1677652288,
            "model": "gpt-3.5-turbo-0613",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hello there!"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 9, "completion_tokens": 12, "total_tokens": 21}
        }))
        .unwrap();

        assert_eq!(completion.text(), "Hello there!");
        assert_eq!(completion.usage, Some(Usage::new(9, 12)));
        assert_eq!(
            completion.choices[0].finish_reason.as_deref(),
            Some("stop")
        );
    }

    #[test]
    fn completion_without_content() {
        let completion: ChatCompletion = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": null}}]
        }))
        .unwrap();
        assert_eq!(completion.text(), "");
    }
}
