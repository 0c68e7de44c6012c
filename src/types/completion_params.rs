use serde::{Deserialize, Serialize};

use crate::types::{Model, QueryMessage};

/// Request body for `POST chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionParams {
    /// The model that will complete the conversation.
    pub model: Model,

    /// The conversation sent upstream, oldest first.
    pub messages: Vec<QueryMessage>,

    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Whether to deliver the answer as server-sent events.
    #[serde(default)]
    pub stream: bool,
}

impl CompletionParams {
    /// Create new single-shot parameters.
    pub fn new(model: Model, messages: Vec<QueryMessage>) -> Self {
        Self {
            model,
            messages,
            temperature: None,
            stream: false,
        }
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set streaming mode.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KnownModel;
    use serde_json::{json, to_value};

    #[test]
    fn params_serialization() {
        let params = CompletionParams::new(
            Model::Known(KnownModel::Gpt35Turbo),
            vec![QueryMessage::system("sys"), QueryMessage::user("hi")],
        )
        .with_temperature(Some(0.5))
        .with_stream(true);

        assert_eq!(
            to_value(&params).unwrap(),
            json!({
                "model": "gpt-3.5-turbo",
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "hi"}
                ],
                "temperature": 0.5,
                "stream": true
            })
        );
    }

    #[test]
    fn params_omit_missing_temperature() {
        let params = CompletionParams::new(Model::from("local"), vec![]);
        let json = to_value(&params).unwrap();
        assert!(json.get("temperature").is_none());
        assert_eq!(json["stream"], json!(false));
    }
}
