use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Represents a chat model identifier.
///
/// This can be a predefined model or a custom string value for models the
/// client does not know about (fine-tunes, self-hosted gateways, new releases).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Model {
    /// Known model versions
    Known(KnownModel),

    /// Custom model identifier
    Custom(String),
}

/// Known chat model versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KnownModel {
    /// GPT-3.5 Turbo
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,

    /// GPT-4
    #[serde(rename = "gpt-4")]
    Gpt4,

    /// GPT-4 Turbo
    #[serde(rename = "gpt-4-turbo")]
    Gpt4Turbo,

    /// GPT-4o
    #[serde(rename = "gpt-4o")]
    Gpt4o,

    /// GPT-4o mini
    #[serde(rename = "gpt-4o-mini")]
    Gpt4oMini,
}

impl KnownModel {
    /// Every known model, in display order.
    pub const ALL: [KnownModel; 5] = [
        KnownModel::Gpt35Turbo,
        KnownModel::Gpt4,
        KnownModel::Gpt4Turbo,
        KnownModel::Gpt4o,
        KnownModel::Gpt4oMini,
    ];

    /// The identifier sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            KnownModel::Gpt35Turbo => "gpt-3.5-turbo",
            KnownModel::Gpt4 => "gpt-4",
            KnownModel::Gpt4Turbo => "gpt-4-turbo",
            KnownModel::Gpt4o => "gpt-4o",
            KnownModel::Gpt4oMini => "gpt-4o-mini",
        }
    }
}

impl Default for Model {
    fn default() -> Self {
        Model::Known(KnownModel::Gpt35Turbo)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Model::Known(known_model) => write!(f, "{known_model}"),
            Model::Custom(custom) => write!(f, "{custom}"),
        }
    }
}

impl fmt::Display for KnownModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Model {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Model::from(s))
    }
}

impl From<KnownModel> for Model {
    fn from(model: KnownModel) -> Self {
        Model::Known(model)
    }
}

impl From<String> for Model {
    fn from(model: String) -> Self {
        Model::from(model.as_str())
    }
}

/// Known identifiers become [`Model::Known`]; anything else is kept verbatim.
impl From<&str> for Model {
    fn from(model: &str) -> Self {
        let model = model.trim();
        KnownModel::ALL
            .iter()
            .find(|known| known.as_str() == model)
            .map(|known| Model::Known(*known))
            .unwrap_or_else(|| Model::Custom(model.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_model_serialization() {
        let model = Model::Known(KnownModel::Gpt35Turbo);
        let json = serde_json::to_string(&model).unwrap();
        assert_eq!(json, r#""gpt-3.5-turbo""#);

        let model = Model::Known(KnownModel::Gpt4oMini);
        let json = serde_json::to_string(&model).unwrap();
        assert_eq!(json, r#""gpt-4o-mini""#);
    }

    #[test]
    fn custom_model_serialization() {
        let model = Model::Custom("ft:gpt-3.5-turbo:acme".to_string());
        let json = serde_json::to_string(&model).unwrap();
        assert_eq!(json, r#""ft:gpt-3.5-turbo:acme""#);
    }

    #[test]
    fn model_deserialization() {
        let model: Model = serde_json::from_str(r#""gpt-4""#).unwrap();
        assert_eq!(model, Model::Known(KnownModel::Gpt4));

        let model: Model = serde_json::from_str(r#""llama3""#).unwrap();
        assert_eq!(model, Model::Custom("llama3".to_string()));
    }

    #[test]
    fn parse_known_and_custom() {
        assert_eq!(
            "gpt-4o".parse::<Model>().unwrap(),
            Model::Known(KnownModel::Gpt4o)
        );
        assert_eq!(
            " mistral ".parse::<Model>().unwrap(),
            Model::Custom("mistral".to_string())
        );
    }

    #[test]
    fn from_str_slice_recognizes_known() {
        assert_eq!(Model::from("gpt-4"), Model::Known(KnownModel::Gpt4));
        assert_eq!(
            Model::from("llama3".to_string()),
            Model::Custom("llama3".to_string())
        );
    }

    #[test]
    fn display_round_trips_through_parse() {
        for known in KnownModel::ALL {
            let model = Model::from(known);
            assert_eq!(model.to_string().parse::<Model>().unwrap(), model);
        }
    }
}
