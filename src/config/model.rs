use serde::{ Deserialize, Serialize };
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const TEMPERATURE_RANGE: (f32, f32) = (0.0, 1.0);
pub const MAX_TOKENS_RANGE: (u32, u32) = (60, 240);
pub const DEFAULT_TEMPERATURE: f32 = 0.5;
pub const DEFAULT_MAX_TOKENS: u32 = 120;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChatModel {
    #[default]
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,
    #[serde(rename = "gpt-4o-mini")]
    Gpt4oMini,
}

impl ChatModel {
    pub const ALL: [ChatModel; 2] = [ChatModel::Gpt35Turbo, ChatModel::Gpt4oMini];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChatModel::Gpt35Turbo => "gpt-3.5-turbo",
            ChatModel::Gpt4oMini => "gpt-4o-mini",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|m| m.as_str()).collect()
    }
}

impl fmt::Display for ChatModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseChatModelError {
    message: String,
}

impl fmt::Display for ParseChatModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseChatModelError {}

impl FromStr for ChatModel {
    type Err = ParseChatModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gpt-3.5-turbo" => Ok(ChatModel::Gpt35Turbo),
            "gpt-4o-mini" => Ok(ChatModel::Gpt4oMini),
            _ =>
                Err(ParseChatModelError {
                    message: format!(
                        "Invalid model: '{}' (expected one of: {})",
                        s,
                        ChatModel::names().join(", ")
                    ),
                }),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ModelConfigError {
    #[error(transparent)]
    UnknownModel(#[from] ParseChatModelError),
    #[error("temperature {0} is outside [{min}, {max}]", min = TEMPERATURE_RANGE.0, max = TEMPERATURE_RANGE.1)]
    TemperatureOutOfRange(f32),
    #[error("max_tokens {0} is outside [{min}, {max}]", min = MAX_TOKENS_RANGE.0, max = MAX_TOKENS_RANGE.1)]
    MaxTokensOutOfRange(u32),
}

/// Per-request model controls. Values are range-checked on construction and
/// on every update, so a `ModelConfig` in hand is always sendable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model: ChatModel,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: ChatModel::default(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl ModelConfig {
    pub fn new(model: ChatModel, temperature: f32, max_tokens: u32) -> Result<Self, ModelConfigError> {
        let config = Self { model, temperature, max_tokens };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ModelConfigError> {
        // NaN fails both comparisons and is rejected here too
        if !(self.temperature >= TEMPERATURE_RANGE.0 && self.temperature <= TEMPERATURE_RANGE.1) {
            return Err(ModelConfigError::TemperatureOutOfRange(self.temperature));
        }
        if self.max_tokens < MAX_TOKENS_RANGE.0 || self.max_tokens > MAX_TOKENS_RANGE.1 {
            return Err(ModelConfigError::MaxTokensOutOfRange(self.max_tokens));
        }
        Ok(())
    }

    /// Returns a copy with the given overrides applied. `self` is untouched
    /// when any override is invalid.
    pub fn with_overrides(
        &self,
        model: Option<&str>,
        temperature: Option<f32>,
        max_tokens: Option<u32>
    ) -> Result<Self, ModelConfigError> {
        let model = match model {
            Some(name) => name.parse::<ChatModel>()?,
            None => self.model,
        };
        Self::new(
            model,
            temperature.unwrap_or(self.temperature),
            max_tokens.unwrap_or(self.max_tokens)
        )
    }
}
