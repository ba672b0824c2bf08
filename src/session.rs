use crate::config::model::{ ModelConfig, ModelConfigError };
use std::fmt;
use uuid::Uuid;

pub const PAGE_SEPARATOR: char = '_';

/// Page identity with spaces replaced, e.g. "Sentiment Analysis" becomes
/// "Sentiment_Analysis".
pub fn page_id(page_name: &str) -> String {
    page_name.replace(' ', &PAGE_SEPARATOR.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    page: String,
    token: String,
}

impl SessionKey {
    pub fn new(page_name: &str, token: impl Into<String>) -> Self {
        Self {
            page: page_id(page_name),
            token: token.into(),
        }
    }

    pub fn generate(page_name: &str) -> Self {
        Self::new(page_name, Uuid::new_v4().to_string())
    }

    pub fn page(&self) -> &str {
        &self.page
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.page, self.token)
    }
}

/// Everything a handler needs to know about the session it is serving.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub key: SessionKey,
    pub model_config: ModelConfig,
}

impl SessionContext {
    pub fn new(key: SessionKey, model_config: ModelConfig) -> Self {
        Self { key, model_config }
    }

    pub fn update_settings(
        &mut self,
        model: Option<&str>,
        temperature: Option<f32>,
        max_tokens: Option<u32>
    ) -> Result<ModelConfig, ModelConfigError> {
        self.model_config = self.model_config.with_overrides(model, temperature, max_tokens)?;
        Ok(self.model_config)
    }
}
