use log::info;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

pub const INSTRUCTION_PLACEHOLDER: &str = "{instruction}";

pub const DEFAULT_SYSTEM_PREAMBLE: &str =
    "I am a knowledgeable stock sentiment analyst, and analyze a stock under current market and news.";

pub const DEFAULT_TRADE_CONVERSION_TEMPLATE: &str =
    r#"Convert the following stock trading command into JSON format.
Only support `market` and `limit` order types. Output must be valid JSON.

Examples:
Buy 100 shares of AAPL at market price
Sell 50 shares of TSLA at limit price $700

Output format:
{
  "action": "buy" | "sell",
  "symbol": "AAPL",
  "quantity": 100,
  "order_type": "market" | "limit",
  "limit_price": 700  // Optional, only for limit orders
}

Now please convert: {instruction}
"#;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt template '{0}' is missing the {{instruction}} placeholder")]
    MissingPlaceholder(String),
    #[error("Prompt file IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Prompt JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PromptConfig {
    #[serde(default = "default_system_preamble")]
    pub system_preamble: String,
    #[serde(default = "default_trade_conversion")]
    pub trade_conversion: String,
}

fn default_system_preamble() -> String {
    DEFAULT_SYSTEM_PREAMBLE.to_string()
}

fn default_trade_conversion() -> String {
    DEFAULT_TRADE_CONVERSION_TEMPLATE.to_string()
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_preamble: default_system_preamble(),
            trade_conversion: default_trade_conversion(),
        }
    }
}

impl PromptConfig {
    fn validate(&self) -> Result<(), PromptError> {
        if !self.trade_conversion.contains(INSTRUCTION_PLACEHOLDER) {
            return Err(PromptError::MissingPlaceholder("trade_conversion".to_string()));
        }
        Ok(())
    }
}

/// Reads a prompts file. Keys left out of the file keep their built-in text.
pub fn load_prompts<P: AsRef<Path>>(path: P) -> Result<Arc<PromptConfig>, PromptError> {
    let file_content = fs::read_to_string(&path)?;
    let config: PromptConfig = serde_json::from_str(&file_content)?;
    config.validate()?;
    info!("Loaded prompt overrides from: {}", path.as_ref().display());
    Ok(Arc::new(config))
}

pub fn load_prompts_or_default(path: Option<&str>) -> Result<Arc<PromptConfig>, PromptError> {
    match path {
        Some(p) if !p.trim().is_empty() => load_prompts(p),
        _ => {
            info!("Using built-in prompts");
            Ok(Arc::new(PromptConfig::default()))
        }
    }
}

pub fn get_trade_conversion_prompt(config: &PromptConfig, instruction: &str) -> String {
    config.trade_conversion.replace(INSTRUCTION_PLACEHOLDER, instruction)
}
