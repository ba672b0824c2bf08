use crate::config::model::ModelConfig;
use crate::config::prompt::{ self, PromptConfig };
use crate::llm::chat::ChatClient;
use crate::llm::{ CompletionRequest, PromptMessage };
use crate::models::chat::ChatMessage;
use log::info;
use std::error::Error;
use std::sync::Arc;

/// Turns a free-text instruction into the model's raw reply.
#[derive(Clone)]
pub struct TradeInterpreter {
    chat_client: Arc<dyn ChatClient>,
    prompt_config: Arc<PromptConfig>,
}

impl TradeInterpreter {
    pub fn new(chat_client: Arc<dyn ChatClient>, prompt_config: Arc<PromptConfig>) -> Self {
        Self { chat_client, prompt_config }
    }

    /// The request is always two messages: the session's system message, then
    /// the conversion prompt carrying the instruction.
    pub fn build_request(
        &self,
        config: &ModelConfig,
        system_message: &ChatMessage,
        instruction: &str
    ) -> CompletionRequest {
        let user_prompt = prompt::get_trade_conversion_prompt(&self.prompt_config, instruction);
        CompletionRequest {
            config: *config,
            messages: vec![
                PromptMessage::new(system_message.role.as_str(), system_message.prompt_text()),
                PromptMessage::new("user", user_prompt)
            ],
        }
    }

    pub async fn interpret(
        &self,
        config: &ModelConfig,
        system_message: &ChatMessage,
        instruction: &str
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let request = self.build_request(config, system_message, instruction);
        info!(
            "Requesting trade conversion: model={}, temperature={}, max_tokens={}",
            config.model,
            config.temperature,
            config.max_tokens
        );
        let completion = self.chat_client.complete(&request).await?;
        Ok(completion.response)
    }
}
