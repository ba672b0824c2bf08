use crate::cli::Args;
use crate::config::model::ModelConfig;
use crate::config::prompt::{ self, PromptConfig };
use crate::history::{ initialize_history_store, HistoryStore };
use crate::interpreter::TradeInterpreter;
use crate::llm::chat::{ new_client as new_chat_client, ChatClient };
use crate::llm::LlmConfig;
use crate::models::chat::{ ChatMessage, MessageContent };
use crate::normalizer;
use crate::render::{ render_conversation, RenderedMessage };
use crate::session::{ SessionContext, SessionKey };

use log::{ debug, error, info };
use std::error::Error;
use std::sync::Arc;

#[derive(Clone)]
pub struct TradeAgent {
    interpreter: TradeInterpreter,
    history_store: Arc<dyn HistoryStore>,
    default_model_config: ModelConfig,
    page_name: String,
}

impl TradeAgent {
    pub fn new(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let prompt_config = prompt::load_prompts_or_default(args.prompts_path.as_deref())?;
        let default_model_config = args.default_model_config()?;

        let chat_config = LlmConfig {
            api_key: Some(args.openai_api_key.clone()).filter(|k| !k.is_empty()),
            base_url: args.openai_base_url.clone(),
        };
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: BaseURL={}, Defaults={:?}",
            chat_client.get_base_url().as_deref().unwrap_or("adapter default"),
            default_model_config
        );

        let history_store = initialize_history_store(&prompt_config.system_preamble);
        Ok(
            Self::with_components(
                chat_client,
                prompt_config,
                history_store,
                default_model_config,
                &args.page_name
            )
        )
    }

    pub fn with_components(
        chat_client: Arc<dyn ChatClient>,
        prompt_config: Arc<PromptConfig>,
        history_store: Arc<dyn HistoryStore>,
        default_model_config: ModelConfig,
        page_name: &str
    ) -> Self {
        Self {
            interpreter: TradeInterpreter::new(chat_client, prompt_config),
            history_store,
            default_model_config,
            page_name: page_name.to_string(),
        }
    }

    pub fn default_model_config(&self) -> ModelConfig {
        self.default_model_config
    }

    /// Builds the context for a session. Without a token a fresh one is
    /// generated.
    pub fn open_session(&self, token: Option<&str>) -> SessionContext {
        let key = match token {
            Some(t) => SessionKey::new(&self.page_name, t),
            None => SessionKey::generate(&self.page_name),
        };
        SessionContext::new(key, self.default_model_config)
    }

    /// Records the seeded conversation for a session that is about to be
    /// served interactively.
    pub async fn start_session(
        &self,
        ctx: &SessionContext
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.history_store.get_or_init(&ctx.key).await?;
        debug!("Session {} started", ctx.key);
        Ok(())
    }

    /// Runs one user turn and returns the assistant content that was stored.
    ///
    /// A failed model call returns the error and leaves the conversation as it
    /// was; once a reply arrives both messages are always appended.
    pub async fn process_instruction(
        &self,
        ctx: &SessionContext,
        instruction: &str
    ) -> Result<MessageContent, Box<dyn Error + Send + Sync>> {
        let conversation = self.history_store.snapshot(&ctx.key).await?;
        let system_message = conversation
            .system_message()
            .cloned()
            .ok_or_else(|| format!("Conversation {} has no system message", ctx.key))?;

        let raw_reply = self.interpreter
            .interpret(&ctx.model_config, &system_message, instruction).await
            .map_err(|e| {
                error!("Model call failed for {}: {}", ctx.key, e);
                e
            })?;
        debug!("Raw model reply for {}: {}", ctx.key, raw_reply);

        let content = normalizer::normalize(&raw_reply);
        if content.is_fallback() {
            info!("Reply for {} could not be parsed; storing fallback", ctx.key);
        }

        self.history_store.append_turn(
            &ctx.key,
            ChatMessage::user(instruction),
            ChatMessage::assistant(content.clone())
        ).await?;

        Ok(content)
    }

    /// Renders the session without creating it.
    pub async fn transcript(
        &self,
        ctx: &SessionContext
    ) -> Result<Vec<RenderedMessage>, Box<dyn Error + Send + Sync>> {
        let conversation = self.history_store.snapshot(&ctx.key).await?;
        Ok(render_conversation(&conversation))
    }

    pub async fn close_session(
        &self,
        ctx: &SessionContext
    ) -> Result<bool, Box<dyn Error + Send + Sync>> {
        let removed = self.history_store.end_session(&ctx.key).await?;
        if removed {
            info!("Discarded conversation {}", ctx.key);
        }
        Ok(removed)
    }

    pub async fn session_count(&self) -> usize {
        self.history_store.session_count().await
    }
}
