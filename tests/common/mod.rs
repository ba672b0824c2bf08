#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::error::Error;
use std::sync::{ Arc, Mutex };
use trade_intent_chat::agent::TradeAgent;
use trade_intent_chat::config::model::ModelConfig;
use trade_intent_chat::config::prompt::PromptConfig;
use trade_intent_chat::history::InMemoryHistoryStore;
use trade_intent_chat::llm::chat::{ ChatClient, CompletionResponse };
use trade_intent_chat::llm::CompletionRequest;

/// Replays canned replies in order and records every request it receives.
#[derive(Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, String>>>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    pub fn new(replies: Vec<Result<&str, &str>>) -> Arc<Self> {
        let replies = replies
            .into_iter()
            .map(|r| r.map(str::to_string).map_err(str::to_string))
            .collect();
        Arc::new(Self { replies: Mutex::new(replies), requests: Mutex::new(Vec::new()) })
    }

    pub fn recorded(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for ScriptedClient {
    async fn complete(
        &self,
        request: &CompletionRequest
    ) -> Result<CompletionResponse, Box<dyn Error + Send + Sync>> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(response)) => Ok(CompletionResponse { response }),
            Some(Err(message)) => Err(message.into()),
            None => Err("script exhausted".into()),
        }
    }

    fn get_base_url(&self) -> Option<String> {
        None
    }
}

pub fn agent_with(client: Arc<ScriptedClient>) -> TradeAgent {
    let prompts = Arc::new(PromptConfig::default());
    let store = Arc::new(InMemoryHistoryStore::new(prompts.system_preamble.clone()));
    TradeAgent::with_components(client, prompts, store, ModelConfig::default(), "Sentiment Analysis")
}
