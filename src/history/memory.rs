use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::error::Error;
use tokio::sync::RwLock;

use crate::history::HistoryStore;
use crate::models::chat::{ ChatMessage, Conversation };
use crate::session::SessionKey;

pub struct InMemoryHistoryStore {
    system_preamble: String,
    conversations: RwLock<HashMap<SessionKey, Conversation>>,
}

impl InMemoryHistoryStore {
    pub fn new(system_preamble: impl Into<String>) -> Self {
        Self {
            system_preamble: system_preamble.into(),
            conversations: RwLock::new(HashMap::new()),
        }
    }

    fn seed(&self, key: &SessionKey) -> Conversation {
        debug!("Initializing conversation {}", key);
        Conversation::seeded(key.to_string(), &self.system_preamble)
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn get_or_init(
        &self,
        key: &SessionKey
    ) -> Result<Conversation, Box<dyn Error + Send + Sync>> {
        if let Some(existing) = self.conversations.read().await.get(key) {
            return Ok(existing.clone());
        }
        let mut guard = self.conversations.write().await;
        let conversation = guard.entry(key.clone()).or_insert_with(|| self.seed(key));
        Ok(conversation.clone())
    }

    async fn snapshot(&self, key: &SessionKey) -> Result<Conversation, Box<dyn Error + Send + Sync>> {
        let stored = self.conversations.read().await.get(key).cloned();
        Ok(stored.unwrap_or_else(|| self.seed(key)))
    }

    async fn append_turn(
        &self,
        key: &SessionKey,
        user: ChatMessage,
        assistant: ChatMessage
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut guard = self.conversations.write().await;
        let conversation = guard.entry(key.clone()).or_insert_with(|| self.seed(key));
        conversation.messages.push(user);
        conversation.messages.push(assistant);
        Ok(())
    }

    async fn get_conversation(
        &self,
        key: &SessionKey
    ) -> Result<Option<Conversation>, Box<dyn Error + Send + Sync>> {
        Ok(self.conversations.read().await.get(key).cloned())
    }

    async fn end_session(&self, key: &SessionKey) -> Result<bool, Box<dyn Error + Send + Sync>> {
        Ok(self.conversations.write().await.remove(key).is_some())
    }

    async fn session_count(&self) -> usize {
        self.conversations.read().await.len()
    }
}
