mod memory;

pub use memory::InMemoryHistoryStore;

use async_trait::async_trait;
use log::info;
use std::error::Error;
use std::sync::Arc;
use crate::models::chat::{ ChatMessage, Conversation };
use crate::session::SessionKey;

/// Per-session, append-only message log.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Returns the conversation, seeding it with the system preamble when the
    /// session has no record yet.
    async fn get_or_init(
        &self,
        key: &SessionKey
    ) -> Result<Conversation, Box<dyn Error + Send + Sync>>;

    /// Returns the stored conversation, or a freshly seeded one that is not
    /// recorded. Never creates a session.
    async fn snapshot(&self, key: &SessionKey) -> Result<Conversation, Box<dyn Error + Send + Sync>>;

    /// Appends the user message and the assistant reply together.
    async fn append_turn(
        &self,
        key: &SessionKey,
        user: ChatMessage,
        assistant: ChatMessage
    ) -> Result<(), Box<dyn Error + Send + Sync>>;

    async fn get_conversation(
        &self,
        key: &SessionKey
    ) -> Result<Option<Conversation>, Box<dyn Error + Send + Sync>>;

    async fn end_session(&self, key: &SessionKey) -> Result<bool, Box<dyn Error + Send + Sync>>;

    async fn session_count(&self) -> usize;
}

pub fn initialize_history_store(system_preamble: &str) -> Arc<dyn HistoryStore> {
    info!("Chat history will be kept in memory for the lifetime of each session");
    Arc::new(InMemoryHistoryStore::new(system_preamble))
}
