use chrono::Utc;
use serde::{ Deserialize, Serialize };
use serde_json::Value as JsonValue;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderAction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

/// Shape the model is asked to produce. Nothing here is checked against
/// business rules; a limit order without `limit_price` still deserializes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOrderIntent {
    pub action: OrderAction,
    pub symbol: String,
    pub quantity: f64,
    pub order_type: OrderType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<f64>,
}

/// A model reply that parsed as JSON.
///
/// `raw` is whatever the model produced and is what gets displayed. `intent`
/// is only set when `raw` happens to fit [`TradeOrderIntent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedOrder {
    pub raw: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<TradeOrderIntent>,
}

impl ParsedOrder {
    pub fn from_value(raw: JsonValue) -> Self {
        let intent = serde_json::from_value::<TradeOrderIntent>(raw.clone()).ok();
        Self { raw, intent }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        text: String,
    },
    ParsedOrder(ParsedOrder),
    RawFallbackMessage {
        text: String,
    },
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        MessageContent::Text { text: text.into() }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, MessageContent::RawFallbackMessage { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
    pub timestamp: i64,
}

impl ChatMessage {
    pub fn new(role: Role, content: MessageContent) -> Self {
        Self {
            role,
            content,
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, MessageContent::text(text))
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, MessageContent::text(text))
    }

    pub fn assistant(content: MessageContent) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Plain text handed to the model when this message is replayed in a
    /// request. Parsed replies go back out as compact JSON.
    pub fn prompt_text(&self) -> String {
        match &self.content {
            MessageContent::Text { text } => text.clone(),
            MessageContent::RawFallbackMessage { text } => text.clone(),
            MessageContent::ParsedOrder(parsed) => parsed.raw.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn seeded(id: impl Into<String>, system_preamble: &str) -> Self {
        Self {
            id: id.into(),
            messages: vec![ChatMessage::system(system_preamble)],
        }
    }

    pub fn system_message(&self) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.role == Role::System)
    }
}
