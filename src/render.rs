use crate::models::chat::{ ChatMessage, Conversation, MessageContent, Role };
use serde::{ Deserialize, Serialize };
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    System,
    User,
    Assistant,
}

impl From<Role> for Lane {
    fn from(role: Role) -> Self {
        match role {
            Role::System => Lane::System,
            Role::User => Lane::User,
            Role::Assistant => Lane::Assistant,
        }
    }
}

impl Lane {
    fn label(&self) -> &'static str {
        match self {
            Lane::System => "system",
            Lane::User => "you",
            Lane::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Payload {
    Text(String),
    Json(JsonValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedMessage {
    pub lane: Lane,
    pub payload: Payload,
    pub timestamp: i64,
}

pub fn render_message(message: &ChatMessage) -> RenderedMessage {
    let payload = match &message.content {
        MessageContent::Text { text } | MessageContent::RawFallbackMessage { text } => {
            Payload::Text(text.clone())
        }
        MessageContent::ParsedOrder(parsed) => Payload::Json(parsed.raw.clone()),
    };
    RenderedMessage {
        lane: message.role.into(),
        payload,
        timestamp: message.timestamp,
    }
}

/// One rendered entry per message, in store order.
pub fn render_conversation(conversation: &Conversation) -> Vec<RenderedMessage> {
    conversation.messages.iter().map(render_message).collect()
}

pub fn render_text(messages: &[RenderedMessage]) -> String {
    let mut out = String::new();
    for msg in messages {
        let body = match &msg.payload {
            Payload::Text(text) => text.clone(),
            Payload::Json(value) =>
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
        };
        out.push_str(&format!("[{}]\n{}\n\n", msg.lane.label(), body));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::ParsedOrder;
    use serde_json::json;

    fn sample() -> Conversation {
        let mut conversation = Conversation::seeded("p:t", "preamble");
        conversation.messages.push(ChatMessage::user("Buy 1 AAPL"));
        conversation.messages.push(
            ChatMessage::assistant(
                MessageContent::ParsedOrder(ParsedOrder::from_value(json!({"action": "buy"})))
            )
        );
        conversation.messages.push(ChatMessage::user("???"));
        conversation.messages.push(
            ChatMessage::assistant(MessageContent::RawFallbackMessage { text: "sorry".into() })
        );
        conversation
    }

    #[test]
    fn projection_is_one_to_one_and_ordered() {
        let conversation = sample();
        let rendered = render_conversation(&conversation);
        assert_eq!(rendered.len(), conversation.messages.len());
        let lanes: Vec<Lane> = rendered.iter().map(|m| m.lane).collect();
        assert_eq!(
            lanes,
            vec![Lane::System, Lane::User, Lane::Assistant, Lane::User, Lane::Assistant]
        );
        assert_eq!(rendered[2].payload, Payload::Json(json!({"action": "buy"})));
        assert_eq!(rendered[4].payload, Payload::Text("sorry".into()));
    }

    #[test]
    fn text_rendering_pretty_prints_json() {
        let text = render_text(&render_conversation(&sample()));
        assert!(text.starts_with("[system]\npreamble\n"));
        assert!(text.contains("[you]\nBuy 1 AAPL\n"));
        assert!(text.contains("{\n  \"action\": \"buy\"\n}"));
        assert!(text.contains("[assistant]\nsorry\n"));
    }

    #[test]
    fn payload_wire_format() {
        let value = serde_json::to_value(Payload::Json(json!({"a": 1}))).unwrap();
        assert_eq!(value, json!({"type": "json", "value": {"a": 1}}));
    }
}
