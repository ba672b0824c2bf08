use crate::config::model::ModelConfig;
use crate::render::RenderedMessage;
use serde::{ Serialize, Deserialize };

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "chat")] Chat {
        content: String,
    },
    #[serde(rename = "settings")] Settings {
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<u32>,
    },
    #[serde(rename = "history")]
    History,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "session")] Session {
        session_id: String,
        settings: ModelConfig,
        models: Vec<String>,
    },
    #[serde(rename = "transcript")] Transcript {
        messages: Vec<RenderedMessage>,
        timestamp: i64,
    },
    #[serde(rename = "settings")] Settings {
        settings: ModelConfig,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
    #[serde(rename = "processing")]
    Processing,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_client_frames() {
        let chat: ClientMessage = serde_json::from_str(r#"{"type":"chat","content":"Buy 1 AAPL"}"#).unwrap();
        assert_eq!(chat, ClientMessage::Chat { content: "Buy 1 AAPL".into() });

        let settings: ClientMessage = serde_json::from_str(r#"{"type":"settings","temperature":0.1}"#).unwrap();
        assert_eq!(settings, ClientMessage::Settings {
            model: None,
            temperature: Some(0.1),
            max_tokens: None,
        });

        let history: ClientMessage = serde_json::from_str(r#"{"type":"history"}"#).unwrap();
        assert_eq!(history, ClientMessage::History);

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"order"}"#).is_err());
    }

    #[test]
    fn server_frames_are_tagged() {
        let value = serde_json::to_value(ServerMessage::Processing).unwrap();
        assert_eq!(value, json!({"type": "processing"}));

        let value = serde_json::to_value(ServerMessage::Error { message: "x".into() }).unwrap();
        assert_eq!(value, json!({"type": "error", "message": "x"}));
    }
}
