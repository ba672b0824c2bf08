mod common;

use common::{ agent_with, ScriptedClient };
use futures::{ SinkExt, StreamExt };
use serde_json::{ json, Value };
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{ TcpListener, TcpStream };
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{ accept_async, connect_async, MaybeTlsStream, WebSocketStream };
use trade_intent_chat::agent::TradeAgent;
use trade_intent_chat::server::websocket::handle_connection;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const FENCED_BUY: &str = "```json\n{\"action\":\"buy\",\"symbol\":\"AAPL\",\"quantity\":10}\n```";

/// Serves exactly one connection with `handle_connection`.
async fn connect(agent: Arc<TradeAgent>) -> (Client, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (stream, peer) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        handle_connection(peer, ws, agent).await;
    });
    let (ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    (ws, server)
}

async fn next_frame(ws: &mut Client) -> Value {
    loop {
        let msg = timeout(Duration::from_secs(5), ws.next()).await
            .expect("server frame")
            .expect("open stream")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn send(ws: &mut Client, frame: Value) {
    ws.send(Message::Text(frame.to_string())).await.unwrap();
}

/// Consumes the `session` hello and the initial `transcript`.
async fn skip_greeting(ws: &mut Client) {
    assert_eq!(next_frame(ws).await["type"], "session");
    assert_eq!(next_frame(ws).await["type"], "transcript");
}

#[tokio::test]
async fn greets_with_session_then_seeded_transcript() {
    let agent = Arc::new(agent_with(ScriptedClient::new(vec![])));
    let (mut ws, _server) = connect(agent.clone()).await;

    let hello = next_frame(&mut ws).await;
    assert_eq!(hello["type"], "session");
    assert!(!hello["session_id"].as_str().unwrap().is_empty());
    assert_eq!(hello["settings"]["model"], "gpt-3.5-turbo");
    assert_eq!(hello["settings"]["max_tokens"], 120);
    assert_eq!(hello["models"], json!(["gpt-3.5-turbo", "gpt-4o-mini"]));

    let transcript = next_frame(&mut ws).await;
    assert_eq!(transcript["type"], "transcript");
    let messages = transcript["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["lane"], "system");
    assert_eq!(agent.session_count().await, 1);
}

#[tokio::test]
async fn chat_turn_sends_processing_then_transcript() {
    let agent = Arc::new(agent_with(ScriptedClient::new(vec![Ok(FENCED_BUY)])));
    let (mut ws, _server) = connect(agent).await;
    skip_greeting(&mut ws).await;

    send(&mut ws, json!({"type": "chat", "content": "Buy 10 shares of AAPL"})).await;
    assert_eq!(next_frame(&mut ws).await, json!({"type": "processing"}));

    let transcript = next_frame(&mut ws).await;
    assert_eq!(transcript["type"], "transcript");
    let messages = transcript["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1]["payload"], json!({"type": "text", "value": "Buy 10 shares of AAPL"}));
    assert_eq!(messages[2]["lane"], "assistant");
    assert_eq!(messages[2]["payload"]["type"], "json");
    assert_eq!(messages[2]["payload"]["value"]["symbol"], "AAPL");
}

#[tokio::test]
async fn invalid_settings_are_rejected_and_previous_config_kept() {
    let client = ScriptedClient::new(vec![Ok("{}")]);
    let agent = Arc::new(agent_with(client.clone()));
    let (mut ws, _server) = connect(agent).await;
    skip_greeting(&mut ws).await;

    send(&mut ws, json!({"type": "settings", "max_tokens": 500})).await;
    let error = next_frame(&mut ws).await;
    assert_eq!(error["type"], "error");
    assert!(error["message"].as_str().unwrap().contains("max_tokens 500"));

    send(&mut ws, json!({"type": "settings", "model": "gpt-4o-mini"})).await;
    let settings = next_frame(&mut ws).await;
    assert_eq!(settings["type"], "settings");
    assert_eq!(settings["settings"]["model"], "gpt-4o-mini");
    assert_eq!(settings["settings"]["max_tokens"], 120);

    ws.send(Message::Text("{not json".into())).await.unwrap();
    let error = next_frame(&mut ws).await;
    assert_eq!(error["type"], "error");

    send(&mut ws, json!({"type": "chat", "content": "Buy 1 MSFT"})).await;
    assert_eq!(next_frame(&mut ws).await["type"], "processing");
    assert_eq!(next_frame(&mut ws).await["type"], "transcript");

    let requests = client.recorded();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].config.model.as_str(), "gpt-4o-mini");
    assert_eq!(requests[0].config.max_tokens, 120);
    assert_eq!(requests[0].config.temperature, 0.5);
}

#[tokio::test]
async fn failed_turn_reports_error_and_leaves_transcript() {
    let agent = Arc::new(agent_with(ScriptedClient::new(vec![Err("upstream down")])));
    let (mut ws, _server) = connect(agent).await;
    skip_greeting(&mut ws).await;

    send(&mut ws, json!({"type": "chat", "content": "Buy 1 AAPL"})).await;
    assert_eq!(next_frame(&mut ws).await["type"], "processing");
    let error = next_frame(&mut ws).await;
    assert_eq!(error["type"], "error");
    assert!(error["message"].as_str().unwrap().contains("upstream down"));

    send(&mut ws, json!({"type": "history"})).await;
    let transcript = next_frame(&mut ws).await;
    assert_eq!(transcript["type"], "transcript");
    assert_eq!(transcript["messages"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn disconnect_discards_the_session() {
    let agent = Arc::new(agent_with(ScriptedClient::new(vec![Ok(FENCED_BUY)])));
    let (mut ws, server) = connect(agent.clone()).await;
    skip_greeting(&mut ws).await;

    send(&mut ws, json!({"type": "chat", "content": "Buy 10 shares of AAPL"})).await;
    assert_eq!(next_frame(&mut ws).await["type"], "processing");
    assert_eq!(next_frame(&mut ws).await["type"], "transcript");
    assert_eq!(agent.session_count().await, 1);

    ws.close(None).await.unwrap();
    timeout(Duration::from_secs(5), server).await.expect("connection handler exits").unwrap();
    assert_eq!(agent.session_count().await, 0);
}
