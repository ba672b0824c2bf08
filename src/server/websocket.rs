use crate::agent::TradeAgent;
use crate::cli::Args;
use crate::config::model::ChatModel;
use crate::models::websocket::{ ClientMessage, ServerMessage };
use crate::server::auth::{ query_params, verify_signature };
use crate::session::SessionContext;

use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{ AsyncRead, AsyncWrite };
use tokio::net::TcpListener;

use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::tungstenite::handshake::server::{ ErrorResponse, Request, Response };
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{ accept_hdr_async, WebSocketStream };

use rustls::pki_types::{ CertificateDer, PrivateKeyDer };
use rustls::ServerConfig;
use rustls_pemfile::{ certs, pkcs8_private_keys };

use chrono::Utc;

use futures::{ Sink, SinkExt, StreamExt };
use log::{ debug, error, info, warn };

const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

pub fn load_tls_config(
    cert_path: &str,
    key_path: &str
) -> Result<Arc<ServerConfig>, Box<dyn Error + Send + Sync>> {
    let cert_file = File::open(cert_path).map_err(|e|
        format!("Failed to open TLS certificate file '{}': {}", cert_path, e)
    )?;
    let key_file = File::open(key_path).map_err(|e|
        format!("Failed to open TLS key file '{}': {}", key_path, e)
    )?;

    let mut cert_reader = BufReader::new(cert_file);
    let mut key_reader = BufReader::new(key_file);
    let cert_chain: Vec<CertificateDer<'static>> = certs(&mut cert_reader)
        .collect::<Result<_, _>>()
        .map_err(|e| format!("Failed to read certificate(s): {}", e))?;

    let mut keys = pkcs8_private_keys(&mut key_reader);
    let key = match keys.next() {
        Some(Ok(k)) => PrivateKeyDer::Pkcs8(k),
        Some(Err(e)) => {
            return Err(format!("Error reading private key: {}", e).into());
        }
        None => {
            return Err("No PKCS8 private key found in key file".into());
        }
    };

    // Both ring and aws-lc-rs end up in the dependency graph, so the provider
    // has to be named explicitly.
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)?;
    Ok(Arc::new(config))
}

fn unauthorized(reason: &str) -> ErrorResponse {
    let mut resp = ErrorResponse::new(Some(reason.to_string()));
    *resp.status_mut() = StatusCode::UNAUTHORIZED;
    resp
}

pub async fn start_ws_server(
    addr: &str,
    agent: Arc<TradeAgent>,
    api_key: Option<String>,
    args: Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    let tls_acceptor = if args.enable_tls {
        match (&args.tls_cert_path, &args.tls_key_path) {
            (Some(cert_path), Some(key_path)) => {
                info!(
                    "TLS enabled. Loading certificate from '{}' and key from '{}'",
                    cert_path,
                    key_path
                );
                let config = load_tls_config(cert_path, key_path)?;
                Some(TlsAcceptor::from(config))
            }
            (Some(_), None) | (None, Some(_)) => {
                error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
                return Err("Missing TLS certificate or key path".into());
            }
            (None, None) => {
                error!("--enable-tls was set but no certificate/key paths provided.");
                return Err("TLS enabled without cert/key".into());
            }
        }
    } else {
        info!("TLS not enabled. Running plain WebSocket (WS) server.");
        None
    };
    let protocol = if tls_acceptor.is_some() { "WSS" } else { "WS" };
    info!("{} server listening on: {}", protocol, addr);

    loop {
        let (stream, peer) = listener.accept().await?;
        info!("Incoming connection from: {}", peer);
        let agent_clone = Arc::clone(&agent);
        let required_api_key = api_key.clone();
        let tls_acceptor_clone = tls_acceptor.clone();

        tokio::spawn(async move {
            let process_result = if let Some(acceptor) = tls_acceptor_clone {
                match acceptor.accept(stream).await {
                    Ok(tls_stream) => {
                        info!("TLS handshake successful for {}", peer);
                        process_connection(peer, tls_stream, agent_clone, required_api_key).await
                    }
                    Err(e) => {
                        error!("TLS handshake error for {}: {}", peer, e);
                        Err(Box::new(e) as Box<dyn Error + Send + Sync>)
                    }
                }
            } else {
                process_connection(peer, stream, agent_clone, required_api_key).await
            };

            if let Err(e) = process_result {
                error!("Failed to process connection for {}: {}", peer, e);
            }
        });
    }
}

async fn process_connection<S>(
    peer: SocketAddr,
    stream: S,
    agent: Arc<TradeAgent>,
    required_api_key: Option<String>
) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    let auth_callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let secret = match &required_api_key {
            Some(k) if !k.is_empty() => k,
            _ => {
                return Ok(response);
            }
        };

        let params = query_params(req.uri().query());
        match verify_signature(secret, &params, Utc::now().timestamp()) {
            Ok(()) => {
                info!("{} authenticated", peer);
                Ok(response)
            }
            Err(reason) => {
                warn!("{}: handshake rejected ({})", peer, reason);
                Err(unauthorized(reason))
            }
        }
    };

    match accept_hdr_async(stream, auth_callback).await {
        Ok(ws) => {
            handle_connection(peer, ws, agent).await;
            Ok(())
        }
        Err(e) => {
            error!("Handshake failed for {}: {}", peer, e);
            Err(Box::new(e) as _)
        }
    }
}

async fn send_frame<T>(tx: &mut T, peer: SocketAddr, frame: &ServerMessage) -> bool
    where T: Sink<Message> + Unpin, T::Error: std::fmt::Display
{
    let json = match serde_json::to_string(frame) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize frame for {}: {}", peer, e);
            return false;
        }
    };
    match tx.send(Message::Text(json)).await {
        Ok(()) => true,
        Err(e) => {
            error!("Error sending frame to {}: {}", peer, e);
            false
        }
    }
}

async fn transcript_frame(agent: &TradeAgent, ctx: &SessionContext) -> ServerMessage {
    match agent.transcript(ctx).await {
        Ok(messages) =>
            ServerMessage::Transcript {
                messages,
                timestamp: Utc::now().timestamp(),
            },
        Err(e) =>
            ServerMessage::Error {
                message: format!("Failed to load conversation: {}", e),
            },
    }
}

/// Handles one client frame. Returns `false` when the connection should close.
async fn handle_client_message<T>(
    tx: &mut T,
    peer: SocketAddr,
    agent: &TradeAgent,
    ctx: &mut SessionContext,
    message: ClientMessage
) -> bool
    where T: Sink<Message> + Unpin, T::Error: std::fmt::Display
{
    match message {
        ClientMessage::Chat { content } => {
            if !send_frame(tx, peer, &ServerMessage::Processing).await {
                return false;
            }
            let frame = match agent.process_instruction(ctx, &content).await {
                Ok(_) => transcript_frame(agent, ctx).await,
                Err(e) => {
                    error!("Agent processing error for {}: {}", peer, e);
                    ServerMessage::Error {
                        message: format!("Error processing message: {}", e),
                    }
                }
            };
            send_frame(tx, peer, &frame).await
        }
        ClientMessage::Settings { model, temperature, max_tokens } => {
            let frame = match ctx.update_settings(model.as_deref(), temperature, max_tokens) {
                Ok(settings) => {
                    info!("Settings for {} updated: {:?}", ctx.key, settings);
                    ServerMessage::Settings { settings }
                }
                Err(e) => ServerMessage::Error {
                    message: format!("Invalid settings: {}", e),
                },
            };
            send_frame(tx, peer, &frame).await
        }
        ClientMessage::History => {
            let frame = transcript_frame(agent, ctx).await;
            send_frame(tx, peer, &frame).await
        }
    }
}

pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    agent: Arc<TradeAgent>
)
    where S: AsyncRead + AsyncWrite + Unpin
{
    let (mut tx, mut rx) = websocket.split();
    let mut ctx = agent.open_session(None);
    if let Err(e) = agent.start_session(&ctx).await {
        error!("Failed to start session for {}: {}", peer, e);
        return;
    }
    info!("Assigned session {} to {}", ctx.key, peer);

    let hello = ServerMessage::Session {
        session_id: ctx.key.token().to_string(),
        settings: ctx.model_config,
        models: ChatModel::names().into_iter().map(String::from).collect(),
    };
    if send_frame(&mut tx, peer, &hello).await {
        let initial = transcript_frame(&agent, &ctx).await;
        send_frame(&mut tx, peer, &initial).await;
    }

    while let Some(msg) = rx.next().await {
        match msg {
            Ok(message) => {
                if message.len() > MAX_MESSAGE_SIZE {
                    warn!(
                        "Message from {} exceeds size limit ({} > {})",
                        peer,
                        message.len(),
                        MAX_MESSAGE_SIZE
                    );
                    let error_msg = ServerMessage::Error {
                        message: "Message too large".to_string(),
                    };
                    send_frame(&mut tx, peer, &error_msg).await;
                    break;
                }

                match message {
                    Message::Text(text) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                debug!("Frame from {}: {:?}", peer, client_msg);
                                let keep_open = handle_client_message(
                                    &mut tx,
                                    peer,
                                    &agent,
                                    &mut ctx,
                                    client_msg
                                ).await;
                                if !keep_open {
                                    break;
                                }
                            }
                            Err(e) => {
                                error!("Failed to parse message from {}: {}", peer, e);
                                let error_msg = ServerMessage::Error {
                                    message: format!("Failed to parse message: {}", e),
                                };
                                if !send_frame(&mut tx, peer, &error_msg).await {
                                    break;
                                }
                            }
                        }
                    }
                    Message::Close(_) => {
                        info!("Received close frame from {}", peer);
                        break;
                    }
                    Message::Ping(ping_data) => {
                        if tx.send(Message::Pong(ping_data)).await.is_err() {
                            error!("Failed to send pong to {}", peer);
                            break;
                        }
                    }
                    Message::Pong(_) => {}
                    Message::Binary(_) => {
                        warn!("Ignoring binary message from {}", peer);
                    }
                    Message::Frame(_) => {}
                }
            }
            Err(e) => {
                match e {
                    | tokio_tungstenite::tungstenite::Error::ConnectionClosed
                    | tokio_tungstenite::tungstenite::Error::Protocol(_)
                    | tokio_tungstenite::tungstenite::Error::Utf8 => {
                        info!("WebSocket connection closed or protocol error for {}: {}", peer, e);
                    }
                    tokio_tungstenite::tungstenite::Error::Io(ref io_err) if
                        io_err.kind() == std::io::ErrorKind::ConnectionReset
                    => {
                        info!("WebSocket connection reset by peer {}", peer);
                    }
                    _ => {
                        error!("Error receiving message from {}: {}", peer, e);
                    }
                }
                break;
            }
        }
    }

    if let Err(e) = agent.close_session(&ctx).await {
        error!("Failed to discard session {}: {}", ctx.key, e);
    }
    info!("WebSocket connection closed for {} (Session: {})", peer, ctx.key);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> String {
        format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
    }

    #[test]
    fn loads_pem_pair_into_server_config() {
        let config = load_tls_config(&fixture("cert.pem"), &fixture("key.pem")).unwrap();
        assert!(config.alpn_protocols.is_empty());
    }

    #[test]
    fn reports_missing_or_swapped_tls_files() {
        let err = load_tls_config(&fixture("missing.pem"), &fixture("key.pem")).unwrap_err();
        assert!(err.to_string().contains("missing.pem"));

        let err = load_tls_config(&fixture("cert.pem"), &fixture("cert.pem")).unwrap_err();
        assert!(err.to_string().contains("No PKCS8 private key"));
    }

    #[test]
    fn unauthorized_response_carries_reason() {
        let resp = unauthorized("missing ts/sig");
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(resp.body().as_deref(), Some("missing ts/sig"));
    }
}
