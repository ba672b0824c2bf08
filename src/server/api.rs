use crate::agent::TradeAgent;
use crate::cli::Args;
use crate::config::model::{ ChatModel, ModelConfig };
use crate::render::RenderedMessage;
use crate::server::auth::{ query_params, verify_signature };
use crate::server::websocket::load_tls_config;
use axum::{
    extract::{ Path, Request, State },
    http::StatusCode,
    middleware::{ self, Next },
    response::{ IntoResponse, Response },
    routing::{ delete, get, post },
    Json,
    Router,
};
use chrono::Utc;
use log::{ error, info, warn };
use serde::{ Deserialize, Serialize };
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{ Any, CorsLayer };

#[derive(Deserialize)]
pub struct InstructionRequest {
    pub instruction: String,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Serialize, Deserialize)]
pub struct TranscriptResponse {
    pub session_id: String,
    pub settings: ModelConfig,
    pub messages: Vec<RenderedMessage>,
}

#[derive(Serialize)]
struct ModelsResponse {
    models: Vec<&'static str>,
    defaults: ModelConfig,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    sessions: usize,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(code: StatusCode, message: String) -> Response {
    (code, Json(ErrorBody { error: message })).into_response()
}

#[derive(Clone)]
struct AppState {
    agent: Arc<TradeAgent>,
    api_key: Option<String>,
}

/// Session routes require the same `ts`/`sig` query parameters as the
/// WebSocket handshake whenever an API key is configured.
async fn require_signature(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Some(secret) = state.api_key.as_deref() {
        let params = query_params(req.uri().query());
        if let Err(reason) = verify_signature(secret, &params, Utc::now().timestamp()) {
            warn!("HTTP request to {} rejected ({})", req.uri().path(), reason);
            return error_response(StatusCode::UNAUTHORIZED, reason.to_string());
        }
    }
    next.run(req).await
}

pub fn router(agent: Arc<TradeAgent>, api_key: Option<String>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let state = AppState {
        agent,
        api_key: api_key.filter(|k| !k.trim().is_empty()),
    };

    let sessions = Router::new()
        .route("/api/sessions/{token}/messages", get(messages_handler))
        .route("/api/sessions/{token}/instructions", post(instruction_handler))
        .route("/api/sessions/{token}", delete(delete_session_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_signature));

    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/models", get(models_handler))
        .merge(sessions)
        .layer(cors)
        .with_state(state)
}

pub async fn start_http_server(
    http_port: u16,
    agent: Arc<TradeAgent>,
    api_key: Option<String>,
    args: Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = format!("0.0.0.0:{}", http_port).parse::<SocketAddr>()?;
    let app = router(agent, api_key);

    if let Some((cert_path, key_path)) = args.tls_paths() {
        let mut server_config = (*load_tls_config(cert_path, key_path)?).clone();
        server_config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
        let tls_config = axum_server::tls_rustls::RustlsConfig::from_config(
            Arc::new(server_config)
        );
        info!("Starting HTTPS API server on: https://{}", addr);

        tokio::spawn(async move {
            let result = axum_server
                ::bind_rustls(addr, tls_config)
                .serve(app.into_make_service()).await;
            if let Err(e) = result {
                error!("HTTPS server error: {}", e);
            }
        });
    } else {
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            format!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e)
        })?;
        info!("Starting HTTP API server on: http://{}", addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                error!("HTTP server error: {}", e);
            }
        });
    }

    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        sessions: state.agent.session_count().await,
    })
}

async fn models_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(ModelsResponse {
        models: ChatModel::names(),
        defaults: state.agent.default_model_config(),
    })
}

async fn messages_handler(
    State(state): State<AppState>,
    Path(token): Path<String>
) -> Response {
    let ctx = state.agent.open_session(Some(&token));
    match state.agent.transcript(&ctx).await {
        Ok(messages) =>
            Json(TranscriptResponse {
                session_id: token,
                settings: ctx.model_config,
                messages,
            }).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn instruction_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<InstructionRequest>
) -> Response {
    let mut ctx = state.agent.open_session(Some(&token));
    if
        let Err(e) = ctx.update_settings(
            req.model.as_deref(),
            req.temperature,
            req.max_tokens
        )
    {
        return error_response(StatusCode::BAD_REQUEST, format!("Invalid settings: {}", e));
    }

    if let Err(e) = state.agent.process_instruction(&ctx, &req.instruction).await {
        error!("Instruction for {} failed: {}", ctx.key, e);
        return error_response(StatusCode::BAD_GATEWAY, format!("Model call failed: {}", e));
    }

    match state.agent.transcript(&ctx).await {
        Ok(messages) =>
            Json(TranscriptResponse {
                session_id: token,
                settings: ctx.model_config,
                messages,
            }).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn delete_session_handler(
    State(state): State<AppState>,
    Path(token): Path<String>
) -> Response {
    let ctx = state.agent.open_session(Some(&token));
    match state.agent.close_session(&ctx).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error_response(StatusCode::NOT_FOUND, format!("Unknown session {}", token)),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
