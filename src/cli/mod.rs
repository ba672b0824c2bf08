use clap::Parser;
use crate::config::model::{ ModelConfig, ModelConfigError, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Chat LLM Provider Args ---
    /// API key for the OpenAI chat completions API
    #[arg(long, env = "OPENAI_API_KEY", default_value = "", hide_env_values = true)]
    pub openai_api_key: String,

    /// Base URL for the OpenAI-compatible API (defaults to https://api.openai.com)
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub openai_base_url: Option<String>,

    /// Default model for new sessions (gpt-3.5-turbo, gpt-4o-mini)
    #[arg(long, env = "CHAT_MODEL", default_value = "gpt-3.5-turbo")]
    pub chat_model: String,

    /// Default sampling temperature for new sessions (0.0 to 1.0)
    #[arg(long, env = "CHAT_TEMPERATURE", default_value_t = DEFAULT_TEMPERATURE)]
    pub chat_temperature: f32,

    /// Default completion token limit for new sessions (60 to 240)
    #[arg(long, env = "CHAT_MAX_TOKENS", default_value_t = DEFAULT_MAX_TOKENS)]
    pub chat_max_tokens: u32,

    // --- Prompt / Session Args ---
    /// Optional JSON file overriding `system_preamble` and/or `trade_conversion`.
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    /// Page name used to key conversations. Spaces are replaced with '_'.
    #[arg(long, env = "PAGE_NAME", default_value = "Sentiment Analysis")]
    pub page_name: String,

    // --- Server Args ---
    /// Host address and port for the WebSocket server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Port for the JSON HTTP API. The API is disabled when unset.
    #[arg(long, env = "HTTP_PORT")]
    pub http_port: Option<u16>,

    /// Optional shared secret. When set, WebSocket clients must sign the handshake.
    #[arg(long, env = "SERVER_API_KEY", hide_env_values = true)]
    pub server_api_key: Option<String>,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,

    // --- General App Args ---
    /// Run an interactive console session instead of the servers.
    #[arg(long, env = "CONSOLE", default_value = "false")]
    pub console: bool,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,
}

impl Args {
    pub fn default_model_config(&self) -> Result<ModelConfig, ModelConfigError> {
        ModelConfig::new(self.chat_model.parse()?, self.chat_temperature, self.chat_max_tokens)
    }

    pub fn tls_paths(&self) -> Option<(&str, &str)> {
        if !self.enable_tls {
            return None;
        }
        match (&self.tls_cert_path, &self.tls_key_path) {
            (Some(cert), Some(key)) => Some((cert.as_str(), key.as_str())),
            _ => None,
        }
    }
}
