pub mod api;
pub mod auth;
pub mod websocket;

use crate::agent::TradeAgent;
use crate::cli::Args;
use log::{ info, warn };
use std::error::Error;
use std::sync::Arc;

pub struct Server {
    addr: String,
    agent: Arc<TradeAgent>,
    api_key: Option<String>,
    args: Args,
}

impl Server {
    pub fn new(addr: String, agent: Arc<TradeAgent>, api_key: Option<String>, args: Args) -> Self {
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        if api_key.is_some() {
            info!("Server configured with signed handshake authentication.");
        } else {
            warn!("Server configured WITHOUT API Key authentication. Connections are open.");
        }

        Self { addr, agent, api_key, args }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        if let Some(http_port) = self.args.http_port {
            self.start_http_server(http_port).await?;
        }

        self.start_ws_server().await
    }

    async fn start_http_server(&self, http_port: u16) -> Result<(), Box<dyn Error + Send + Sync>> {
        api::start_http_server(
            http_port,
            Arc::clone(&self.agent),
            self.api_key.clone(),
            self.args.clone()
        ).await
    }

    async fn start_ws_server(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        websocket::start_ws_server(
            &self.addr,
            Arc::clone(&self.agent),
            self.api_key.clone(),
            self.args.clone()
        ).await
    }
}
