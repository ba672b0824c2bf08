pub mod agent;
pub mod cli;
pub mod config;
pub mod console;
pub mod history;
pub mod interpreter;
pub mod llm;
pub mod models;
pub mod normalizer;
pub mod render;
pub mod server;
pub mod session;

use agent::TradeAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Mode: {}", if args.console { "console" } else { "server" });
    info!("Page Name: {}", args.page_name);
    info!("Default Model: {}", args.chat_model);
    info!("Default Temperature: {}", args.chat_temperature);
    info!("Default Max Tokens: {}", args.chat_max_tokens);
    info!("OpenAI Base URL: {}", args.openai_base_url.as_deref().unwrap_or("default"));
    info!("OpenAI API Key Set: {}", !args.openai_api_key.is_empty());
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("built-in"));
    if !args.console {
        info!("Server Address: {}", args.server_addr);
        info!("HTTP Port: {:?}", args.http_port);
        info!("TLS Enabled: {}", args.enable_tls);
    }
    info!("-------------------------");

    let agent = Arc::new(TradeAgent::new(&args)?);

    if args.console {
        return console::run_console(&agent).await;
    }

    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, agent, args.server_api_key.clone(), args.clone());
    server.run().await
}
