pub mod agent;
pub mod cli;
pub mod config;
pub mod llm;
pub mod models;
pub mod server;
pub mod widget;

use agent::AssistantAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat Model: {}", args.chat_model);
    info!("Chat Base URL: {}", args.chat_base_url);
    info!("HTTP Port: {:?}", args.http_port);
    info!("Handshake Auth: {}", args.server_api_key.is_some());
    info!("-------------------------");

    let agent = Arc::new(AssistantAgent::new(&args)?);
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, agent, args);
    server.run().await?;

    Ok(())
}
