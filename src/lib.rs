pub mod cli;
pub mod config;
pub mod llm;
pub mod models;
pub mod page;
pub mod server;
pub mod stream;

use cli::Args;
use config::{ ChatSettings, ProviderConfig };
use llm::chat::new_client as new_chat_client;
use log::{ info, warn };
use server::api::AppState;
use server::Server;
use std::error::Error;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let provider = ProviderConfig::from_args(&args)?;
    let settings = ChatSettings::from_args(&args);

    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Provider Base URL: {}", provider.base_url);
    info!("Chat Model: {}", provider.model);
    info!("Max Duration: {}s", settings.max_duration.as_secs());
    info!("Send Reasoning: {}", settings.send_reasoning);
    info!("Send Sources: {}", settings.send_sources);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    if !provider.has_api_key() {
        warn!("OPENROUTER_API_KEY is not set; provider requests will fail authentication.");
    }

    let client = new_chat_client(&provider)?;
    let state = AppState::new(client, settings);

    info!("Starting server on: {}", args.server_addr);
    let server = Server::new(args.server_addr.clone(), state, args.clone());
    server.run().await?;

    Ok(())
}
