use shop_agent_orchestrator::{
    agent::ChatOrchestrator,
    api::start_server,
    catalog::{CatalogSearch, CatalogStore},
    config::Settings,
    oracle::OpenAiChatClient,
    rates::{ExchangeRateClient, HttpRateProvider},
    tools::ToolExecutor,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    // Refuses to start on missing or malformed credentials.
    let settings = Settings::from_env()?;

    info!("Shopping Assistant Orchestrator - API Server");
    info!("Port: {}", settings.port);

    // The catalog must be fully loaded before any search traffic.
    let store = Arc::new(CatalogStore::load(&settings.catalog_path)?);
    let catalog = Arc::new(CatalogSearch::new(store));

    let provider = Arc::new(HttpRateProvider::new(settings.exchange_rate_api_key.clone()));
    let rates = Arc::new(ExchangeRateClient::new(provider, settings.cache_ttl));

    let oracle = Arc::new(OpenAiChatClient::new(settings.openai_api_key.clone()));
    let executor = ToolExecutor::new(catalog, rates);
    let orchestrator = Arc::new(ChatOrchestrator::new(oracle, executor));

    info!("Orchestrator initialized");
    info!("Starting API server...");

    start_server(orchestrator, settings.port).await?;

    Ok(())
}
