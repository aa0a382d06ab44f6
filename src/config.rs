use dotenvy::dotenv;
use eyre::{eyre, Result};
use std::env;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Config {
    pub network: String,
    pub wallet_address: String,
    pub contract_address: Option<String>,
    pub api_key: String,
    pub page_size: Option<usize>,
    pub prefetch_pages: usize,
    pub port: u16,
}

pub fn load() -> Result<Config> {
    dotenv().ok();

    // Network slug, e.g. eth-mainnet / eth-sepolia (default: eth-mainnet)
    let network = env::var("NETWORK").unwrap_or_else(|_| "eth-mainnet".to_string());

    // Wallet whose history is aggregated (required)
    let wallet_address = env::var("WALLET_ADDRESS")
        .map_err(|_| eyre!("WALLET_ADDRESS must be set"))?;

    // Optional token contract filter
    let contract_address = env::var("CONTRACT_ADDRESS").ok().filter(|s| !s.is_empty());

    // Transfer API key (empty key means the source reports unavailable)
    let api_key = env::var("TRANSFER_API_KEY").unwrap_or_default();

    // Requested transactions per page (engine default applies when unset)
    let page_size = env::var("PAGE_SIZE").ok().and_then(|s| s.parse().ok());

    // Pages to prefetch at startup (default: 3)
    let prefetch_pages = env::var("PREFETCH_PAGES")
        .unwrap_or_else(|_| "3".to_string())
        .parse()
        .unwrap_or(3);

    // API port (default: 8080)
    let port = env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);

    let cfg = Config {
        network,
        wallet_address,
        contract_address,
        api_key,
        page_size,
        prefetch_pages,
        port,
    };

    info!("Loaded config: {:?}", cfg);

    Ok(cfg)
}
