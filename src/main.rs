mod aggregator;
mod api;
mod config;
mod error;
mod format;
mod models;
mod provider;

use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use aggregator::TransactionAggregator;
use provider::HttpProvider;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stdout)
        .with_target(false)
        .init();

    info!("Wallet history aggregator starting...");

    let cfg = config::load()?;
    info!("  Network: {}", cfg.network);
    info!("  Wallet: {}", cfg.wallet_address);
    info!("  Contract: {:?}", cfg.contract_address);
    info!("  Port: {}", cfg.port);

    let provider = HttpProvider::new(
        &cfg.network,
        &cfg.api_key,
        &cfg.wallet_address,
        cfg.contract_address.as_deref(),
    )?;

    let agg = Arc::new(TransactionAggregator::new(
        provider,
        &cfg.network,
        &cfg.wallet_address,
        cfg.contract_address.as_deref(),
        cfg.page_size,
    )?);

    // Warm the history so the first API read has data.
    let prefetch_handle = tokio::spawn({
        let agg = Arc::clone(&agg);
        let pages = cfg.prefetch_pages;
        async move {
            for _ in 0..pages {
                if agg.is_at_last_page() {
                    break;
                }
                if let Err(e) = agg.load_more().await {
                    warn!("Prefetch page failed: {:?}", e);
                    break;
                }
            }
            info!(
                "Prefetch done: {} pages, {} transactions, at last page: {}",
                agg.pages_loaded(),
                agg.get_ordered_transactions().len(),
                agg.is_at_last_page()
            );
        }
    });

    let api_handle = tokio::spawn({
        let cfg = cfg.clone();
        let agg = Arc::clone(&agg);
        async move { api::serve(cfg, agg).await }
    });

    tokio::select! {
        res = api_handle => match res {
            Ok(Ok(_)) => info!("API exited cleanly"),
            Ok(Err(e)) => error!("API error: {:?}", e),
            Err(e) => error!("API task panicked: {:?}", e),
        },
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received, stopping...");
        }
    }

    prefetch_handle.abort();
    info!("Wallet history aggregator stopped.");
    Ok(())
}
