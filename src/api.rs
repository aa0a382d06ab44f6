use axum::{
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::aggregator::TransactionAggregator;
use crate::config::Config;
use crate::error::AggregatorError;
use crate::provider::HttpProvider;

pub type SharedAggregator = Arc<TransactionAggregator<HttpProvider>>;

#[derive(Serialize)]
struct HistoryStatus {
    pages_loaded: usize,
    at_last_page: bool,
    transactions: usize,
}

pub async fn serve(cfg: Config, agg: SharedAggregator) -> eyre::Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(|| async { "Wallet history API running" }))
        .route("/transactions", get({
            let agg = Arc::clone(&agg);
            move || {
                let agg = Arc::clone(&agg);
                async move { Json(agg.get_ordered_transactions()) }
            }
        }))
        .route("/transactions/load", post({
            let agg = Arc::clone(&agg);
            move || {
                let agg = Arc::clone(&agg);
                async move { load_page(agg).await }
            }
        }))
        .route("/transactions/status", get({
            let agg = Arc::clone(&agg);
            move || {
                let agg = Arc::clone(&agg);
                async move {
                    Json(HistoryStatus {
                        pages_loaded: agg.pages_loaded(),
                        at_last_page: agg.is_at_last_page(),
                        transactions: agg.get_ordered_transactions().len(),
                    })
                }
            }
        }))
        .layer(cors);

    let addr = SocketAddr::from(([127, 0, 0, 1], cfg.port));
    info!("API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

async fn load_page(agg: SharedAggregator) -> StatusCode {
    match agg.load_more().await {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(e @ AggregatorError::Fetch(_)) => {
            error!("Load more failed: {:?}", e);
            StatusCode::BAD_GATEWAY
        }
        Err(e) => {
            error!("Load more failed: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
