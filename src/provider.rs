// src/provider.rs
use async_trait::async_trait;
use eyre::{eyre, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use crate::models::{Direction, SignedTransaction, Transfer, TransferPage};

/// Networks the remote transfer API serves. Anything else is reported
/// unavailable and the aggregator stays empty for it.
pub const SUPPORTED_NETWORKS: &[&str] = &[
    "eth-mainnet",
    "eth-sepolia",
    "polygon-mainnet",
    "arb-mainnet",
    "opt-mainnet",
    "base-mainnet",
];

#[derive(Debug, Clone, Copy)]
pub struct Availability {
    pub available: bool,
}

/// Remote side of the aggregator: one page of a transfer feed, the
/// availability precondition, and the batched per-hash detail lookup.
#[async_trait]
pub trait TransferProvider: Send + Sync {
    async fn check_availability(&self) -> Availability;

    /// Fetch one page of the given feed. `cursor = None` means first page.
    /// `next_cursor = None` in the result means the feed is exhausted.
    async fn fetch_transfer_page(
        &self,
        direction: Direction,
        cursor: Option<&str>,
        capacity: usize,
    ) -> Result<TransferPage>;

    async fn fetch_signed_details_batch(
        &self,
        hashes: &[String],
    ) -> Result<Vec<SignedTransaction>>;
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RpcResponse<T> {
    Success { result: T },
    Error { error: RpcError },
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct AssetTransfersResult {
    transfers: Vec<Transfer>,
    #[serde(rename = "pageKey", default)]
    page_key: Option<String>,
}

/// JSON-RPC provider over an Alchemy-style endpoint.
pub struct HttpProvider {
    client: Client,
    network: String,
    endpoint: Option<String>,
    wallet: String,
    contract: Option<String>,
}

impl HttpProvider {
    pub fn new(
        network: &str,
        api_key: &str,
        wallet: &str,
        contract: Option<&str>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        let endpoint = if SUPPORTED_NETWORKS.contains(&network) && !api_key.is_empty() {
            Some(format!("https://{}.g.alchemy.com/v2/{}", network, api_key))
        } else {
            None
        };

        Ok(Self {
            client,
            network: network.to_string(),
            endpoint,
            wallet: wallet.to_string(),
            contract: contract.map(|c| c.to_string()),
        })
    }

    async fn rpc(&self, payload: &Value) -> Result<String> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| eyre!("no endpoint for network {}", self.network))?;

        let resp = self.client.post(endpoint).json(payload).send().await?;
        if resp.status() != StatusCode::OK {
            return Err(eyre!("RPC error: HTTP {}", resp.status()));
        }
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl TransferProvider for HttpProvider {
    async fn check_availability(&self) -> Availability {
        let available = self.endpoint.is_some();
        if !available {
            info!("Transfer API unavailable for network {}", self.network);
        }
        Availability { available }
    }

    async fn fetch_transfer_page(
        &self,
        direction: Direction,
        cursor: Option<&str>,
        capacity: usize,
    ) -> Result<TransferPage> {
        let mut filter = json!({
            "fromBlock": "0x0",
            "toBlock": "latest",
            "category": ["external", "erc20"],
            "withMetadata": true,
            "order": "desc",
            "maxCount": format!("0x{:x}", capacity),
        });

        match direction {
            Direction::Incoming => filter["toAddress"] = json!(self.wallet),
            Direction::Outgoing => filter["fromAddress"] = json!(self.wallet),
        }
        if let Some(contract) = &self.contract {
            filter["contractAddresses"] = json!([contract]);
        }
        if let Some(key) = cursor {
            filter["pageKey"] = json!(key);
        }

        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "alchemy_getAssetTransfers",
            "params": [filter]
        });

        info!(
            "📡 Fetching {} transfer page (cursor: {:?}, capacity {})",
            direction.as_str(),
            cursor,
            capacity
        );

        let text = self.rpc(&payload).await?;
        debug!("📩 Raw getAssetTransfers response: {}", text);

        let parsed: RpcResponse<AssetTransfersResult> = serde_json::from_str(&text)?;
        match parsed {
            RpcResponse::Success { result } => Ok(TransferPage {
                transfers: result.transfers,
                next_cursor: result.page_key,
            }),
            RpcResponse::Error { error } => {
                Err(eyre!("RPC error {}: {}", error.code, error.message))
            }
        }
    }

    async fn fetch_signed_details_batch(
        &self,
        hashes: &[String],
    ) -> Result<Vec<SignedTransaction>> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }

        let payload: Vec<Value> = hashes
            .iter()
            .enumerate()
            .map(|(i, hash)| {
                json!({
                    "jsonrpc": "2.0",
                    "id": i as u64 + 1,
                    "method": "eth_getTransactionByHash",
                    "params": [hash]
                })
            })
            .collect();

        info!("📡 Fetching signed details for {} hashes", hashes.len());

        let text = self.rpc(&json!(payload)).await?;
        debug!("📩 Raw batch response: {}", text);

        // Hashes the node no longer knows come back as null results; drop them.
        let parsed: Vec<RpcResponse<Option<SignedTransaction>>> = serde_json::from_str(&text)?;
        let mut details = Vec::with_capacity(parsed.len());
        for entry in parsed {
            match entry {
                RpcResponse::Success { result: Some(tx) } => details.push(tx),
                RpcResponse::Success { result: None } => {}
                RpcResponse::Error { error } => {
                    return Err(eyre!("RPC error {}: {}", error.code, error.message));
                }
            }
        }
        Ok(details)
    }
}
