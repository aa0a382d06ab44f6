use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::env;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RpcResponse<T> {
    Success { result: T },
    Error { error: RpcError },
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[allow(dead_code)]
    code: i64,
    #[allow(dead_code)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct AssetTransfersResult {
    transfers: Vec<RawTransfer>,
    #[serde(rename = "pageKey", default)]
    page_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTransfer {
    hash: String,
    from: String,
    to: Option<String>,
    asset: Option<String>,
    value: Option<f64>,
    #[allow(dead_code)]
    category: String,
    metadata: Metadata,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(rename = "blockTimestamp")]
    block_timestamp: String,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();

    let network = env::var("NETWORK").unwrap_or_else(|_| "eth-mainnet".to_string());
    let api_key = env::var("TRANSFER_API_KEY").expect("TRANSFER_API_KEY must be set");
    let wallet = env::var("WALLET_ADDRESS").expect("WALLET_ADDRESS must be set");

    let url = format!("https://{}.g.alchemy.com/v2/{}", network, api_key);
    let client = Client::new();

    println!("Fetching first incoming transfer page for {}...", wallet);

    let res: RpcResponse<AssetTransfersResult> = client
        .post(&url)
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "alchemy_getAssetTransfers",
            "params": [{
                "fromBlock": "0x0",
                "toBlock": "latest",
                "toAddress": wallet,
                "category": ["external", "erc20"],
                "withMetadata": true,
                "order": "desc",
                "maxCount": "0x14"
            }]
        }))
        .send()
        .await?
        .json()
        .await?;

    match res {
        RpcResponse::Success { result } => {
            println!("Fetched {} transfers", result.transfers.len());
            for t in result.transfers.iter().take(5) {
                println!(
                    "Tx: {} | {} | From: {} | To: {:?} | {:?} {:?}",
                    t.hash, t.metadata.block_timestamp, t.from, t.to, t.value, t.asset
                );
            }
            println!("Next page key: {:?}", result.page_key);
        }
        RpcResponse::Error { error } => {
            eprintln!("RPC error while fetching transfers: {:?}", error);
        }
    }

    Ok(())
}
