// src/format.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::AggregatorError;
use crate::models::{FullTransaction, SignedTransaction, Transfer, TxDirection};
use crate::provider::SUPPORTED_NETWORKS;

/// Wallet/network context stamped onto every built transaction.
#[derive(Debug, Clone)]
pub struct WalletContext {
    pub wallet: String,
    pub contract: Option<String>,
    pub network: String,
}

/// Parse a feed block timestamp. A missing or unparseable timestamp is a
/// data-integrity fault: it would corrupt all downstream ordering.
pub fn parse_block_timestamp(raw: &str) -> Result<DateTime<Utc>, AggregatorError> {
    if raw.trim().is_empty() {
        return Err(AggregatorError::MalformedData(
            "missing block timestamp".to_string(),
        ));
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AggregatorError::MalformedData(format!("bad block timestamp {raw:?}: {e}")))
}

/// Display network for a transaction. Custom/unsupported networks fall
/// back to the nearest supported one purely for presentation; stored
/// data is never rewritten.
pub fn display_network(network: &str) -> &str {
    if SUPPORTED_NETWORKS.contains(&network) {
        return network;
    }
    match network {
        n if n.starts_with("polygon") => "polygon-mainnet",
        n if n.starts_with("arb") => "arb-mainnet",
        n if n.starts_with("opt") => "opt-mainnet",
        n if n.starts_with("base") => "base-mainnet",
        _ => "eth-mainnet",
    }
}

fn is_wallet(addr: Option<&str>, wallet: &str) -> bool {
    addr.map(|a| a.eq_ignore_ascii_case(wallet)).unwrap_or(false)
}

/// Merge a grouped transfer record with its (possibly absent) signed
/// details into the output type.
pub fn build_full_transaction(
    hash: &str,
    timestamp: DateTime<Utc>,
    transfers: &[Transfer],
    signed: Option<&SignedTransaction>,
    ctx: &WalletContext,
) -> FullTransaction {
    let mut sent = false;
    let mut received = false;
    for leg in transfers {
        if is_wallet(leg.to.as_deref(), &ctx.wallet) {
            received = true;
        }
        if is_wallet(Some(leg.from.as_str()), &ctx.wallet) {
            sent = true;
        }
    }

    // Net only the legs of the lead asset. An external ETH leg and its
    // ERC-20 log counterpart carry different units and must not be
    // summed into one total.
    let asset: Option<String> = transfers.iter().find_map(|leg| leg.asset.clone());
    let mut inbound = Decimal::ZERO;
    let mut outbound = Decimal::ZERO;
    for leg in transfers.iter().filter(|leg| leg.asset == asset) {
        let value = leg.value.unwrap_or(Decimal::ZERO);
        if is_wallet(leg.to.as_deref(), &ctx.wallet) {
            inbound += value;
        }
        if is_wallet(Some(leg.from.as_str()), &ctx.wallet) {
            outbound += value;
        }
    }

    let direction = match (sent, received) {
        (true, true) => TxDirection::SelfTransfer,
        (true, false) => TxDirection::Sent,
        _ => TxDirection::Received,
    };

    FullTransaction {
        hash: hash.to_string(),
        timestamp,
        direction,
        net_value: inbound - outbound,
        asset,
        transfers: transfers.to_vec(),
        signed: signed.cloned(),
        wallet: ctx.wallet.clone(),
        contract: ctx.contract.clone(),
        network: display_network(&ctx.network).to_string(),
    }
}
