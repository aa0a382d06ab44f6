// src/models.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One leg of an on-chain transaction: an external ETH transfer or an
/// ERC-20 log transfer. A single transaction hash may produce several
/// of these (e.g. the external leg plus its token-log counterpart).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub hash: String,
    pub from: String,
    pub to: Option<String>,       // contract creations have no `to`
    pub value: Option<Decimal>,   // decimal-adjusted by the feed, absent for some categories
    pub asset: Option<String>,    // "ETH", token symbol, or absent
    pub category: String,         // "external" | "erc20" | ...
    #[serde(rename = "rawContract", default)]
    pub raw_contract: Option<RawContract>,
    pub metadata: TransferMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawContract {
    pub value: Option<String>,    // hex raw units
    pub address: Option<String>,
    pub decimal: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferMetadata {
    /// ISO-8601 block timestamp. Required: ordering is derived from it.
    #[serde(rename = "blockTimestamp")]
    pub block_timestamp: String,
}

/// Enriched per-hash details (gas, nonce, input, ...), fetched in batch
/// separately from the transfer feeds. Quantities stay as hex strings,
/// same as they arrive on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub hash: String,
    pub nonce: String,
    pub from: String,
    pub to: Option<String>,
    pub value: String,
    pub gas: String,
    #[serde(rename = "gasPrice", default)]
    pub gas_price: Option<String>,
    pub input: String,
    #[serde(rename = "blockNumber", default)]
    pub block_number: Option<String>,
}

/// One page of a transfer feed. `next_cursor = None` means the feed is
/// exhausted and must not be fetched again.
#[derive(Debug, Clone)]
pub struct TransferPage {
    pub transfers: Vec<Transfer>,
    pub next_cursor: Option<String>,
}

impl TransferPage {
    pub fn empty() -> Self {
        Self { transfers: Vec::new(), next_cursor: None }
    }
}

/// Which side of the wallet a feed covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Incoming => "incoming",
            Direction::Outgoing => "outgoing",
        }
    }
}

/// Pagination cursor for one feed. The three states are load-bearing:
/// `Start` fetches unconditionally (no token), `Next` fetches with the
/// token, `Exhausted` is the explicit null sentinel and never fetches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PageCursor {
    #[default]
    Start,
    Next(String),
    Exhausted,
}

impl PageCursor {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, PageCursor::Exhausted)
    }

    /// Token to send with the next fetch, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            PageCursor::Next(k) => Some(k),
            _ => None,
        }
    }

    /// New cursor state from a page response.
    pub fn from_response(next: Option<String>) -> Self {
        match next {
            Some(k) => PageCursor::Next(k),
            None => PageCursor::Exhausted,
        }
    }
}

/// Net direction of a whole transaction from the wallet's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxDirection {
    Sent,
    Received,
    SelfTransfer,
}

/// The output type: a grouped transaction record merged with its
/// (possibly absent) signed details and wallet/network context.
#[derive(Debug, Clone, Serialize)]
pub struct FullTransaction {
    pub hash: String,
    pub timestamp: DateTime<Utc>,
    pub direction: TxDirection,
    pub net_value: Decimal,
    pub asset: Option<String>,
    pub transfers: Vec<Transfer>,
    pub signed: Option<SignedTransaction>,
    pub wallet: String,
    pub contract: Option<String>,
    pub network: String,          // display network (supported fallback applied)
}
