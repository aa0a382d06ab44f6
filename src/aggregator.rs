// src/aggregator.rs
//
// Merges two independently paginated transfer feeds (incoming/outgoing)
// into one deduplicated, timestamp-descending transaction history. A
// "safe prefix" guarantee keeps partially-fetched transactions hidden:
// a hash is only exposed once all of its legs are known to be loaded.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use futures_util::future;
use tracing::{debug, info};

use crate::error::AggregatorError;
use crate::format::{build_full_transaction, parse_block_timestamp, WalletContext};
use crate::models::{
    Direction, FullTransaction, PageCursor, SignedTransaction, Transfer, TransferPage,
};
use crate::provider::TransferProvider;

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// A transfer with its timestamp parsed once, at the ingestion boundary.
/// Queue membership persists across drains; ordering passes iterate a
/// sorted snapshot instead of destructively popping.
#[derive(Debug, Clone)]
struct QueuedTransfer {
    timestamp: DateTime<Utc>,
    transfer: Transfer,
}

#[derive(Debug, Default)]
struct AggregatorState {
    queue: Vec<QueuedTransfer>,
    hash_to_transfers: HashMap<String, Vec<Transfer>>,
    hash_order: Vec<String>,
    /// Durable: deliberately exempt from the grouping/ordering cache
    /// invalidation cycle. Once fetched, never cleared.
    signed_details: HashMap<String, SignedTransaction>,
    incoming_cursor: PageCursor,
    outgoing_cursor: PageCursor,
    pages_loaded: usize,
    ordered_cache: Option<Vec<FullTransaction>>,
}

/// One aggregator per (network, wallet, contract) tuple. All caches live
/// for the instance's lifetime; no resource is shared across instances.
#[derive(Debug)]
pub struct TransactionAggregator<P: TransferProvider> {
    provider: P,
    ctx: WalletContext,
    page_size: usize,
    locked: AtomicBool,
    state: Mutex<AggregatorState>,
}

impl<P: TransferProvider> TransactionAggregator<P> {
    pub fn new(
        provider: P,
        network: &str,
        wallet: &str,
        contract: Option<&str>,
        page_size: Option<usize>,
    ) -> Result<Self, AggregatorError> {
        Address::from_str(wallet).map_err(|e| {
            AggregatorError::InvalidArgument(format!("bad wallet address {wallet:?}: {e}"))
        })?;
        if let Some(contract) = contract {
            Address::from_str(contract).map_err(|e| {
                AggregatorError::InvalidArgument(format!("bad contract address {contract:?}: {e}"))
            })?;
        }

        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            return Err(AggregatorError::InvalidArgument(
                "page size must be positive".to_string(),
            ));
        }

        Ok(Self {
            provider,
            ctx: WalletContext {
                wallet: wallet.to_string(),
                contract: contract.map(|c| c.to_string()),
                network: network.to_string(),
            },
            page_size,
            locked: AtomicBool::new(false),
            state: Mutex::new(AggregatorState::default()),
        })
    }

    /// Fetch at most one additional page from each feed and merge the
    /// results in. A call overlapping an in-flight one is a silent no-op
    /// (not queued, not retried). On any fetch failure nothing is merged:
    /// cursors, queue and caches are untouched and the call can simply
    /// be repeated.
    pub async fn load_more(&self) -> Result<(), AggregatorError> {
        // Cooperative non-blocking guard, released on every exit path.
        if self.locked.swap(true, Ordering::AcqRel) {
            debug!("load_more already in flight, skipping");
            return Ok(());
        }
        let result = self.load_more_inner().await;
        self.locked.store(false, Ordering::Release);
        result
    }

    async fn load_more_inner(&self) -> Result<(), AggregatorError> {
        let availability = self.provider.check_availability().await;
        if !availability.available {
            // Terminal but not fatal: the aggregator stays empty for
            // this network and the cursors remain uninitialized.
            info!(
                "Transfer source unavailable for {}, keeping history empty",
                self.ctx.network
            );
            return Ok(());
        }

        let (incoming_cursor, outgoing_cursor, known_hashes) = {
            let state = self.state.lock().unwrap();
            let known: HashSet<String> = state.signed_details.keys().cloned().collect();
            (
                state.incoming_cursor.clone(),
                state.outgoing_cursor.clone(),
                known,
            )
        };

        let capacity = self.page_capacity();
        let (incoming, outgoing) = future::join(
            self.fetch_feed(Direction::Incoming, &incoming_cursor, capacity),
            self.fetch_feed(Direction::Outgoing, &outgoing_cursor, capacity),
        )
        .await;

        // Either side failing fails the whole call; the succeeding half
        // is discarded and refetched with the same cursor next time.
        let incoming = incoming?;
        let outgoing = outgoing?;

        if incoming.is_none() && outgoing.is_none() {
            debug!("both feeds exhausted, nothing to fetch");
            return Ok(());
        }

        let mut fetched: Vec<Transfer> = Vec::new();
        if let Some(page) = &incoming {
            fetched.extend(page.transfers.iter().cloned());
        }
        if let Some(page) = &outgoing {
            fetched.extend(page.transfers.iter().cloned());
        }

        // Validate timestamps before touching any state so a malformed
        // record cannot leave a half-merged page behind.
        let mut queued = Vec::with_capacity(fetched.len());
        for transfer in fetched {
            let timestamp = parse_block_timestamp(&transfer.metadata.block_timestamp)?;
            queued.push(QueuedTransfer { timestamp, transfer });
        }

        let fresh_hashes = distinct_new_hashes(&queued, &known_hashes);
        let details = self
            .provider
            .fetch_signed_details_batch(&fresh_hashes)
            .await
            .map_err(AggregatorError::Fetch)?;

        let mut state = self.state.lock().unwrap();
        if let Some(page) = &incoming {
            state.incoming_cursor = PageCursor::from_response(page.next_cursor.clone());
        }
        if let Some(page) = &outgoing {
            state.outgoing_cursor = PageCursor::from_response(page.next_cursor.clone());
        }

        info!(
            "Merged {} incoming + {} outgoing transfers (page {})",
            incoming.as_ref().map_or(0, |p| p.transfers.len()),
            outgoing.as_ref().map_or(0, |p| p.transfers.len()),
            state.pages_loaded + 1
        );

        state.queue.extend(queued);
        for tx in details {
            state.signed_details.entry(tx.hash.clone()).or_insert(tx);
        }
        state.pages_loaded += 1;

        // New data invalidates the ordered cache; the next read rebuilds
        // the grouping from the queue. Signed details survive: they are
        // keyed 1:1 by hash and never go stale.
        state.ordered_cache = None;

        Ok(())
    }

    /// Per-feed fetch capacity: the requested page size, doubled so
    /// multi-leg transactions fit inside one page.
    fn page_capacity(&self) -> usize {
        self.page_size * 2
    }

    async fn fetch_feed(
        &self,
        direction: Direction,
        cursor: &PageCursor,
        capacity: usize,
    ) -> Result<Option<TransferPage>, AggregatorError> {
        if cursor.is_exhausted() {
            return Ok(None);
        }
        self.provider
            .fetch_transfer_page(direction, cursor.key(), capacity)
            .await
            .map(Some)
            .map_err(AggregatorError::Fetch)
    }

    /// True exactly when both feeds report no further pages.
    pub fn is_at_last_page(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.incoming_cursor.is_exhausted() && state.outgoing_cursor.is_exhausted()
    }

    pub fn pages_loaded(&self) -> usize {
        self.state.lock().unwrap().pages_loaded
    }

    /// The ordered, deduplicated, safely-truncated history. Cache-backed
    /// and infallible; callers receive an independent snapshot, so
    /// mutating the returned vector never touches internal state.
    pub fn get_ordered_transactions(&self) -> Vec<FullTransaction> {
        let mut state = self.state.lock().unwrap();
        if let Some(cache) = &state.ordered_cache {
            return cache.clone();
        }

        // Drain a sorted snapshot of the queue. The sort is stable, so
        // equal timestamps keep their insertion order.
        let mut snapshot = state.queue.clone();
        snapshot.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        state.hash_to_transfers.clear();
        state.hash_order.clear();
        let mut group_timestamps: HashMap<String, DateTime<Utc>> = HashMap::new();
        for queued in snapshot {
            let hash = queued.transfer.hash.clone();
            if !state.hash_to_transfers.contains_key(&hash) {
                state.hash_order.push(hash.clone());
                group_timestamps.insert(hash.clone(), queued.timestamp);
            }
            state
                .hash_to_transfers
                .entry(hash)
                .or_default()
                .push(queued.transfer);
        }

        let safe = self.safe_index(&state);
        let mut ordered = Vec::with_capacity(safe);
        for hash in &state.hash_order[..safe] {
            let Some(group) = state.hash_to_transfers.get(hash) else {
                continue;
            };
            if group.is_empty() {
                continue;
            }
            let Some(timestamp) = group_timestamps.get(hash) else {
                continue;
            };
            ordered.push(build_full_transaction(
                hash,
                *timestamp,
                group,
                state.signed_details.get(hash),
                &self.ctx,
            ));
        }

        state.ordered_cache = Some(ordered.clone());
        ordered
    }

    /// Prefix length of `hash_order` known to be fully loaded. Once both
    /// feeds are exhausted everything is final. Before that, cap at
    /// pages loaded times the per-feed page capacity and always reserve
    /// the most-recently-seen hash: its sibling leg may still sit on a
    /// page we have not fetched, and exposing it early would show an
    /// incomplete amount.
    fn safe_index(&self, state: &AggregatorState) -> usize {
        let len = state.hash_order.len();
        if state.incoming_cursor.is_exhausted() && state.outgoing_cursor.is_exhausted() {
            return len;
        }
        let estimate = state.pages_loaded * self.page_capacity();
        estimate.min(len.saturating_sub(1))
    }
}

fn distinct_new_hashes(queued: &[QueuedTransfer], known: &HashSet<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut hashes = Vec::new();
    for q in queued {
        let hash = &q.transfer.hash;
        if hash.is_empty() || known.contains(hash) {
            continue;
        }
        if seen.insert(hash.clone()) {
            hashes.push(hash.clone());
        }
    }
    hashes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawContract, TransferMetadata};
    use crate::provider::Availability;
    use async_trait::async_trait;
    use eyre::eyre;
    use rust_decimal::Decimal;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use tokio::sync::Semaphore;

    const WALLET: &str = "0x00000000219ab540356cbb839cbe05303d7705fa";
    const OTHER: &str = "0x1111111111111111111111111111111111111111";

    fn transfer(hash: &str, ts: &str, incoming: bool) -> Transfer {
        Transfer {
            hash: hash.to_string(),
            from: if incoming { OTHER.into() } else { WALLET.into() },
            to: Some(if incoming { WALLET.into() } else { OTHER.into() }),
            value: Some(Decimal::ONE),
            asset: Some("ETH".to_string()),
            category: "external".to_string(),
            raw_contract: Some(RawContract::default()),
            metadata: TransferMetadata { block_timestamp: ts.to_string() },
        }
    }

    fn signed(hash: &str) -> SignedTransaction {
        SignedTransaction {
            hash: hash.to_string(),
            nonce: "0x1".into(),
            from: WALLET.into(),
            to: Some(OTHER.into()),
            value: "0x0".into(),
            gas: "0x5208".into(),
            gas_price: Some("0x3b9aca00".into()),
            input: "0x".into(),
            block_number: Some("0x10".into()),
        }
    }

    fn page(transfers: Vec<Transfer>, next: Option<&str>) -> TransferPage {
        TransferPage {
            transfers,
            next_cursor: next.map(|s| s.to_string()),
        }
    }

    #[derive(Debug, Default)]
    struct MockProvider {
        unavailable: bool,
        incoming: Mutex<VecDeque<Result<TransferPage, String>>>,
        outgoing: Mutex<VecDeque<Result<TransferPage, String>>>,
        fetch_calls: AtomicUsize,
        detail_calls: Mutex<Vec<Vec<String>>>,
        gate: Option<Arc<Semaphore>>,
    }

    impl MockProvider {
        fn scripted(
            incoming: Vec<Result<TransferPage, String>>,
            outgoing: Vec<Result<TransferPage, String>>,
        ) -> Self {
            Self {
                incoming: Mutex::new(incoming.into()),
                outgoing: Mutex::new(outgoing.into()),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl TransferProvider for MockProvider {
        async fn check_availability(&self) -> Availability {
            Availability { available: !self.unavailable }
        }

        async fn fetch_transfer_page(
            &self,
            direction: Direction,
            _cursor: Option<&str>,
            _capacity: usize,
        ) -> eyre::Result<TransferPage> {
            if let Some(gate) = &self.gate {
                let permit = gate.acquire().await.unwrap();
                permit.forget();
            }
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            let queue = match direction {
                Direction::Incoming => &self.incoming,
                Direction::Outgoing => &self.outgoing,
            };
            match queue.lock().unwrap().pop_front() {
                Some(Ok(page)) => Ok(page),
                Some(Err(msg)) => Err(eyre!(msg)),
                None => Ok(TransferPage::empty()),
            }
        }

        async fn fetch_signed_details_batch(
            &self,
            hashes: &[String],
        ) -> eyre::Result<Vec<SignedTransaction>> {
            self.detail_calls.lock().unwrap().push(hashes.to_vec());
            Ok(hashes.iter().map(|h| signed(h)).collect())
        }
    }

    fn aggregator(provider: MockProvider) -> TransactionAggregator<MockProvider> {
        TransactionAggregator::new(provider, "eth-mainnet", WALLET, None, Some(10)).unwrap()
    }

    #[test]
    fn rejects_malformed_wallet_address() {
        let err = TransactionAggregator::new(
            MockProvider::default(),
            "eth-mainnet",
            "not-an-address",
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AggregatorError::InvalidArgument(_)));

        let err = TransactionAggregator::new(
            MockProvider::default(),
            "eth-mainnet",
            WALLET,
            Some("0x123"),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AggregatorError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn unavailable_source_resolves_with_empty_history() {
        let provider = MockProvider {
            unavailable: true,
            ..Default::default()
        };
        let agg = aggregator(provider);

        agg.load_more().await.unwrap();

        assert!(agg.get_ordered_transactions().is_empty());
        assert!(!agg.is_at_last_page());
        assert_eq!(agg.pages_loaded(), 0);
        let state = agg.state.lock().unwrap();
        assert_eq!(state.incoming_cursor, PageCursor::Start);
        assert_eq!(state.outgoing_cursor, PageCursor::Start);
    }

    #[tokio::test]
    async fn merges_both_feeds_in_descending_timestamp_order() {
        let provider = MockProvider::scripted(
            vec![Ok(page(
                vec![
                    transfer("0xa1", "2024-03-06T10:00:00Z", true),
                    transfer("0xa2", "2024-03-04T10:00:00Z", true),
                    transfer("0xa3", "2024-03-02T10:00:00Z", true),
                ],
                None,
            ))],
            vec![Ok(page(
                vec![
                    transfer("0xb1", "2024-03-05T10:00:00Z", false),
                    transfer("0xb2", "2024-03-03T10:00:00Z", false),
                    transfer("0xb3", "2024-03-01T10:00:00Z", false),
                ],
                None,
            ))],
        );
        let agg = aggregator(provider);

        agg.load_more().await.unwrap();

        assert!(agg.is_at_last_page());
        let txs = agg.get_ordered_transactions();
        let hashes: Vec<&str> = txs.iter().map(|t| t.hash.as_str()).collect();
        assert_eq!(hashes, vec!["0xa1", "0xb1", "0xa2", "0xb2", "0xa3", "0xb3"]);
        for pair in txs.windows(2) {
            assert!(pair[0].timestamp >= pair[1].timestamp);
        }
    }

    #[tokio::test]
    async fn hash_shared_by_both_feeds_appears_once() {
        let provider = MockProvider::scripted(
            vec![Ok(page(
                vec![transfer("0xdup", "2024-03-02T10:00:00Z", true)],
                None,
            ))],
            vec![Ok(page(
                vec![
                    transfer("0xdup", "2024-03-02T10:00:00Z", false),
                    transfer("0xb1", "2024-03-01T10:00:00Z", false),
                ],
                None,
            ))],
        );
        let agg = aggregator(provider);

        agg.load_more().await.unwrap();
        let txs = agg.get_ordered_transactions();

        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].hash, "0xdup");
        assert_eq!(txs[0].transfers.len(), 2);
    }

    #[tokio::test]
    async fn equal_timestamps_keep_insertion_order() {
        let ts = "2024-03-02T10:00:00Z";
        let provider = MockProvider::scripted(
            vec![Ok(page(
                vec![transfer("0xa1", ts, true), transfer("0xa2", ts, true)],
                None,
            ))],
            vec![Ok(page(vec![transfer("0xb1", ts, false)], None))],
        );
        let agg = aggregator(provider);

        agg.load_more().await.unwrap();
        let hashes: Vec<String> = agg
            .get_ordered_transactions()
            .iter()
            .map(|t| t.hash.clone())
            .collect();

        // Incoming page is merged before outgoing within one call.
        assert_eq!(hashes, vec!["0xa1", "0xa2", "0xb1"]);
    }

    #[tokio::test]
    async fn reserves_most_recently_seen_hash_until_feeds_exhaust() {
        let provider = MockProvider::scripted(
            vec![Ok(page(
                vec![
                    transfer("0xa1", "2024-03-03T10:00:00Z", true),
                    transfer("0xa2", "2024-03-02T10:00:00Z", true),
                    transfer("0xa3", "2024-03-01T10:00:00Z", true),
                ],
                Some("cursor-in-2"),
            ))],
            vec![Ok(page(vec![], None))],
        );
        let agg = aggregator(provider);

        agg.load_more().await.unwrap();

        assert!(!agg.is_at_last_page());
        let hashes: Vec<String> = agg
            .get_ordered_transactions()
            .iter()
            .map(|t| t.hash.clone())
            .collect();
        // 0xa3 is the last hash seen while draining; its sibling leg may
        // still be on the unfetched page.
        assert_eq!(hashes, vec!["0xa1", "0xa2"]);
    }

    #[tokio::test]
    async fn withheld_shared_hash_appears_after_exhaustion() {
        let provider = MockProvider::scripted(
            vec![Ok(page(
                vec![
                    transfer("0xa1", "2024-03-03T10:00:00Z", true),
                    transfer("0xh", "2024-03-01T10:00:00Z", true),
                ],
                None,
            ))],
            vec![
                Ok(page(
                    vec![transfer("0xb1", "2024-03-02T10:00:00Z", false)],
                    Some("cursor-out-2"),
                )),
                Ok(page(vec![transfer("0xh", "2024-03-01T10:00:00Z", false)], None)),
            ],
        );
        let agg = aggregator(provider);

        agg.load_more().await.unwrap();
        let hashes: Vec<String> = agg
            .get_ordered_transactions()
            .iter()
            .map(|t| t.hash.clone())
            .collect();
        assert!(!hashes.contains(&"0xh".to_string()));

        agg.load_more().await.unwrap();
        assert!(agg.is_at_last_page());
        let txs = agg.get_ordered_transactions();
        let shared: Vec<_> = txs.iter().filter(|t| t.hash == "0xh").collect();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].transfers.len(), 2);
    }

    #[tokio::test]
    async fn safe_index_caps_at_per_page_estimate() {
        let provider = MockProvider::scripted(
            vec![Ok(page(
                vec![
                    transfer("0xa1", "2024-03-04T10:00:00Z", true),
                    transfer("0xa2", "2024-03-03T10:00:00Z", true),
                ],
                Some("in-2"),
            ))],
            vec![Ok(page(
                vec![
                    transfer("0xb1", "2024-03-02T10:00:00Z", false),
                    transfer("0xb2", "2024-03-01T10:00:00Z", false),
                ],
                Some("out-2"),
            ))],
        );
        let agg =
            TransactionAggregator::new(provider, "eth-mainnet", WALLET, None, Some(1)).unwrap();

        agg.load_more().await.unwrap();

        // Four hashes loaded, but one page only vouches for as many
        // groups as one feed's fetch capacity (page size doubled).
        let hashes: Vec<String> = agg
            .get_ordered_transactions()
            .iter()
            .map(|t| t.hash.clone())
            .collect();
        assert_eq!(hashes, vec!["0xa1", "0xa2"]);
    }

    #[tokio::test]
    async fn failed_feed_discards_the_succeeding_feed() {
        let provider = MockProvider::scripted(
            vec![Ok(page(
                vec![transfer("0xa1", "2024-03-02T10:00:00Z", true)],
                Some("in-2"),
            ))],
            vec![Err("connection reset".to_string())],
        );
        let agg = aggregator(provider);

        let err = agg.load_more().await.unwrap_err();
        assert!(matches!(err, AggregatorError::Fetch(_)));

        assert!(agg.get_ordered_transactions().is_empty());
        assert_eq!(agg.pages_loaded(), 0);
        let state = agg.state.lock().unwrap();
        assert_eq!(state.incoming_cursor, PageCursor::Start);
        assert_eq!(state.outgoing_cursor, PageCursor::Start);
        assert!(state.queue.is_empty());
    }

    #[tokio::test]
    async fn malformed_timestamp_fails_without_partial_merge() {
        let provider = MockProvider::scripted(
            vec![Ok(page(
                vec![transfer("0xa1", "yesterday-ish", true)],
                None,
            ))],
            vec![Ok(page(vec![], None))],
        );
        let agg = aggregator(provider);

        let err = agg.load_more().await.unwrap_err();
        assert!(matches!(err, AggregatorError::MalformedData(_)));

        let state = agg.state.lock().unwrap();
        assert!(state.queue.is_empty());
        assert_eq!(state.incoming_cursor, PageCursor::Start);
        assert_eq!(state.pages_loaded, 0);
    }

    #[tokio::test]
    async fn repeated_reads_are_deep_equal_and_independent() {
        let provider = MockProvider::scripted(
            vec![Ok(page(
                vec![transfer("0xa1", "2024-03-02T10:00:00Z", true)],
                None,
            ))],
            vec![Ok(page(
                vec![transfer("0xb1", "2024-03-01T10:00:00Z", false)],
                None,
            ))],
        );
        let agg = aggregator(provider);
        agg.load_more().await.unwrap();

        let mut first = agg.get_ordered_transactions();
        let second = agg.get_ordered_transactions();
        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::to_value(&second).unwrap()
        );

        // Mutating a returned snapshot must not leak into the cache.
        first.clear();
        assert_eq!(agg.get_ordered_transactions().len(), 2);
    }

    #[tokio::test]
    async fn signed_details_are_fetched_once_per_hash() {
        let provider = MockProvider::scripted(
            vec![
                Ok(page(
                    vec![transfer("0xa1", "2024-03-03T10:00:00Z", true)],
                    Some("in-2"),
                )),
                Ok(page(
                    vec![
                        transfer("0xa1", "2024-03-03T10:00:00Z", true),
                        transfer("0xa2", "2024-03-02T10:00:00Z", true),
                    ],
                    None,
                )),
            ],
            vec![Ok(page(vec![], None))],
        );
        let agg = aggregator(provider);

        agg.load_more().await.unwrap();
        agg.load_more().await.unwrap();

        let calls = agg.provider.detail_calls.lock().unwrap().clone();
        assert_eq!(calls[0], vec!["0xa1".to_string()]);
        assert_eq!(calls[1], vec!["0xa2".to_string()]);

        assert!(agg.is_at_last_page());
        let txs = agg.get_ordered_transactions();
        assert!(txs.iter().all(|t| t.signed.is_some()));
    }

    #[tokio::test]
    async fn load_more_after_exhaustion_fetches_nothing() {
        let provider = MockProvider::scripted(
            vec![Ok(page(
                vec![transfer("0xa1", "2024-03-02T10:00:00Z", true)],
                None,
            ))],
            vec![Ok(page(vec![], None))],
        );
        let agg = aggregator(provider);

        agg.load_more().await.unwrap();
        assert_eq!(agg.provider.fetch_calls.load(Ordering::SeqCst), 2);
        assert_eq!(agg.pages_loaded(), 1);

        agg.load_more().await.unwrap();
        assert_eq!(agg.provider.fetch_calls.load(Ordering::SeqCst), 2);
        assert_eq!(agg.pages_loaded(), 1);
    }

    #[tokio::test]
    async fn overlapping_load_more_is_a_silent_noop() {
        let gate = Arc::new(Semaphore::new(0));
        let provider = MockProvider {
            gate: Some(gate.clone()),
            incoming: Mutex::new(
                vec![Ok(page(
                    vec![transfer("0xa1", "2024-03-02T10:00:00Z", true)],
                    None,
                ))]
                .into(),
            ),
            outgoing: Mutex::new(vec![Ok(page(vec![], None))].into()),
            ..Default::default()
        };
        let agg = Arc::new(aggregator(provider));

        let first = tokio::spawn({
            let agg = Arc::clone(&agg);
            async move { agg.load_more().await }
        });

        // Wait until the first call holds the lock inside its fetches.
        while !agg.locked.load(Ordering::Acquire) {
            tokio::task::yield_now().await;
        }

        agg.load_more().await.unwrap();
        assert_eq!(agg.pages_loaded(), 0);
        assert!(agg.get_ordered_transactions().is_empty());

        gate.add_permits(2);
        first.await.unwrap().unwrap();
        assert_eq!(agg.pages_loaded(), 1);
        assert!(agg.is_at_last_page());
    }
}
