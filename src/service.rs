// src/service.rs
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    age::{self, WalletAge},
    error::AgeError,
    explorer::{self, TransactionSource},
    network::{Network, NetworkResolver},
};

/// Network label used when no chain shows any activity.
pub const UNKNOWN_NETWORK: &str = "Unknown";

/// Age of one address on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenActivity {
    pub sender_address: String,
    pub wallet_age: WalletAge,
    pub network: String,
}

/// What a single chain said about an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainStatus {
    Active {
        first_timestamp: i64,
        activity: TokenActivity,
    },
    Empty,
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainOutcome {
    pub network: Network,
    pub status: ChainStatus,
}

pub struct WalletAgeService {
    source: Arc<dyn TransactionSource>,
    resolver: NetworkResolver,
    clock: fn() -> DateTime<Utc>,
}

impl WalletAgeService {
    pub fn new(source: Arc<dyn TransactionSource>, resolver: NetworkResolver) -> Self {
        Self {
            source,
            resolver,
            clock: Utc::now,
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Single-chain lookup from a raw chain identifier.
    /// The identifier is checked before anything goes over the wire.
    pub async fn lookup(&self, address: &str, network: &str) -> Result<TokenActivity, AgeError> {
        let address = require_address(address)?;
        let network: Network = network.parse()?;
        self.token_activity(address, network).await
    }

    /// Single-chain lookup. Provider and transport errors are returned as-is.
    pub async fn token_activity(&self, address: &str, network: Network) -> Result<TokenActivity, AgeError> {
        let address = require_address(address)?;
        match self.first_activity(address, network).await? {
            ChainStatus::Active { activity, .. } => Ok(activity),
            _ => Ok(new_wallet_activity(address, network.display_name())),
        }
    }

    /// Queries every chain in `Network::ALL` order, one at a time.
    /// A failing chain is logged and recorded, never fatal.
    pub async fn chain_outcomes(&self, address: &str) -> Result<Vec<ChainOutcome>, AgeError> {
        let address = require_address(address)?;
        let mut outcomes = Vec::with_capacity(Network::ALL.len());

        for network in Network::ALL {
            let status = match self.first_activity(address, network).await {
                Ok(status) => status,
                Err(e) => {
                    warn!("Error fetching from {}: {}", network, e);
                    ChainStatus::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            outcomes.push(ChainOutcome { network, status });
        }

        Ok(outcomes)
    }

    /// Oldest activity across all chains, falling back to a new-wallet age on "Unknown".
    pub async fn oldest_wallet_age(&self, address: &str) -> Result<TokenActivity, AgeError> {
        let outcomes = self.chain_outcomes(address).await?;
        let oldest = reconcile_oldest(address, &outcomes, (self.clock)());
        info!(
            "Oldest activity for {}: {} on {}",
            address, oldest.wallet_age.display_text, oldest.network
        );
        Ok(oldest)
    }

    /// Every chain that answered, failed chains left out.
    pub async fn all_networks(&self, address: &str) -> Result<Vec<TokenActivity>, AgeError> {
        let outcomes = self.chain_outcomes(address).await?;
        Ok(outcomes
            .into_iter()
            .filter_map(|o| match o.status {
                ChainStatus::Active { activity, .. } => Some(activity),
                ChainStatus::Empty => Some(new_wallet_activity(address, o.network.display_name())),
                ChainStatus::Failed { .. } => None,
            })
            .collect())
    }

    async fn first_activity(&self, address: &str, network: Network) -> Result<ChainStatus, AgeError> {
        let config = self.resolver.resolve(network);
        let txs = explorer::transactions_of(self.source.as_ref(), address, &config).await?;

        // sorted ascending, so the first record is the earliest
        let Some(first) = txs.first() else {
            info!("No {} transactions for {}", config.name, address);
            return Ok(ChainStatus::Empty);
        };

        let first_timestamp = first.unix_seconds()?;
        let wallet_age = age::calculate_at(first_timestamp, (self.clock)())?;
        info!(
            "{} first tx for {} at {} → {}",
            config.name, address, first_timestamp, wallet_age.display_text
        );

        Ok(ChainStatus::Active {
            first_timestamp,
            activity: TokenActivity {
                sender_address: address.to_string(),
                wallet_age,
                network: config.name,
            },
        })
    }
}

/// Picks the chain with the earliest first transaction.
/// Only transactions strictly before `now` count; equal timestamps keep the chain seen first.
pub fn reconcile_oldest(address: &str, outcomes: &[ChainOutcome], now: DateTime<Utc>) -> TokenActivity {
    let mut oldest_ts = now.timestamp();
    let mut oldest: Option<&TokenActivity> = None;

    for outcome in outcomes {
        if let ChainStatus::Active {
            first_timestamp,
            activity,
        } = &outcome.status
        {
            if *first_timestamp < oldest_ts {
                oldest_ts = *first_timestamp;
                oldest = Some(activity);
            }
        }
    }

    oldest
        .cloned()
        .unwrap_or_else(|| new_wallet_activity(address, UNKNOWN_NETWORK))
}

fn new_wallet_activity(address: &str, network: &str) -> TokenActivity {
    TokenActivity {
        sender_address: address.to_string(),
        wallet_age: WalletAge::new_wallet(),
        network: network.to_string(),
    }
}

fn require_address(address: &str) -> Result<&str, AgeError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(AgeError::MissingAddress);
    }
    Ok(address)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::explorer::{ExplorerResponse, TxListQuery};
    use crate::network::{NetworkConfig, StaticKeys};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    pub(crate) const ADDR: &str = "0x1111111111111111111111111111111111111111";

    pub(crate) fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    pub(crate) fn ts(y: i32, m: u32, d: u32) -> i64 {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap().timestamp()
    }

    pub(crate) enum Canned {
        Txs(Vec<i64>),
        Empty,
        NotOk(&'static str),
        Unreachable,
    }

    /// In-memory explorer keyed by chain.
    #[derive(Default)]
    pub(crate) struct FakeExplorer {
        answers: HashMap<Network, Canned>,
        pub calls: Mutex<Vec<(String, NetworkConfig)>>,
    }

    impl FakeExplorer {
        pub(crate) fn with(mut self, network: Network, answer: Canned) -> Self {
            self.answers.insert(network, answer);
            self
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TransactionSource for FakeExplorer {
        async fn fetch_tx_list(
            &self,
            address: &str,
            config: &NetworkConfig,
            _query: &TxListQuery,
        ) -> Result<ExplorerResponse, AgeError> {
            self.calls
                .lock()
                .unwrap()
                .push((address.to_string(), config.clone()));

            let body = match self.answers.get(&config.network) {
                Some(Canned::Unreachable) => {
                    // invalid URL: reqwest fails before any I/O
                    let source = reqwest::Client::new().get("not a url").send().await.unwrap_err();
                    return Err(AgeError::Transport {
                        network: config.name.clone(),
                        source,
                    });
                }
                Some(Canned::Txs(stamps)) => json!({
                    "status": "1",
                    "message": "OK",
                    "result": stamps
                        .iter()
                        .map(|t| json!({"timeStamp": t.to_string()}))
                        .collect::<Vec<_>>(),
                }),
                Some(Canned::Empty) | None => json!({
                    "status": "0",
                    "message": "No transactions found",
                    "result": [],
                }),
                Some(Canned::NotOk(reason)) => json!({
                    "status": "0",
                    "message": "NOTOK",
                    "result": reason,
                }),
            };
            Ok(serde_json::from_value(body).unwrap())
        }
    }

    pub(crate) fn service(fake: Arc<FakeExplorer>) -> WalletAgeService {
        let keys = StaticKeys::new()
            .with(Network::Ethereum, "eth-key")
            .with(Network::Base, "base-key");
        WalletAgeService::new(fake, NetworkResolver::new(keys)).with_clock(fixed_now)
    }

    #[tokio::test]
    async fn empty_chain_is_a_new_wallet() {
        let fake = Arc::new(FakeExplorer::default().with(Network::Ethereum, Canned::Empty));
        let activity = service(fake).token_activity(ADDR, Network::Ethereum).await.unwrap();

        assert_eq!(activity.wallet_age, WalletAge::new_wallet());
        assert_eq!(activity.network, "Ethereum");
        assert_eq!(activity.sender_address, ADDR);
    }

    #[tokio::test]
    async fn uses_first_returned_transaction() {
        let fake = Arc::new(FakeExplorer::default().with(
            Network::Ethereum,
            Canned::Txs(vec![ts(2023, 4, 15), ts(2024, 1, 1)]),
        ));
        let activity = service(fake.clone()).lookup(ADDR, "ethereum").await.unwrap();

        assert_eq!(activity.wallet_age.years, 1);
        assert_eq!(activity.wallet_age.months, 2);
        assert_eq!(activity.wallet_age.display_text, "1 year 2 months");

        let calls = fake.calls.lock().unwrap();
        assert_eq!(calls[0].1.api_key, "eth-key");
    }

    #[tokio::test]
    async fn single_chain_propagates_provider_errors() {
        let fake = Arc::new(FakeExplorer::default().with(Network::Base, Canned::NotOk("Invalid API Key")));
        let err = service(fake).token_activity(ADDR, Network::Base).await.unwrap_err();
        assert!(matches!(err, AgeError::Provider { ref network, .. } if network == "Base"));
    }

    #[tokio::test]
    async fn unsupported_chain_fails_before_any_request() {
        let fake = Arc::new(FakeExplorer::default());
        let err = service(fake.clone()).lookup(ADDR, "polygon").await.unwrap_err();

        assert!(matches!(err, AgeError::UnsupportedNetwork(_)));
        assert_eq!(fake.call_count(), 0);
    }

    #[tokio::test]
    async fn blank_address_fails_before_any_request() {
        let fake = Arc::new(FakeExplorer::default());
        let svc = service(fake.clone());

        assert!(matches!(svc.lookup("  ", "ethereum").await, Err(AgeError::MissingAddress)));
        assert!(matches!(svc.oldest_wallet_age("").await, Err(AgeError::MissingAddress)));
        assert_eq!(fake.call_count(), 0);
    }

    #[tokio::test]
    async fn oldest_picks_earliest_chain() {
        let fake = Arc::new(
            FakeExplorer::default()
                .with(Network::Ethereum, Canned::Txs(vec![ts(2023, 1, 1)]))
                .with(Network::Base, Canned::Txs(vec![ts(2021, 3, 1)])),
        );
        let oldest = service(fake).oldest_wallet_age(ADDR).await.unwrap();

        assert_eq!(oldest.network, "Base");
        assert_eq!((oldest.wallet_age.years, oldest.wallet_age.months), (3, 3));
    }

    #[tokio::test]
    async fn oldest_skips_failed_chain() {
        let fake = Arc::new(
            FakeExplorer::default()
                .with(Network::Ethereum, Canned::NotOk("rate limited"))
                .with(Network::Base, Canned::Txs(vec![ts(2023, 6, 1)])),
        );
        let svc = service(fake.clone());

        let outcomes = svc.chain_outcomes(ADDR).await.unwrap();
        assert!(matches!(outcomes[0].status, ChainStatus::Failed { .. }));
        assert_eq!(outcomes[0].network, Network::Ethereum);

        let oldest = svc.oldest_wallet_age(ADDR).await.unwrap();
        assert_eq!(oldest.network, "Base");
        assert_eq!(oldest.wallet_age.display_text, "1 year");
    }

    #[tokio::test]
    async fn oldest_falls_back_to_unknown() {
        let fake = Arc::new(
            FakeExplorer::default()
                .with(Network::Ethereum, Canned::NotOk("down"))
                .with(Network::Base, Canned::Empty),
        );
        let oldest = service(fake).oldest_wallet_age(ADDR).await.unwrap();

        assert_eq!(oldest.network, UNKNOWN_NETWORK);
        assert_eq!(oldest.wallet_age, WalletAge::new_wallet());
    }

    #[tokio::test]
    async fn chains_are_queried_in_fixed_order() {
        let fake = Arc::new(FakeExplorer::default());
        service(fake.clone()).chain_outcomes(ADDR).await.unwrap();

        let calls = fake.calls.lock().unwrap();
        let order: Vec<_> = calls.iter().map(|(_, c)| c.network).collect();
        assert_eq!(order, Network::ALL.to_vec());
    }

    #[tokio::test]
    async fn all_networks_omits_failures() {
        let fake = Arc::new(
            FakeExplorer::default()
                .with(Network::Ethereum, Canned::Txs(vec![ts(2022, 6, 1)]))
                .with(Network::Base, Canned::NotOk("boom")),
        );
        let all = service(fake).all_networks(ADDR).await.unwrap();

        assert_eq!(all.len(), 1);
        assert_eq!(all[0].network, "Ethereum");
        assert_eq!(all[0].wallet_age.display_text, "2 years");
    }

    fn active(network: Network, first_timestamp: i64) -> ChainOutcome {
        ChainOutcome {
            network,
            status: ChainStatus::Active {
                first_timestamp,
                activity: TokenActivity {
                    sender_address: ADDR.to_string(),
                    wallet_age: WalletAge::new_wallet(),
                    network: network.display_name().to_string(),
                },
            },
        }
    }

    #[test]
    fn reconcile_tie_keeps_first_chain() {
        let outcomes = [active(Network::Ethereum, 1_600_000_000), active(Network::Base, 1_600_000_000)];
        assert_eq!(reconcile_oldest(ADDR, &outcomes, fixed_now()).network, "Ethereum");
    }

    #[test]
    fn reconcile_prefers_smaller_timestamp() {
        let outcomes = [active(Network::Ethereum, 1_700_000_000), active(Network::Base, 1_600_000_000)];
        assert_eq!(reconcile_oldest(ADDR, &outcomes, fixed_now()).network, "Base");
    }

    #[test]
    fn reconcile_with_nothing_is_unknown() {
        let outcomes = [
            ChainOutcome {
                network: Network::Ethereum,
                status: ChainStatus::Empty,
            },
            ChainOutcome {
                network: Network::Base,
                status: ChainStatus::Failed {
                    reason: "down".to_string(),
                },
            },
        ];
        let result = reconcile_oldest(ADDR, &outcomes, fixed_now());
        assert_eq!(result.network, UNKNOWN_NETWORK);
        assert_eq!(result.wallet_age, WalletAge::new_wallet());
        assert_eq!(result.sender_address, ADDR);
    }

    #[test]
    fn reconcile_ignores_activity_after_now() {
        let outcomes = [active(Network::Ethereum, ts(2030, 1, 1))];
        assert_eq!(reconcile_oldest(ADDR, &outcomes, fixed_now()).network, UNKNOWN_NETWORK);

        let outcomes = [active(Network::Ethereum, ts(2030, 1, 1)), active(Network::Base, ts(2020, 1, 1))];
        assert_eq!(reconcile_oldest(ADDR, &outcomes, fixed_now()).network, "Base");
    }

    #[tokio::test]
    async fn future_dated_chain_is_not_the_oldest() {
        let fake = Arc::new(FakeExplorer::default().with(Network::Ethereum, Canned::Txs(vec![ts(2030, 1, 1)])));
        let oldest = service(fake).oldest_wallet_age(ADDR).await.unwrap();
        assert_eq!(oldest.network, UNKNOWN_NETWORK);
    }

    #[tokio::test]
    async fn single_chain_propagates_transport_errors() {
        let fake = Arc::new(FakeExplorer::default().with(Network::Ethereum, Canned::Unreachable));
        let err = service(fake).token_activity(ADDR, Network::Ethereum).await.unwrap_err();
        assert!(matches!(err, AgeError::Transport { ref network, .. } if network == "Ethereum"));
    }

    #[tokio::test]
    async fn oldest_skips_unreachable_chain() {
        let fake = Arc::new(
            FakeExplorer::default()
                .with(Network::Ethereum, Canned::Unreachable)
                .with(Network::Base, Canned::Txs(vec![ts(2022, 1, 1)])),
        );
        let svc = service(fake);

        let outcomes = svc.chain_outcomes(ADDR).await.unwrap();
        match &outcomes[0].status {
            ChainStatus::Failed { reason } => assert!(reason.contains("Error fetching Ethereum transactions")),
            other => panic!("expected failure, got {other:?}"),
        }

        let oldest = svc.oldest_wallet_age(ADDR).await.unwrap();
        assert_eq!(oldest.network, "Base");
        assert_eq!(oldest.wallet_age.display_text, "2 years 5 months");

        let all = svc.all_networks(ADDR).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].network, "Base");
    }
}
