// src/explorer.rs
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info};

use crate::{error::AgeError, network::NetworkConfig};

/// Largest page the explorers will return.
pub const MAX_OFFSET: u32 = 10_000;

const NO_TRANSACTIONS: &str = "No transactions found";

/// Query parameters for the explorer's `account/txlist` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxListQuery {
    pub start_block: String,
    pub end_block: String,
    pub page: u32,
    pub offset: u32,
    pub sort: &'static str,
}

impl Default for TxListQuery {
    fn default() -> Self {
        Self {
            start_block: "0".to_string(),
            end_block: "latest".to_string(),
            page: 1,
            offset: MAX_OFFSET,
            sort: "asc",
        }
    }
}

impl TxListQuery {
    fn params(&self, address: &str, api_key: &str) -> Vec<(&'static str, String)> {
        vec![
            ("module", "account".to_string()),
            ("action", "txlist".to_string()),
            ("address", address.to_string()),
            ("startblock", self.start_block.clone()),
            ("endblock", self.end_block.clone()),
            ("page", self.page.to_string()),
            ("offset", self.offset.min(MAX_OFFSET).to_string()),
            ("sort", self.sort.to_string()),
            ("apikey", api_key.to_string()),
        ]
    }
}

/// Raw explorer envelope. `result` is an array on success and a message string otherwise.
#[derive(Debug, Clone, Deserialize)]
pub struct ExplorerResponse {
    pub status: String,
    pub message: String,
    #[serde(default)]
    pub result: Value,
}

/// The only field of an explorer transaction we care about.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TxRecord {
    #[serde(rename = "timeStamp")]
    pub timestamp: String,
}

impl TxRecord {
    pub fn unix_seconds(&self) -> Result<i64, AgeError> {
        self.timestamp
            .trim()
            .parse()
            .map_err(|_| AgeError::InvalidTimestamp(self.timestamp.clone()))
    }
}

#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// One request, no retries.
    async fn fetch_tx_list(
        &self,
        address: &str,
        config: &NetworkConfig,
        query: &TxListQuery,
    ) -> Result<ExplorerResponse, AgeError>;
}

/// Etherscan-compatible explorer client (etherscan.io, basescan.org).
#[derive(Debug, Clone)]
pub struct EtherscanClient {
    client: Client,
}

impl EtherscanClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TransactionSource for EtherscanClient {
    async fn fetch_tx_list(
        &self,
        address: &str,
        config: &NetworkConfig,
        query: &TxListQuery,
    ) -> Result<ExplorerResponse, AgeError> {
        let url = format!("{}/api", config.api_base_url);
        info!("📡 Sending txlist → {} (address {})", url, address);

        let transport = |source: reqwest::Error| {
            error!("Error fetching {} transactions: {:?}", config.name, source);
            AgeError::Transport {
                network: config.name.clone(),
                source,
            }
        };

        let resp = self
            .client
            .get(&url)
            .query(&query.params(address, &config.api_key))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(transport)?;

        resp.json::<ExplorerResponse>().await.map_err(transport)
    }
}

/// Turns an explorer envelope into transaction records.
/// "No transactions found" is a brand-new wallet, not a failure.
pub fn interpret(response: ExplorerResponse, config: &NetworkConfig) -> Result<Vec<TxRecord>, AgeError> {
    if response.status == "0" && response.message == NO_TRANSACTIONS {
        return Ok(Vec::new());
    }

    if response.message != "OK" {
        let payload = serde_json::json!({
            "status": response.status,
            "message": response.message,
            "result": response.result,
        })
        .to_string();
        return Err(AgeError::Provider {
            network: config.name.clone(),
            payload,
        });
    }

    serde_json::from_value(response.result).map_err(|e| AgeError::Decode {
        network: config.name.clone(),
        reason: e.to_string(),
    })
}

/// Fetch and interpret in one go.
pub async fn transactions_of(
    source: &dyn TransactionSource,
    address: &str,
    config: &NetworkConfig,
) -> Result<Vec<TxRecord>, AgeError> {
    let response = source
        .fetch_tx_list(address, config, &TxListQuery::default())
        .await?;
    interpret(response, config)
}
