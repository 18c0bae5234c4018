//! JSON-RPC client for the EVM test node.

use alloy_primitives::{Address, Bytes, B256, U256 as AbiU256, U64};
use log::{debug, trace, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use url::Url;

use crate::error::{HarnessError, HarnessResult};

pub const JSON_RPC_VERSION: &str = "2.0";

/// Configuration for node client retries, timeouts and receipt polling
#[derive(Debug, Clone)]
pub struct NodeClientConfig {
    pub request_timeout: Duration,
    pub connection_timeout: Duration,
    /// Retries on transport failures only, RPC errors are never retried
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub receipt_poll_interval: Duration,
    pub receipt_timeout: Duration,
}

impl Default for NodeClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            max_retries: 0,
            retry_delay: Duration::from_millis(1000),
            receipt_poll_interval: Duration::from_millis(10),
            receipt_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u32,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct JsonRpcResponse {
    jsonrpc: String,
    id: Value,
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct JsonRpcError {
    code: i64,
    message: String,
    data: Option<Value>,
}

/// Transaction sent through `eth_sendTransaction` from an account unlocked on the node.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<AbiU256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<AbiU256>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReceiptLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    pub block_number: Option<U64>,
    /// `0x1` on success, `0x0` when reverted (absent on pre-Byzantium nodes)
    pub status: Option<U64>,
    #[serde(default)]
    pub logs: Vec<ReceiptLog>,
}

impl TransactionReceipt {
    pub fn is_reverted(&self) -> bool {
        self.status.map(|s| s.is_zero()).unwrap_or(false)
    }
}

/// HTTP JSON-RPC client of the test node
pub struct NodeClient {
    client: Client,
    url: Url,
    config: NodeClientConfig,
}

impl NodeClient {
    pub fn new(address: &str) -> HarnessResult<Self> {
        Self::with_config(address, NodeClientConfig::default())
    }

    pub fn with_config(address: &str, config: NodeClientConfig) -> HarnessResult<Self> {
        let url = normalize_address(address)?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connection_timeout)
            .build()?;

        Ok(Self {
            client,
            url,
            config,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn config(&self) -> &NodeClientConfig {
        &self.config
    }

    /// Sends a JSON-RPC request, retrying transport failures up to `max_retries` times.
    pub async fn request(&self, method: &str, params: Value) -> HarnessResult<Value> {
        let request = JsonRpcRequest {
            jsonrpc: JSON_RPC_VERSION,
            id: rand::random::<u32>(),
            method,
            params,
        };

        if log::log_enabled!(log::Level::Trace) {
            trace!("JSON-RPC request to {}: {}", self.url, method);
        }

        let mut attempt = 0;
        loop {
            match self.send_once(&request).await {
                Err(HarnessError::Transport(e)) if attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(
                        "Retrying '{}' after transport error: {} (attempt {}/{})",
                        method, e, attempt, self.config.max_retries
                    );
                    sleep(self.config.retry_delay).await;
                }
                result => return result,
            }
        }
    }

    async fn send_once(&self, request: &JsonRpcRequest<'_>) -> HarnessResult<Value> {
        let response = self
            .client
            .post(self.url.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    HarnessError::Transport(format!(
                        "Request timeout after {:?}",
                        self.config.request_timeout
                    ))
                } else if e.is_connect() {
                    HarnessError::Transport(format!("Connection failed: {}", e))
                } else {
                    HarnessError::Transport(format!("Network error: {}", e))
                }
            })?;

        if !response.status().is_success() {
            return Err(HarnessError::Transport(format!(
                "HTTP error {}: {}",
                response.status().as_u16(),
                response.status().canonical_reason().unwrap_or("Unknown error")
            )));
        }

        let rpc_response: JsonRpcResponse = response.json().await.map_err(|e| {
            HarnessError::rpc(request.method, format!("Failed to parse JSON response: {}", e))
        })?;

        parse_response(request.method, rpc_response)
    }

    /// Request whose result is deserialized into `T`
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> HarnessResult<T> {
        let result = self.request(method, params).await?;
        serde_json::from_value(result)
            .map_err(|e| HarnessError::rpc(method, format!("Unexpected result: {}", e)))
    }

    /// Mines a single block.
    pub async fn evm_mine(&self) -> HarnessResult<()> {
        self.request("evm_mine", json!([])).await.map(|_| ())
    }

    /// Stops automatic block production, transactions stay in the mempool.
    pub async fn miner_stop(&self) -> HarnessResult<()> {
        self.request("miner_stop", json!([])).await.map(|_| ())
    }

    /// Restarts automatic block production.
    pub async fn miner_start(&self, threads: u32) -> HarnessResult<()> {
        self.request("miner_start", json!([threads])).await.map(|_| ())
    }

    pub async fn accounts(&self) -> HarnessResult<Vec<Address>> {
        self.call("eth_accounts", json!([])).await
    }

    pub async fn block_number(&self) -> HarnessResult<u64> {
        let number: U64 = self.call("eth_blockNumber", json!([])).await?;
        Ok(number.to::<u64>())
    }

    pub async fn chain_id(&self) -> HarnessResult<u64> {
        let id: U64 = self.call("eth_chainId", json!([])).await?;
        Ok(id.to::<u64>())
    }

    pub async fn client_version(&self) -> HarnessResult<String> {
        self.call("web3_clientVersion", json!([])).await
    }

    /// Hands a transaction to the node and returns its hash without waiting for inclusion.
    pub async fn send_transaction(&self, tx: &TransactionRequest) -> HarnessResult<B256> {
        let params = serde_json::to_value(tx)
            .map_err(|e| HarnessError::rpc("eth_sendTransaction", e))?;
        self.call("eth_sendTransaction", json!([params])).await
    }

    pub async fn get_transaction_receipt(
        &self,
        tx_hash: &B256,
    ) -> HarnessResult<Option<TransactionReceipt>> {
        self.call("eth_getTransactionReceipt", json!([tx_hash]))
            .await
    }

    /// Polls until the transaction is included, failing on revert or timeout.
    pub async fn wait_for_receipt(&self, tx_hash: &B256) -> HarnessResult<TransactionReceipt> {
        let start = Instant::now();
        loop {
            if let Some(receipt) = self.get_transaction_receipt(tx_hash).await? {
                if receipt.block_number.is_some() {
                    if receipt.is_reverted() {
                        return Err(HarnessError::Reverted {
                            tx_hash: tx_hash.to_string(),
                        });
                    }
                    return Ok(receipt);
                }
            }

            if start.elapsed() >= self.config.receipt_timeout {
                return Err(HarnessError::ReceiptTimeout {
                    tx_hash: tx_hash.to_string(),
                    waited_secs: self.config.receipt_timeout.as_secs(),
                });
            }
            sleep(self.config.receipt_poll_interval).await;
        }
    }

    /// Quick connectivity check used at startup
    pub async fn test_connection(&self) -> HarnessResult<()> {
        let version = self.client_version().await?;
        let block = self.block_number().await?;
        if log::log_enabled!(log::Level::Debug) {
            debug!("Connected to {} ({}), head block {}", self.url, version, block);
        }
        Ok(())
    }
}

impl std::fmt::Debug for NodeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeClient").field("url", &self.url).finish()
    }
}

/// Accepts `host:port` as well as full URLs.
pub fn normalize_address(address: &str) -> HarnessResult<Url> {
    let url = if address.starts_with("http://") || address.starts_with("https://") {
        Url::parse(address)
    } else {
        Url::parse(&format!("http://{}", address))
    };
    url.map_err(|e| HarnessError::Config(format!("Invalid RPC address '{}': {}", address, e)))
}

fn parse_response(method: &str, response: JsonRpcResponse) -> HarnessResult<Value> {
    if let Some(error) = response.error {
        return Err(HarnessError::rpc(
            method,
            format!("RPC error {}: {}", error.code, error.message),
        ));
    }
    // `null` is a valid result, e.g. a receipt that does not exist yet
    Ok(response.result.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &str) -> JsonRpcResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_normalize_address() {
        assert_eq!(
            normalize_address("localhost:7545").unwrap().as_str(),
            "http://localhost:7545/"
        );
        assert_eq!(
            normalize_address("https://node.example:8545").unwrap().as_str(),
            "https://node.example:8545/"
        );
        assert!(normalize_address("http://").is_err());
    }

    #[test]
    fn test_parse_response_result_and_error() {
        let ok = parse_response(
            "evm_mine",
            response(r#"{"jsonrpc":"2.0","id":0,"result":"0x0"}"#),
        )
        .unwrap();
        assert_eq!(ok, json!("0x0"));

        let null = parse_response(
            "eth_getTransactionReceipt",
            response(r#"{"jsonrpc":"2.0","id":1,"result":null}"#),
        )
        .unwrap();
        assert!(null.is_null());

        let err = parse_response(
            "miner_stop",
            response(r#"{"jsonrpc":"2.0","id":2,"error":{"code":-32601,"message":"Method not found"}}"#),
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("miner_stop"));
        assert!(msg.contains("-32601"));
    }

    #[test]
    fn test_receipt_deserialization() {
        let receipt: TransactionReceipt = serde_json::from_value(json!({
            "transactionHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "blockNumber": "0x2a",
            "status": "0x1",
            "gasUsed": "0x5208",
            "logs": [{
                "address": "0x2222222222222222222222222222222222222222",
                "topics": ["0x3333333333333333333333333333333333333333333333333333333333333333"],
                "data": "0x00ff",
                "logIndex": "0x0"
            }]
        }))
        .unwrap();

        assert_eq!(receipt.block_number, Some(U64::from(42u64)));
        assert!(!receipt.is_reverted());
        assert_eq!(receipt.logs.len(), 1);
        assert_eq!(receipt.logs[0].data.to_vec(), vec![0x00, 0xff]);

        let reverted: TransactionReceipt = serde_json::from_value(json!({
            "transactionHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "blockNumber": "0x2b",
            "status": "0x0",
            "logs": []
        }))
        .unwrap();
        assert!(reverted.is_reverted());
    }

    #[test]
    fn test_transaction_request_serialization() {
        let tx = TransactionRequest {
            from: Address::repeat_byte(0x11),
            to: Address::repeat_byte(0x22),
            data: Bytes::from(vec![0xde, 0xad]),
            gas: Some(AbiU256::from(7_400_000u64)),
            gas_price: None,
        };
        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["data"], json!("0xdead"));
        assert_eq!(value["gas"], json!("0x70ea40"));
        assert!(value.get("gasPrice").is_none());
    }

    #[test]
    fn test_client_construction() {
        let client = NodeClient::new("127.0.0.1:7545").unwrap();
        assert_eq!(client.url().port(), Some(7545));
        assert_eq!(client.config().max_retries, 0);
    }
}
