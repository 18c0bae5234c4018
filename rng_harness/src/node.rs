//! Node abstraction the batch executor drives.

use alloy_primitives::{Address, Bytes, B256, U256 as AbiU256};
use async_trait::async_trait;
use log::{debug, trace};

use crate::abi::{ContractAbi, DecodedEvent};
use crate::error::{HarnessError, HarnessResult};
use crate::rpc::{NodeClient, TransactionRequest};
use crate::sampler::SamplerCall;

/// Thread count passed to `miner_start` when resuming block production
pub const MINER_THREADS: u32 = 1;

/// Test node capable of pausing block production and serving RNG calls.
///
/// `submit` must return as soon as the node accepted the call; inclusion is
/// observed later through `confirm`. Implementations must stay correct when
/// every call of a batch lands in its own block.
#[async_trait]
pub trait RngNode: Send + Sync {
    /// Handle of a submitted call awaiting inclusion
    type Pending: Send;

    /// Stops automatic block production (`miner_stop`).
    async fn pause_mining(&self) -> HarnessResult<()>;

    /// Restarts automatic block production (`miner_start`).
    async fn resume_mining(&self) -> HarnessResult<()>;

    /// Forces one block (`evm_mine`).
    async fn mine_block(&self) -> HarnessResult<()>;

    /// Submits one RNG invocation without waiting for it to be mined.
    async fn submit(&self, call: &SamplerCall) -> HarnessResult<Self::Pending>;

    /// Waits for a submitted invocation and returns the events of its receipt.
    async fn confirm(&self, pending: Self::Pending) -> HarnessResult<Vec<DecodedEvent>>;
}

/// Gas settings applied to every RNG transaction
#[derive(Debug, Clone, Copy, Default)]
pub struct GasSettings {
    pub gas: Option<u64>,
    pub gas_price: Option<u64>,
}

/// RNG contract deployed on a JSON-RPC test node (ganache, anvil, hardhat).
#[derive(Debug)]
pub struct ContractNode {
    client: NodeClient,
    abi: ContractAbi,
    contract: Address,
    from: Address,
    gas: GasSettings,
}

impl ContractNode {
    pub fn new(
        client: NodeClient,
        abi: ContractAbi,
        contract: Address,
        from: Address,
        gas: GasSettings,
    ) -> Self {
        Self {
            client,
            abi,
            contract,
            from,
            gas,
        }
    }

    /// Uses `from` when given, otherwise the first account unlocked on the node.
    pub async fn connect(
        client: NodeClient,
        abi: ContractAbi,
        contract: Address,
        from: Option<Address>,
        gas: GasSettings,
    ) -> HarnessResult<Self> {
        let from = match from {
            Some(from) => from,
            None => client
                .accounts()
                .await?
                .first()
                .copied()
                .ok_or_else(|| HarnessError::rpc("eth_accounts", "Node has no unlocked account"))?,
        };

        if log::log_enabled!(log::Level::Debug) {
            debug!("RNG contract {} called from {}", contract, from);
        }
        Ok(Self::new(client, abi, contract, from, gas))
    }

    pub fn client(&self) -> &NodeClient {
        &self.client
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn from(&self) -> Address {
        self.from
    }
}

#[async_trait]
impl RngNode for ContractNode {
    type Pending = B256;

    async fn pause_mining(&self) -> HarnessResult<()> {
        self.client.miner_stop().await
    }

    async fn resume_mining(&self) -> HarnessResult<()> {
        self.client.miner_start(MINER_THREADS).await
    }

    async fn mine_block(&self) -> HarnessResult<()> {
        self.client.evm_mine().await
    }

    async fn submit(&self, call: &SamplerCall) -> HarnessResult<B256> {
        let data = self.abi.encode_call(call)?;
        if log::log_enabled!(log::Level::Trace) {
            trace!("calldata of {}: 0x{}", call.function(), hex::encode(&data));
        }
        let tx = TransactionRequest {
            from: self.from,
            to: self.contract,
            data: Bytes::from(data),
            gas: self.gas.gas.map(AbiU256::from),
            gas_price: self.gas.gas_price.map(AbiU256::from),
        };

        let tx_hash = self.client.send_transaction(&tx).await?;
        if log::log_enabled!(log::Level::Trace) {
            trace!("{} submitted as {}", call.function(), tx_hash);
        }
        Ok(tx_hash)
    }

    async fn confirm(&self, tx_hash: B256) -> HarnessResult<Vec<DecodedEvent>> {
        let receipt = self.client.wait_for_receipt(&tx_hash).await?;
        Ok(self.abi.decode_logs(&receipt.logs))
    }
}
