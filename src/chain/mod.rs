//! Chain access
//!
//! The transaction pipeline and the contract client talk to the chain only through
//! the traits below, so tests can substitute in-memory fakes:
//! - `AccountSource`: sequence, account number and latest height (REST)
//! - `TxService`: simulate and broadcast raw transactions (gRPC)
//! - `ContractQuerier`: CosmWasm smart queries and bank balances (REST)

pub mod grpc;
pub mod rest;

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use grpc::GrpcTxClient;
pub use rest::RestClient;

/// Signer's on-chain account numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub account_number: u64,
    pub sequence: u64,
}

/// Everything the composer needs from the chain, fetched right before composing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    pub account_number: u64,
    pub sequence: u64,
    pub latest_height: u64,
}

/// Native coin balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

/// Outcome of a broadcast transaction, as reported by the node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutcome {
    pub hash: String,
    pub code: u32,
    pub gas_wanted: u64,
    pub gas_used: u64,
    pub raw_log: String,
    pub height: u64,
}

impl TxOutcome {
    /// Accepted with code 0 and no failure reported in the log
    pub fn success(&self) -> bool {
        self.code == 0 && !self.raw_log.contains("failed")
    }

    /// Turn an unsuccessful outcome into `Error::ChainRejection`
    pub fn into_result(self) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }
        Err(crate::Error::ChainRejection {
            hash: self.hash,
            code: self.code,
            raw_log: self.raw_log,
        })
    }
}

/// Source of account state for the signer
#[async_trait]
pub trait AccountSource: Send + Sync {
    async fn account(&self, address: &str) -> Result<AccountInfo>;

    async fn latest_height(&self) -> Result<u64>;

    /// Fetch account numbers and the latest height concurrently
    async fn fetch_account_state(&self, address: &str) -> Result<AccountState> {
        let (account, latest_height) =
            tokio::try_join!(self.account(address), self.latest_height())?;
        Ok(AccountState {
            account_number: account.account_number,
            sequence: account.sequence,
            latest_height,
        })
    }
}

/// Transaction simulation and submission
#[async_trait]
pub trait TxService: Send + Sync {
    /// Dry-run raw tx bytes, returning the gas used
    async fn simulate(&self, tx_bytes: Vec<u8>) -> Result<u64>;

    /// Submit raw tx bytes
    ///
    /// A non-zero result code is returned as an outcome, not as an error.
    async fn broadcast(&self, tx_bytes: Vec<u8>) -> Result<TxOutcome>;
}

/// Read-only contract and bank queries
#[async_trait]
pub trait ContractQuerier: Send + Sync {
    async fn query_smart(
        &self,
        contract: &str,
        msg: &serde_json::Value,
    ) -> Result<serde_json::Value>;

    async fn bank_balances(&self, address: &str) -> Result<Vec<Coin>>;
}
