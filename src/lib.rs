//! IonFlux client
//!
//! Client and transaction pipeline for the IonFlux CosmWasm liquidity contract:
//! - Derive signing keys from a mnemonic (Injective or standard Cosmos conventions)
//! - Build deposit/swap/unbond/withdraw/claim messages and contract queries
//! - Simulate, price, sign and broadcast transactions
//!
//! # Security Model
//!
//! - Private keys never leave the `wallet` module
//! - The stored seed is encrypted at rest and unlocked once per session
//! - Every transaction attempt can be recorded in a JSONL audit log

pub mod audit;
pub mod chain;
pub mod config;
pub mod contract;
pub mod tokens;
pub mod tx;
pub mod utils;
pub mod wallet;

mod error;

// Re-export commonly used types
pub use config::{ChainConfig, Config, KeyStyle, Network};
pub use contract::ContractClient;
pub use error::{Error, Result};
pub use tx::TxPipeline;
pub use wallet::SecureWallet;
