//! IonFlux liquidity contract: message builders and client

pub mod client;
pub mod msgs;

pub use client::{ContractClient, TransferReport, FAUCET_AMOUNT};
pub use msgs::{ExecuteContract, UpdateConfig};
