//! Error types for the IonFlux client

use cosmrs::proto::prost;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gRPC error: {0}")]
    Grpc(#[from] tonic::Status),

    #[error("gRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("Transaction simulation failed: {0}")]
    Simulation(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Transaction {hash} rejected by chain (code {code}): {raw_log}")]
    ChainRejection {
        hash: String,
        code: u32,
        raw_log: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid seed: {0}")]
    InvalidSeed(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error came from the transport rather than the chain's verdict
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::Http(_) | Error::Grpc(_) | Error::Transport(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
