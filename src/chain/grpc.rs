//! gRPC transaction service client
//!
//! Simulation and SYNC-mode broadcast through `cosmos.tx.v1beta1.Service`.

use super::{TxOutcome, TxService};
use crate::config::ChainConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use cosmrs::proto::cosmos::base::abci::v1beta1::TxResponse;
use cosmrs::proto::cosmos::tx::v1beta1::service_client::ServiceClient as TxServiceClient;
use cosmrs::proto::cosmos::tx::v1beta1::{BroadcastMode, BroadcastTxRequest, SimulateRequest};
use std::time::Duration;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tonic::Code;

/// Transaction service over a lazily connected gRPC channel
#[derive(Debug, Clone)]
pub struct GrpcTxClient {
    /// See https://docs.rs/tonic/latest/tonic/transport/struct.Channel.html#multiplexing-requests
    channel: Channel,
}

impl GrpcTxClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let mut endpoint = Endpoint::from_shared(url.to_string())?.timeout(timeout);
        if url.starts_with("https://") {
            endpoint = endpoint.tls_config(ClientTlsConfig::new().with_webpki_roots())?;
        }
        Ok(Self {
            channel: endpoint.connect_lazy(),
        })
    }

    pub fn from_chain_config(chain: &ChainConfig) -> Result<Self> {
        Self::new(
            &chain.grpc_url,
            Duration::from_secs(chain.request_timeout_secs),
        )
    }
}

/// Transport-level statuses are network failures; anything else is the chain refusing the dry-run
fn simulation_error(status: tonic::Status) -> Error {
    match status.code() {
        Code::Unavailable | Code::DeadlineExceeded | Code::Cancelled => Error::Grpc(status),
        _ => Error::Simulation(status.message().to_string()),
    }
}

pub(crate) fn outcome_from_response(response: TxResponse) -> TxOutcome {
    TxOutcome {
        hash: response.txhash,
        code: response.code,
        gas_wanted: response.gas_wanted.max(0) as u64,
        gas_used: response.gas_used.max(0) as u64,
        raw_log: response.raw_log,
        height: response.height.max(0) as u64,
    }
}

#[async_trait]
impl TxService for GrpcTxClient {
    async fn simulate(&self, tx_bytes: Vec<u8>) -> Result<u64> {
        let mut client = TxServiceClient::new(self.channel.clone());

        #[allow(deprecated)]
        let request = tonic::Request::new(SimulateRequest { tx: None, tx_bytes });
        let response = client
            .simulate(request)
            .await
            .map_err(simulation_error)?
            .into_inner();

        let gas_info = response
            .gas_info
            .ok_or_else(|| Error::Simulation("Simulation returned no gas info".to_string()))?;
        Ok(gas_info.gas_used)
    }

    async fn broadcast(&self, tx_bytes: Vec<u8>) -> Result<TxOutcome> {
        let mut client = TxServiceClient::new(self.channel.clone());

        let request = BroadcastTxRequest {
            tx_bytes,
            mode: BroadcastMode::Sync as i32,
        };
        let response = client
            .broadcast_tx(request)
            .await?
            .into_inner()
            .tx_response
            .ok_or_else(|| Error::Network("Empty tx_response".to_string()))?;

        let outcome = outcome_from_response(response);
        if outcome.code != 0 {
            tracing::warn!(hash = %outcome.hash, code = outcome.code, raw_log = %outcome.raw_log, "Broadcast returned non-zero code");
        }
        Ok(outcome)
    }
}
