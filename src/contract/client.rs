//! Liquidity contract client
//!
//! Execute operations go through the `TxPipeline`; every operation treats an
//! unsuccessful chain outcome as `Error::ChainRejection`. Queries go straight to the
//! smart-query endpoint and do not need a signer.

use super::msgs::{self, Cw20BalanceResponse, ExecuteContract, UpdateConfig};
use crate::chain::{Coin, ContractQuerier, TxOutcome};
use crate::tokens::{SymbolAmount, TokenRegistry};
use crate::tx::TxPipeline;
use crate::utils::{format_units, with_deadline, CW20_DECIMALS, DEFAULT_QUERY_DEADLINE};
use crate::{Error, Result};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Base units of every token the faucet hands out
pub const FAUCET_AMOUNT: u128 = 1_000_000_000;

/// Result of a faucet run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReport {
    #[serde(rename = "fn")]
    pub function: String,
    #[serde(rename = "isOk")]
    pub is_ok: bool,
}

impl TransferReport {
    fn new(is_ok: bool) -> Self {
        Self {
            function: "transferTokens".to_string(),
            is_ok,
        }
    }
}

pub struct ContractClient {
    querier: Arc<dyn ContractQuerier>,
    pipeline: Option<Arc<TxPipeline>>,
    contract: String,
    registry: TokenRegistry,
    query_deadline: Duration,
}

impl ContractClient {
    /// Read-only client
    pub fn new(querier: Arc<dyn ContractQuerier>, contract: &str, registry: TokenRegistry) -> Self {
        Self {
            querier,
            pipeline: None,
            contract: contract.to_string(),
            registry,
            query_deadline: DEFAULT_QUERY_DEADLINE,
        }
    }

    /// Enable execute operations, signed by the pipeline's wallet
    pub fn with_pipeline(mut self, pipeline: Arc<TxPipeline>) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Deadline applied to each CW20 balance query
    pub fn with_query_deadline(mut self, deadline: Duration) -> Self {
        self.query_deadline = deadline;
        self
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    fn pipeline(&self) -> Result<&TxPipeline> {
        self.pipeline
            .as_deref()
            .ok_or_else(|| Error::Config("No signer configured for execute operations".to_string()))
    }

    fn sender(&self) -> Result<&str> {
        Ok(self.pipeline()?.address())
    }

    /// Accept a symbol from the registry or a raw contract address
    fn token_address(&self, symbol_or_address: &str) -> String {
        self.registry
            .resolve(symbol_or_address)
            .unwrap_or(symbol_or_address)
            .to_string()
    }

    async fn execute(&self, exec: ExecuteContract, memo: &str) -> Result<TxOutcome> {
        tracing::debug!(contract = %exec.contract, msg = %exec.msg, "Executing contract message");
        self.pipeline()?.execute(vec![exec.to_any()?], memo).await
    }

    // ------------ execute ------------

    pub async fn deposit(&self, token: &str, amount: u128) -> Result<TxOutcome> {
        let exec = msgs::deposit(self.sender()?, &self.contract, &self.token_address(token), amount)?;
        self.execute(exec, "deposit").await
    }

    pub async fn swap(&self, token: &str, amount: u128, token_out: &str) -> Result<TxOutcome> {
        let exec = msgs::swap(
            self.sender()?,
            &self.contract,
            &self.token_address(token),
            amount,
            &self.token_address(token_out),
        )?;
        self.execute(exec, "swap").await
    }

    pub async fn unbond(&self, token: &str, amount: u128) -> Result<TxOutcome> {
        let exec = msgs::unbond(self.sender()?, &self.contract, &self.token_address(token), amount)?;
        self.execute(exec, "unbond").await
    }

    pub async fn withdraw(&self, token: &str, amount: u128) -> Result<TxOutcome> {
        let exec = msgs::withdraw(self.sender()?, &self.contract, &self.token_address(token), amount)?;
        self.execute(exec, "withdraw").await
    }

    pub async fn claim(&self) -> Result<TxOutcome> {
        let exec = msgs::claim(self.sender()?, &self.contract)?;
        self.execute(exec, "claim").await
    }

    pub async fn swap_and_claim(&self, token_out: &str) -> Result<TxOutcome> {
        let exec = msgs::swap_and_claim(self.sender()?, &self.contract, &self.token_address(token_out))?;
        self.execute(exec, "swap_and_claim").await
    }

    pub async fn update_config(&self, update: UpdateConfig) -> Result<TxOutcome> {
        let exec = msgs::update_config(self.sender()?, &self.contract, update)?;
        self.execute(exec, "update_config").await
    }

    pub async fn update_token(
        &self,
        token_addr: &str,
        symbol: &str,
        price_feed_id_str: &str,
    ) -> Result<TxOutcome> {
        let exec = msgs::update_token(
            self.sender()?,
            &self.contract,
            token_addr,
            symbol,
            price_feed_id_str,
        )?;
        self.execute(exec, "update_token").await
    }

    /// Register every token in the registry with the contract, one transaction each
    pub async fn init_tokens(&self) -> Result<Vec<TxOutcome>> {
        let mut outcomes = Vec::with_capacity(self.registry.tokens().len());
        for token in self.registry.tokens() {
            let feed = token.price_feed_id.as_deref().ok_or_else(|| {
                Error::Config(format!("Token {} has no price feed id", token.symbol))
            })?;
            tracing::info!(symbol = %token.symbol, address = %token.address, "Registering token");
            outcomes.push(self.update_token(&token.address, &token.symbol, feed).await?);
        }
        Ok(outcomes)
    }

    /// CW20 transfer of `amount` base units of `token`
    pub async fn transfer(&self, token: &str, recipient: &str, amount: u128) -> Result<TxOutcome> {
        let exec = msgs::transfer(self.sender()?, &self.token_address(token), recipient, amount)?;
        self.execute(exec, "transfer").await
    }

    /// Native bank send from the signer
    pub async fn bank_send(&self, recipient: &str, amount: u128, denom: &str) -> Result<TxOutcome> {
        let pipeline = self.pipeline()?;
        let msg = msgs::bank_send(pipeline.address(), recipient, &[(amount, denom)])?;
        pipeline.execute(vec![msg], "send").await
    }

    /// Faucet: send `FAUCET_AMOUNT` of every registry token to `recipient`
    ///
    /// Transfers run one after another since they share the signer's sequence.
    /// The first failure stops the run and is reported as `isOk: false`, as is an
    /// empty registry.
    pub async fn transfer_tokens(&self, recipient: &str) -> TransferReport {
        if self.registry.is_empty() {
            tracing::warn!(recipient, "Faucet has no tokens configured");
            return TransferReport::new(false);
        }
        for token in self.registry.tokens() {
            if let Err(e) = self.transfer(&token.address, recipient, FAUCET_AMOUNT).await {
                tracing::error!(error = %e, symbol = %token.symbol, recipient, "Faucet transfer failed");
                return TransferReport::new(false);
            }
        }
        TransferReport::new(true)
    }

    // ------------ queries ------------

    async fn query(&self, msg: &impl Serialize) -> Result<Value> {
        let msg = serde_json::to_value(msg)?;
        self.querier.query_smart(&self.contract, &msg).await
    }

    pub async fn query_config(&self) -> Result<Value> {
        self.query(&msgs::query_config()).await
    }

    pub async fn query_tokens_weight(&self, address_list: Vec<String>) -> Result<Value> {
        self.query(&msgs::query_tokens_weight(address_list)).await
    }

    pub async fn query_liquidity(&self, address_list: Vec<String>) -> Result<Value> {
        self.query(&msgs::query_liquidity(address_list)).await
    }

    pub async fn query_providers(&self, address_list: Vec<String>) -> Result<Value> {
        self.query(&msgs::query_providers(address_list)).await
    }

    pub async fn query_tokens(&self, address_list: Vec<String>) -> Result<Value> {
        self.query(&msgs::query_tokens(address_list)).await
    }

    pub async fn query_balances(&self, address_list: Vec<String>) -> Result<Value> {
        self.query(&msgs::query_balances(address_list)).await
    }

    /// Token prices keyed by symbol, sorted by symbol
    pub async fn query_prices(&self, address_list: Vec<String>) -> Result<Vec<SymbolAmount>> {
        let response = self.query(&msgs::query_prices(address_list)).await?;
        let pairs = address_value_pairs(&response)?;
        Ok(self.registry.addr_to_symbol_list(pairs))
    }

    async fn query_cw20_balance(&self, token: &str, wallet: &str) -> Result<u128> {
        let msg = serde_json::to_value(msgs::cw20_balance(wallet))?;
        let response: Cw20BalanceResponse =
            serde_json::from_value(self.querier.query_smart(token, &msg).await?)?;
        response
            .balance
            .parse()
            .map_err(|_| Error::Network(format!("Invalid CW20 balance: {}", response.balance)))
    }

    /// Balances of every registry token held by `wallet`, in display units
    ///
    /// Queries run concurrently, each under its own deadline. Failed queries are
    /// dropped rather than failing the whole call.
    pub async fn query_cw20_balances(&self, wallet: &str) -> Vec<SymbolAmount> {
        let queries = self.registry.tokens().iter().map(|token| async move {
            let result = with_deadline(
                self.query_deadline,
                self.query_cw20_balance(&token.address, wallet),
            )
            .await;
            (token, result)
        });

        let pairs = join_all(queries)
            .await
            .into_iter()
            .filter_map(|(token, result)| match result {
                Ok(raw) => Some((token.address.clone(), format_units(raw, CW20_DECIMALS))),
                Err(e) => {
                    tracing::debug!(error = %e, symbol = %token.symbol, "Dropping failed balance query");
                    None
                }
            })
            .collect::<Vec<_>>();

        self.registry.addr_to_symbol_list(pairs)
    }

    pub async fn query_bank_balances(&self, address: &str) -> Result<Vec<Coin>> {
        self.querier.bank_balances(address).await
    }
}

/// Read `[[address, value], ...]` from a contract response
fn address_value_pairs(response: &Value) -> Result<Vec<(String, String)>> {
    let items = response
        .as_array()
        .ok_or_else(|| Error::Network(format!("Expected a list, got: {}", response)))?;

    items
        .iter()
        .map(|item| match item.as_array().map(Vec::as_slice) {
            Some([Value::String(address), value]) => {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Ok((address.clone(), value))
            }
            _ => Err(Error::Network(format!(
                "Expected an [address, value] pair, got: {}",
                item
            ))),
        })
        .collect()
}

impl std::fmt::Debug for ContractClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractClient")
            .field("contract", &self.contract)
            .field("tokens", &self.registry.tokens().len())
            .field("signer", &self.pipeline.as_ref().map(|p| p.address().to_string()))
            .finish()
    }
}
