//! Chain REST (LCD) client
//!
//! Reads account state, the latest block height, CosmWasm smart queries and bank
//! balances over the node's HTTP gateway. No retries: a failed read fails the call.

use super::{AccountInfo, AccountSource, Coin, ContractQuerier};
use crate::config::ChainConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// REST client for one chain
#[derive(Debug, Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
}

impl RestClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("Invalid REST url {}: {}", base_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Config(format!("Unsupported REST url scheme: {}", base_url)));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_chain_config(chain: &ChainConfig) -> Result<Self> {
        Self::new(
            &chain.rest_url,
            Duration::from_secs(chain.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "GET");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Network(format!(
                "GET {} returned {}: {}",
                path, status, body
            )));
        }

        Ok(response.json::<T>().await?)
    }
}

/// String-or-number JSON integer, as the gateway encodes 64-bit values as strings
fn json_u64(value: &Value, field: &str) -> Result<u64> {
    match value.get(field) {
        Some(Value::String(s)) => s
            .parse()
            .map_err(|_| Error::Network(format!("Field '{}' is not an integer: {}", field, s))),
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| Error::Network(format!("Field '{}' is not a u64: {}", field, n))),
        // proto3 JSON omits zero values
        None | Some(Value::Null) => Ok(0),
        Some(other) => Err(Error::Network(format!(
            "Field '{}' has unexpected type: {}",
            field, other
        ))),
    }
}

/// Parse `/cosmos/auth/v1beta1/accounts/{address}`
///
/// Accepts a plain `BaseAccount`, Injective's `EthAccount { base_account }` and
/// vesting accounts (`base_vesting_account.base_account`).
pub fn parse_account(body: &Value) -> Result<AccountInfo> {
    let account = body
        .get("account")
        .ok_or_else(|| Error::Network("Account response has no 'account' field".to_string()))?;

    let base = account
        .get("base_account")
        .or_else(|| {
            account
                .get("base_vesting_account")
                .and_then(|v| v.get("base_account"))
        })
        .unwrap_or(account);

    Ok(AccountInfo {
        account_number: json_u64(base, "account_number")?,
        sequence: json_u64(base, "sequence")?,
    })
}

/// Parse `/cosmos/base/tendermint/v1beta1/blocks/latest`
pub fn parse_latest_height(body: &Value) -> Result<u64> {
    let header = ["block", "sdk_block"]
        .iter()
        .find_map(|key| body.get(key).and_then(|b| b.get("header")))
        .ok_or_else(|| Error::Network("Latest block response has no header".to_string()))?;

    match json_u64(header, "height")? {
        0 => Err(Error::Network("Latest block height is missing".to_string())),
        height => Ok(height),
    }
}

#[derive(Debug, Deserialize)]
struct SmartQueryResponse {
    data: Value,
}

#[derive(Debug, Deserialize)]
struct BalancesResponse {
    #[serde(default)]
    balances: Vec<Coin>,
}

/// Path of a smart query; the query JSON travels base64-encoded in the URL
pub fn smart_query_path(contract: &str, msg: &Value) -> Result<String> {
    let encoded = URL_SAFE.encode(serde_json::to_vec(msg)?);
    Ok(format!(
        "/cosmwasm/wasm/v1/contract/{}/smart/{}",
        contract, encoded
    ))
}

#[async_trait]
impl AccountSource for RestClient {
    async fn account(&self, address: &str) -> Result<AccountInfo> {
        let body: Value = self
            .get_json(&format!("/cosmos/auth/v1beta1/accounts/{}", address))
            .await?;
        parse_account(&body)
    }

    async fn latest_height(&self) -> Result<u64> {
        let body: Value = self
            .get_json("/cosmos/base/tendermint/v1beta1/blocks/latest")
            .await?;
        parse_latest_height(&body)
    }
}

#[async_trait]
impl ContractQuerier for RestClient {
    async fn query_smart(&self, contract: &str, msg: &Value) -> Result<Value> {
        let response: SmartQueryResponse = self.get_json(&smart_query_path(contract, msg)?).await?;
        Ok(response.data)
    }

    async fn bank_balances(&self, address: &str) -> Result<Vec<Coin>> {
        let response: BalancesResponse = self
            .get_json(&format!("/cosmos/bank/v1beta1/balances/{}", address))
            .await?;
        Ok(response.balances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_base_account() {
        let body = json!({
            "account": {
                "@type": "/cosmos.auth.v1beta1.BaseAccount",
                "address": "wasm1abc",
                "account_number": "12",
                "sequence": "34"
            }
        });
        let account = parse_account(&body).unwrap();
        assert_eq!(account.account_number, 12);
        assert_eq!(account.sequence, 34);
    }

    #[test]
    fn test_parse_eth_account_wrapper() {
        let body = json!({
            "account": {
                "@type": "/injective.types.v1beta1.EthAccount",
                "base_account": {
                    "address": "inj1abc",
                    "account_number": "33720",
                    "sequence": "5"
                },
                "code_hash": "xdJGAYb3IzySfn2y3McDwOUAtlPKgic7e/rYBF2FpHA="
            }
        });
        let account = parse_account(&body).unwrap();
        assert_eq!(account.account_number, 33720);
        assert_eq!(account.sequence, 5);
    }

    #[test]
    fn test_parse_fresh_account_omits_sequence() {
        let body = json!({
            "account": {
                "@type": "/cosmos.auth.v1beta1.BaseAccount",
                "account_number": 9
            }
        });
        let account = parse_account(&body).unwrap();
        assert_eq!(account.account_number, 9);
        assert_eq!(account.sequence, 0);
    }

    #[test]
    fn test_parse_account_rejects_garbage() {
        assert!(parse_account(&json!({"code": 5})).is_err());
        let bad = json!({"account": {"account_number": "x", "sequence": "1"}});
        assert!(matches!(parse_account(&bad), Err(Error::Network(_))));
    }

    #[test]
    fn test_parse_latest_height() {
        let body = json!({"block": {"header": {"chain_id": "injective-888", "height": "1234"}}});
        assert_eq!(parse_latest_height(&body).unwrap(), 1234);

        let sdk = json!({"sdk_block": {"header": {"height": "99"}}});
        assert_eq!(parse_latest_height(&sdk).unwrap(), 99);

        assert!(parse_latest_height(&json!({"block": {}})).is_err());
    }

    #[test]
    fn test_smart_query_path_is_url_safe() {
        let path = smart_query_path("inj1contract", &json!({"query_config": {}})).unwrap();
        let encoded = path.rsplit('/').next().unwrap();
        assert!(path.starts_with("/cosmwasm/wasm/v1/contract/inj1contract/smart/"));
        assert!(!encoded.contains('+') && !encoded.contains('/'));

        let decoded = URL_SAFE.decode(encoded).unwrap();
        let msg: Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(msg, json!({"query_config": {}}));
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let client = RestClient::new("http://127.0.0.1:1317/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:1317");
    }

    #[test]
    fn test_new_rejects_bad_url() {
        assert!(matches!(
            RestClient::new("not a url", Duration::from_secs(1)),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            RestClient::new("ftp://node:1317", Duration::from_secs(1)),
            Err(Error::Config(_))
        ));
    }
}
