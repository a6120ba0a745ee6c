//! Configuration for the IonFlux client

pub mod endpoints;

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use endpoints::EndpointOverrides;

/// Key and address conventions of the target chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeyStyle {
    /// Injective-style keys: coin type 60, keccak256 addresses and digests
    #[default]
    Ethereum,
    /// Standard Cosmos SDK keys: coin type 118, sha256/ripemd160
    Cosmos,
}

impl KeyStyle {
    /// Default BIP-44 derivation path
    pub fn derivation_path(&self) -> &'static str {
        match self {
            KeyStyle::Ethereum => "m/44'/60'/0'/0/0",
            KeyStyle::Cosmos => "m/44'/118'/0'/0/0",
        }
    }

    /// Protobuf type URL of the signer public key
    pub fn pubkey_type_url(&self) -> &'static str {
        match self {
            KeyStyle::Ethereum => "/injective.crypto.v1beta1.ethsecp256k1.PubKey",
            KeyStyle::Cosmos => "/cosmos.crypto.secp256k1.PubKey",
        }
    }
}

/// Supported networks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    #[default]
    InjectiveTestnet,
    InjectiveMainnet,
    /// Single-node wasmd chain on localhost
    Local,
}

impl Network {
    pub fn name(&self) -> &'static str {
        match self {
            Network::InjectiveTestnet => "injective_testnet",
            Network::InjectiveMainnet => "injective_mainnet",
            Network::Local => "local",
        }
    }

    /// Built-in chain parameters for this network
    pub fn chain_config(&self) -> ChainConfig {
        match self {
            Network::InjectiveTestnet => ChainConfig {
                chain_id: "injective-888".to_string(),
                rest_url: "https://testnet.sentry.lcd.injective.network:443".to_string(),
                grpc_url: "https://testnet.sentry.chain.grpc.injective.network:443".to_string(),
                bech32_prefix: "inj".to_string(),
                denom: "inj".to_string(),
                key_style: KeyStyle::Ethereum,
                derivation_path: None,
                gas_price: "500000000inj".to_string(),
                gas_adjustment: DEFAULT_GAS_ADJUSTMENT,
                timeout_block_buffer: DEFAULT_TIMEOUT_BLOCK_BUFFER,
                simulation_gas_limit: DEFAULT_SIMULATION_GAS_LIMIT,
                request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            },
            Network::InjectiveMainnet => ChainConfig {
                chain_id: "injective-1".to_string(),
                rest_url: "https://sentry.lcd.injective.network:443".to_string(),
                grpc_url: "https://sentry.chain.grpc.injective.network:443".to_string(),
                ..Network::InjectiveTestnet.chain_config()
            },
            Network::Local => ChainConfig {
                chain_id: "testing".to_string(),
                rest_url: "http://127.0.0.1:1317".to_string(),
                grpc_url: "http://127.0.0.1:9090".to_string(),
                bech32_prefix: "wasm".to_string(),
                denom: "stake".to_string(),
                key_style: KeyStyle::Cosmos,
                derivation_path: None,
                gas_price: "0.025stake".to_string(),
                gas_adjustment: DEFAULT_GAS_ADJUSTMENT,
                timeout_block_buffer: DEFAULT_TIMEOUT_BLOCK_BUFFER,
                simulation_gas_limit: DEFAULT_SIMULATION_GAS_LIMIT,
                request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            },
        }
    }
}

/// Gas margin applied to simulated gas
pub const DEFAULT_GAS_ADJUSTMENT: f64 = 1.2;
/// Blocks added to the latest height to form the tx timeout height
pub const DEFAULT_TIMEOUT_BLOCK_BUFFER: u64 = 90;
/// Gas limit placed in the fee-less envelope used for simulation
pub const DEFAULT_SIMULATION_GAS_LIMIT: u64 = 400_000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Resolved chain parameters used by the transaction pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: String,
    pub rest_url: String,
    pub grpc_url: String,
    pub bech32_prefix: String,
    /// Native fee denom
    pub denom: String,
    pub key_style: KeyStyle,
    /// Overrides the key style's default derivation path
    pub derivation_path: Option<String>,
    /// Gas price with denom, e.g. "500000000inj"
    pub gas_price: String,
    /// Margin applied to simulated gas (e.g. 1.2)
    pub gas_adjustment: f64,
    pub timeout_block_buffer: u64,
    pub simulation_gas_limit: u64,
    pub request_timeout_secs: u64,
}

impl ChainConfig {
    pub fn derivation_path(&self) -> &str {
        self.derivation_path
            .as_deref()
            .unwrap_or_else(|| self.key_style.derivation_path())
    }
}

/// Per-field overrides of the network's chain parameters, as read from the config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grpc_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bech32_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_style: Option<KeyStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derivation_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_adjustment: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_block_buffer: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulation_gas_limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl ChainOverrides {
    fn apply(&self, base: &mut ChainConfig) {
        macro_rules! set {
            ($($field:ident),*) => {
                $(if let Some(v) = &self.$field { base.$field = v.clone(); })*
            };
        }
        set!(
            chain_id,
            rest_url,
            grpc_url,
            bech32_prefix,
            denom,
            gas_price,
            timeout_block_buffer,
            simulation_gas_limit,
            request_timeout_secs
        );
        if let Some(style) = self.key_style {
            base.key_style = style;
        }
        if let Some(path) = &self.derivation_path {
            base.derivation_path = Some(path.clone());
        }
        if let Some(adj) = self.gas_adjustment {
            base.gas_adjustment = adj;
        }
    }
}

/// A CW20 token known to the liquidity contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub symbol: String,
    pub address: String,
    /// Pyth price feed id; falls back to the built-in table when absent
    #[serde(default)]
    pub price_feed_id: Option<String>,
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub network: Network,
    /// Overrides of the network's built-in chain parameters
    #[serde(default)]
    pub chain: ChainOverrides,
    /// Address of the liquidity contract
    #[serde(default)]
    pub contract_address: String,
    /// CW20 tokens handled by the contract
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
    /// Address the unlocked seed must derive to, if set
    #[serde(default)]
    pub dapp_address: Option<String>,
    /// Path to the transaction audit log (JSONL)
    #[serde(default)]
    pub audit_log_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: Network::default(),
            chain: ChainOverrides::default(),
            contract_address: String::new(),
            tokens: Vec::new(),
            dapp_address: None,
            audit_log_path: Some("ionflux-audit.jsonl".to_string()),
        }
    }
}

impl Config {
    /// Load a JSON config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Resolve chain parameters
    ///
    /// Priority: environment overrides, then the config file, then network defaults.
    pub fn chain_config(&self) -> ChainConfig {
        self.chain_config_with(&EndpointOverrides::from_env())
    }

    pub fn chain_config_with(&self, env: &EndpointOverrides) -> ChainConfig {
        let mut chain = self.network.chain_config();
        self.chain.apply(&mut chain);
        env.apply(&mut chain);
        chain
    }

    /// Contract address, rejecting an unset value
    pub fn require_contract_address(&self) -> Result<&str> {
        if self.contract_address.trim().is_empty() {
            return Err(Error::Config(
                "contract_address is not set in the config file".to_string(),
            ));
        }
        Ok(&self.contract_address)
    }
}
