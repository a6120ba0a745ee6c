//! Endpoint overrides from the environment
//!
//! Environment variables take priority over the config file and the network defaults:
//!
//! ```bash
//! export IONFLUX_REST_URL="https://testnet.sentry.lcd.injective.network:443"
//! export IONFLUX_GRPC_URL="https://testnet.sentry.chain.grpc.injective.network:443"
//! export IONFLUX_CHAIN_ID="injective-888"
//! export IONFLUX_GAS_PRICE="500000000inj"
//! ```

use super::ChainConfig;

/// Environment variable names
pub mod env_vars {
    pub const REST_URL: &str = "IONFLUX_REST_URL";
    pub const GRPC_URL: &str = "IONFLUX_GRPC_URL";
    pub const CHAIN_ID: &str = "IONFLUX_CHAIN_ID";
    pub const GAS_PRICE: &str = "IONFLUX_GAS_PRICE";
}

/// Endpoint settings read from the environment
#[derive(Debug, Clone, Default)]
pub struct EndpointOverrides {
    pub rest_url: Option<String>,
    pub grpc_url: Option<String>,
    pub chain_id: Option<String>,
    pub gas_price: Option<String>,
}

impl EndpointOverrides {
    pub fn from_env() -> Self {
        let read = |name: &str| {
            std::env::var(name).ok().filter(|v| !v.trim().is_empty()).inspect(|_| {
                tracing::debug!(var = name, "Using endpoint override from environment");
            })
        };

        Self {
            rest_url: read(env_vars::REST_URL),
            grpc_url: read(env_vars::GRPC_URL),
            chain_id: read(env_vars::CHAIN_ID),
            gas_price: read(env_vars::GAS_PRICE),
        }
    }

    pub(crate) fn apply(&self, chain: &mut ChainConfig) {
        if let Some(url) = &self.rest_url {
            chain.rest_url = url.clone();
        }
        if let Some(url) = &self.grpc_url {
            chain.grpc_url = url.clone();
        }
        if let Some(id) = &self.chain_id {
            chain.chain_id = id.clone();
        }
        if let Some(price) = &self.gas_price {
            chain.gas_price = price.clone();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rest_url.is_none()
            && self.grpc_url.is_none()
            && self.chain_id.is_none()
            && self.gas_price.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Network;

    #[test]
    fn test_empty_overrides_keep_defaults() {
        let overrides = EndpointOverrides::default();
        assert!(overrides.is_empty());

        let mut chain = Network::Local.chain_config();
        overrides.apply(&mut chain);
        assert_eq!(chain, Network::Local.chain_config());
    }

    #[test]
    fn test_apply_replaces_set_fields_only() {
        let overrides = EndpointOverrides {
            grpc_url: Some("http://node:9090".to_string()),
            gas_price: Some("0.1stake".to_string()),
            ..Default::default()
        };

        let mut chain = Network::Local.chain_config();
        overrides.apply(&mut chain);

        assert_eq!(chain.grpc_url, "http://node:9090");
        assert_eq!(chain.gas_price, "0.1stake");
        assert_eq!(chain.rest_url, "http://127.0.0.1:1317");
    }
}
