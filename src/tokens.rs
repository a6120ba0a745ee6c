//! Shared token registry
//!
//! Centralizes the CW20 tokens handled by the liquidity contract (symbol, contract
//! address, Pyth price feed id) so the contract client and the CLI agree on them.

use crate::config::TokenConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Pyth price feed ids for the tokens the pool was launched with
pub mod price_feeds {
    pub const ATOM: &str = "0x61226d39beea19d334f17c2febce27e12646d84675924ebb02b9cdaea68727e3";
    pub const LUNA: &str = "0x677dbbf4f68b5cb996a40dfae338b87d5efb2e12a9b2686d1ca16d69b3d7f204";
    pub const USDC: &str = "0x41f3625971ca2ed2263e78573fe5ce23e13d2558ed3f2e47ab0f84fb9e7ae722";
    pub const OSMO: &str = "0xd9437c194a4b00ba9d7652cd9af3905e73ee15a2ca4152ac1f8d430cc322b857";

    /// Default feed id by symbol
    pub fn by_symbol(symbol: &str) -> Option<&'static str> {
        match symbol.to_ascii_uppercase().as_str() {
            "ATOM" => Some(ATOM),
            "LUNA" => Some(LUNA),
            "USDC" => Some(USDC),
            "OSMO" => Some(OSMO),
            _ => None,
        }
    }
}

/// Token metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    /// Token symbol (e.g., "ATOM")
    pub symbol: String,
    /// CW20 contract address
    pub address: String,
    /// Pyth price feed id, if known
    pub price_feed_id: Option<String>,
}

/// An amount keyed by token symbol, as returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolAmount {
    pub symbol: String,
    pub amount: String,
}

/// Token registry providing token info lookups
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    /// Tokens in configuration order
    tokens: Vec<TokenInfo>,
    /// Index into `tokens` by contract address
    by_address: HashMap<String, usize>,
}

impl TokenRegistry {
    /// Build the registry from configured tokens
    ///
    /// Tokens without a price feed id fall back to the built-in table.
    /// A repeated address keeps the first entry.
    pub fn from_config(tokens: &[TokenConfig]) -> Self {
        let mut registry = Self::default();
        for token in tokens {
            let price_feed_id = token
                .price_feed_id
                .clone()
                .or_else(|| price_feeds::by_symbol(&token.symbol).map(str::to_string));
            registry.insert(TokenInfo {
                symbol: token.symbol.clone(),
                address: token.address.clone(),
                price_feed_id,
            });
        }
        registry
    }

    fn insert(&mut self, info: TokenInfo) {
        if self.by_address.contains_key(&info.address) {
            tracing::warn!(address = %info.address, "Duplicate token address in config, ignoring");
            return;
        }
        self.by_address.insert(info.address.clone(), self.tokens.len());
        self.tokens.push(info);
    }

    /// Get token info by contract address
    pub fn get(&self, address: &str) -> Option<&TokenInfo> {
        self.by_address.get(address).map(|&i| &self.tokens[i])
    }

    /// Get token info by symbol (case-insensitive)
    pub fn by_symbol(&self, symbol: &str) -> Option<&TokenInfo> {
        self.tokens
            .iter()
            .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
    }

    /// Resolve either a symbol or a contract address to a contract address
    pub fn resolve(&self, symbol_or_address: &str) -> Option<&str> {
        self.get(symbol_or_address)
            .or_else(|| self.by_symbol(symbol_or_address))
            .map(|t| t.address.as_str())
    }

    pub fn tokens(&self) -> &[TokenInfo] {
        &self.tokens
    }

    pub fn addresses(&self) -> Vec<String> {
        self.tokens.iter().map(|t| t.address.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Map `(address, amount)` pairs to `(symbol, amount)` sorted by symbol
    ///
    /// Unknown addresses are dropped. Ties keep input order.
    pub fn addr_to_symbol_list<I, A>(&self, pairs: I) -> Vec<SymbolAmount>
    where
        I: IntoIterator<Item = (A, String)>,
        A: AsRef<str>,
    {
        let mut list: Vec<SymbolAmount> = pairs
            .into_iter()
            .filter_map(|(address, amount)| {
                let info = self.get(address.as_ref());
                if info.is_none() {
                    tracing::debug!(address = address.as_ref(), "Dropping unknown token address");
                }
                info.map(|t| SymbolAmount {
                    symbol: t.symbol.clone(),
                    amount,
                })
            })
            .collect();
        list.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TokenRegistry {
        TokenRegistry::from_config(&[
            TokenConfig {
                symbol: "OSMO".to_string(),
                address: "inj1osmo".to_string(),
                price_feed_id: None,
            },
            TokenConfig {
                symbol: "ATOM".to_string(),
                address: "inj1atom".to_string(),
                price_feed_id: None,
            },
            TokenConfig {
                symbol: "USDC".to_string(),
                address: "inj1usdc".to_string(),
                price_feed_id: Some("0xcustom".to_string()),
            },
        ])
    }

    #[test]
    fn test_price_feed_fallback() {
        let registry = registry();
        assert_eq!(
            registry.get("inj1atom").unwrap().price_feed_id.as_deref(),
            Some(price_feeds::ATOM)
        );
        // configured id wins over the built-in table
        assert_eq!(
            registry.get("inj1usdc").unwrap().price_feed_id.as_deref(),
            Some("0xcustom")
        );
    }

    #[test]
    fn test_resolve_symbol_or_address() {
        let registry = registry();
        assert_eq!(registry.resolve("atom"), Some("inj1atom"));
        assert_eq!(registry.resolve("inj1osmo"), Some("inj1osmo"));
        assert_eq!(registry.resolve("LUNA"), None);
    }

    #[test]
    fn test_addr_to_symbol_list_sorted_regardless_of_input_order() {
        let registry = registry();
        let forward = vec![
            ("inj1osmo", "1".to_string()),
            ("inj1usdc", "2".to_string()),
            ("inj1atom", "3".to_string()),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        let a = registry.addr_to_symbol_list(forward);
        let b = registry.addr_to_symbol_list(reversed);

        assert_eq!(a, b);
        let symbols: Vec<_> = a.iter().map(|s| s.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["ATOM", "OSMO", "USDC"]);
        assert_eq!(a[0].amount, "3");
    }

    #[test]
    fn test_addr_to_symbol_list_drops_unknown() {
        let registry = registry();
        let list = registry.addr_to_symbol_list(vec![
            ("inj1unknown", "9".to_string()),
            ("inj1atom", "1".to_string()),
        ]);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].symbol, "ATOM");
    }

    #[test]
    fn test_duplicate_address_keeps_first() {
        let registry = TokenRegistry::from_config(&[
            TokenConfig {
                symbol: "ATOM".to_string(),
                address: "inj1same".to_string(),
                price_feed_id: None,
            },
            TokenConfig {
                symbol: "LUNA".to_string(),
                address: "inj1same".to_string(),
                price_feed_id: None,
            },
        ]);
        assert_eq!(registry.tokens().len(), 1);
        assert_eq!(registry.get("inj1same").unwrap().symbol, "ATOM");
    }
}
