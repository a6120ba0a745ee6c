//! Fee estimation by transaction simulation
//!
//! Dry-runs a signed, fee-less envelope through the chain's `Simulate` endpoint to:
//! - Catch execution failures before paying for them
//! - Measure the gas the messages actually use
//! - Price that gas (plus a safety margin) in the fee denom
//!
//! SECURITY NOTE:
//! - This module never broadcasts
//! - The signature it is given is a throwaway over the pre-fee sign bytes

use crate::chain::TxService;
use crate::config::ChainConfig;
use crate::tx::UnsignedTx;
use crate::{Error, Result};
use bigdecimal::{BigDecimal, ToPrimitive};
use cosmrs::proto::cosmos::base::v1beta1::Coin as ProtoCoin;
use cosmrs::proto::cosmos::tx::v1beta1::Fee as ProtoFee;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// Price of one unit of gas, e.g. `500000000inj`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasPrice {
    pub amount: BigDecimal,
    pub denom: String,
}

impl GasPrice {
    /// Parse `"<decimal><denom>"`
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        let split = value
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| Error::Config(format!("Gas price '{}' has no denom", value)))?;
        let (amount, denom) = value.split_at(split);

        let amount = BigDecimal::from_str(amount)
            .map_err(|e| Error::Config(format!("Invalid gas price '{}': {}", value, e)))?;
        Ok(Self {
            amount,
            denom: denom.to_string(),
        })
    }
}

impl std::fmt::Display for GasPrice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Fee attached to the final envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    /// Gas limit, `ceil(margin * gas_used)`
    pub gas_wanted: u64,
    /// Gas price the amount was computed with
    pub gas_price: String,
    /// `ceil(gas_price * gas_wanted)` in base units of `denom`
    pub amount: u128,
    pub denom: String,
}

impl Fee {
    pub fn to_proto(&self) -> ProtoFee {
        ProtoFee {
            amount: vec![ProtoCoin {
                denom: self.denom.clone(),
                amount: self.amount.to_string(),
            }],
            gas_limit: self.gas_wanted,
            ..Default::default()
        }
    }
}

/// `ceil` of a non-negative decimal as an integer
fn ceil_to_u128(value: &BigDecimal) -> Result<u128> {
    let floor = value.with_scale(0);
    let floor = if &floor < value { floor + BigDecimal::from(1) } else { floor };
    floor
        .to_u128()
        .ok_or_else(|| Error::Simulation(format!("Fee value out of range: {}", value)))
}

/// Derive the fee from simulated gas usage
pub fn compute_fee(gas_used: u64, margin: f64, gas_price: &GasPrice) -> Result<Fee> {
    // Parse the margin from its shortest decimal form so 1.2 stays exactly 1.2
    let margin = BigDecimal::from_str(&margin.to_string())
        .map_err(|e| Error::Config(format!("Invalid gas adjustment {}: {}", margin, e)))?;

    let gas_wanted = ceil_to_u128(&(margin * BigDecimal::from(gas_used)))?;
    let gas_wanted = u64::try_from(gas_wanted)
        .map_err(|_| Error::Simulation(format!("Gas wanted out of range: {}", gas_wanted)))?;

    let amount = ceil_to_u128(&(gas_price.amount.clone() * BigDecimal::from(gas_wanted)))?;

    Ok(Fee {
        gas_wanted,
        gas_price: gas_price.to_string(),
        amount,
        denom: gas_price.denom.clone(),
    })
}

/// Estimates fees by simulating the pre-fee envelope
pub struct FeeSimulator {
    service: Arc<dyn TxService>,
    gas_price: GasPrice,
    margin: f64,
}

impl FeeSimulator {
    pub fn new(service: Arc<dyn TxService>, gas_price: GasPrice, margin: f64) -> Self {
        Self {
            service,
            gas_price,
            margin,
        }
    }

    /// Create a simulator from the chain's gas price and adjustment
    pub fn from_chain_config(service: Arc<dyn TxService>, chain: &ChainConfig) -> Result<Self> {
        if !(chain.gas_adjustment.is_finite() && chain.gas_adjustment > 0.0) {
            return Err(Error::Config(format!(
                "gas_adjustment must be positive, got {}",
                chain.gas_adjustment
            )));
        }
        Ok(Self::new(
            service,
            GasPrice::parse(&chain.gas_price)?,
            chain.gas_adjustment,
        ))
    }

    pub fn gas_price(&self) -> &GasPrice {
        &self.gas_price
    }

    /// Simulate the fee-less envelope and price the result
    ///
    /// A rejected dry-run is an error; there is no fallback fee.
    pub async fn simulate_fee(&self, unsigned: &UnsignedTx, throwaway_signature: &[u8]) -> Result<Fee> {
        let tx_bytes = unsigned.to_tx_bytes(throwaway_signature);
        let gas_used = self.service.simulate(tx_bytes).await?;

        let fee = compute_fee(gas_used, self.margin, &self.gas_price)?;
        tracing::debug!(
            gas_used,
            gas_wanted = fee.gas_wanted,
            fee_amount = %fee.amount,
            denom = %fee.denom,
            "Simulated transaction fee"
        );
        Ok(fee)
    }
}

impl std::fmt::Debug for FeeSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeeSimulator")
            .field("gas_price", &self.gas_price.to_string())
            .field("margin", &self.margin)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{TxOutcome, TxService};
    use async_trait::async_trait;

    struct FixedGas(Result<u64>);

    #[async_trait]
    impl TxService for FixedGas {
        async fn simulate(&self, _tx_bytes: Vec<u8>) -> Result<u64> {
            match &self.0 {
                Ok(gas) => Ok(*gas),
                Err(e) => Err(Error::Simulation(e.to_string())),
            }
        }

        async fn broadcast(&self, _tx_bytes: Vec<u8>) -> Result<TxOutcome> {
            unreachable!("simulator never broadcasts")
        }
    }

    fn unsigned() -> UnsignedTx {
        UnsignedTx {
            body_bytes: vec![1],
            auth_info_bytes: vec![2],
            sign_bytes: vec![3],
            timeout_height: 100,
        }
    }

    #[test]
    fn test_parse_gas_price() {
        let price = GasPrice::parse("500000000inj").unwrap();
        assert_eq!(price.amount, BigDecimal::from(500_000_000u64));
        assert_eq!(price.denom, "inj");

        let price = GasPrice::parse("0.025stake").unwrap();
        assert_eq!(price.denom, "stake");
        assert_eq!(price.to_string(), "0.025stake");

        assert!(GasPrice::parse("500000000").is_err());
        assert!(GasPrice::parse("inj").is_err());
    }

    #[test]
    fn test_fee_uses_ceil() {
        let price = GasPrice::parse("0.025stake").unwrap();

        // 1.2 * 100_001 = 120_001.2 -> 120_002
        let fee = compute_fee(100_001, 1.2, &price).unwrap();
        assert_eq!(fee.gas_wanted, 120_002);
        // 0.025 * 120_002 = 3_000.05 -> 3_001
        assert_eq!(fee.amount, 3_001);
        assert_eq!(fee.denom, "stake");
    }

    #[test]
    fn test_fee_exact_margin_has_no_rounding_drift() {
        let price = GasPrice::parse("500000000inj").unwrap();

        // 1.2 * 100_000 = 120_000 exactly, no ceil bump
        let fee = compute_fee(100_000, 1.2, &price).unwrap();
        assert_eq!(fee.gas_wanted, 120_000);
        assert_eq!(fee.amount, 60_000_000_000_000);

        let proto = fee.to_proto();
        assert_eq!(proto.gas_limit, 120_000);
        assert_eq!(proto.amount[0].amount, "60000000000000");
        assert_eq!(proto.amount[0].denom, "inj");
    }

    #[tokio::test]
    async fn test_simulate_fee_applies_margin() {
        let simulator = FeeSimulator::new(
            Arc::new(FixedGas(Ok(200_000))),
            GasPrice::parse("500000000inj").unwrap(),
            1.2,
        );
        let fee = simulator.simulate_fee(&unsigned(), &[0u8; 64]).await.unwrap();
        assert_eq!(fee.gas_wanted, 240_000);
    }

    #[tokio::test]
    async fn test_simulate_fee_propagates_rejection() {
        let simulator = FeeSimulator::new(
            Arc::new(FixedGas(Err(Error::Simulation("out of gas".to_string())))),
            GasPrice::parse("500000000inj").unwrap(),
            1.2,
        );
        let err = simulator
            .simulate_fee(&unsigned(), &[0u8; 64])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Simulation(_)));
    }

    #[test]
    fn test_rejects_non_positive_margin() {
        let mut chain = crate::config::Network::Local.chain_config();
        chain.gas_adjustment = 0.0;
        let result = FeeSimulator::from_chain_config(Arc::new(FixedGas(Ok(1))), &chain);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
