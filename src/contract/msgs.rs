//! Contract message builders
//!
//! Pure constructors for the liquidity contract's execute/query JSON and the CW20
//! messages that carry deposits and swaps. Nothing here touches the network.

use crate::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cosmrs::proto::cosmos::bank::v1beta1::MsgSend;
use cosmrs::proto::cosmos::base::v1beta1::Coin as ProtoCoin;
use cosmrs::proto::cosmwasm::wasm::v1::MsgExecuteContract;
use cosmrs::proto::prost::Message;
use cosmrs::Any;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MSG_EXECUTE_CONTRACT_TYPE_URL: &str = "/cosmwasm.wasm.v1.MsgExecuteContract";
pub const MSG_SEND_TYPE_URL: &str = "/cosmos.bank.v1beta1.MsgSend";

/// Liquidity contract execute messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteMsg {
    UpdateConfig(UpdateConfig),
    UpdateToken {
        token_addr: String,
        symbol: String,
        price_feed_id_str: String,
    },
    Unbond {
        token_addr: String,
        amount: String,
    },
    Withdraw {
        token_addr: String,
        amount: String,
    },
    Claim {},
    SwapAndClaim {
        token_out_addr: String,
    },
}

/// Hook the liquidity contract runs when it receives CW20 tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiveHook {
    Deposit {},
    Swap { token_out_addr: String },
}

/// CW20 token execute messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cw20ExecuteMsg {
    Send {
        contract: String,
        amount: String,
        /// base64 of the hook's JSON
        msg: String,
    },
    Transfer {
        recipient: String,
        amount: String,
    },
}

/// Partial config update; absent fields are left unchanged by the contract
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swap_fee_rate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unbonding_period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_age: Option<String>,
}

impl UpdateConfig {
    /// Build an update from numeric values, stringifying the ones that are set
    pub fn new(
        admin: Option<String>,
        swap_fee_rate: Option<f64>,
        window: Option<u64>,
        unbonding_period: Option<u64>,
        price_age: Option<u64>,
    ) -> Self {
        Self {
            admin,
            swap_fee_rate: swap_fee_rate.map(|v| v.to_string()),
            window: window.map(|v| v.to_string()),
            unbonding_period: unbonding_period.map(|v| v.to_string()),
            price_age: price_age.map(|v| v.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Liquidity contract queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMsg {
    QueryConfig {},
    QueryTokensWeight { address_list: Vec<String> },
    QueryLiquidity { address_list: Vec<String> },
    QueryProviders { address_list: Vec<String> },
    QueryTokens { address_list: Vec<String> },
    QueryBalances { address_list: Vec<String> },
    QueryPrices { address_list: Vec<String> },
}

/// CW20 token queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cw20QueryMsg {
    Balance { address: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Cw20BalanceResponse {
    pub balance: String,
}

/// A `MsgExecuteContract` before protobuf encoding
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteContract {
    pub sender: String,
    pub contract: String,
    pub msg: Value,
    pub funds: Vec<ProtoCoin>,
}

impl ExecuteContract {
    pub fn new(sender: &str, contract: &str, msg: &impl Serialize) -> Result<Self> {
        require_address("sender", sender)?;
        require_address("contract", contract)?;
        Ok(Self {
            sender: sender.to_string(),
            contract: contract.to_string(),
            msg: serde_json::to_value(msg)?,
            funds: vec![],
        })
    }

    pub fn to_any(&self) -> Result<Any> {
        let proto = MsgExecuteContract {
            sender: self.sender.clone(),
            contract: self.contract.clone(),
            msg: serde_json::to_vec(&self.msg)?,
            funds: self.funds.clone(),
        };
        Ok(Any {
            type_url: MSG_EXECUTE_CONTRACT_TYPE_URL.to_string(),
            value: proto.encode_to_vec(),
        })
    }
}

fn require_address(field: &str, address: &str) -> Result<()> {
    if address.trim().is_empty() {
        return Err(Error::InvalidArgument(format!("{} address is empty", field)));
    }
    Ok(())
}

fn require_amount(amount: u128) -> Result<String> {
    if amount == 0 {
        return Err(Error::InvalidArgument("amount must be positive".to_string()));
    }
    Ok(amount.to_string())
}

fn cw20_send(contract: &str, amount: u128, hook: &ReceiveHook) -> Result<Cw20ExecuteMsg> {
    require_address("contract", contract)?;
    Ok(Cw20ExecuteMsg::Send {
        contract: contract.to_string(),
        amount: require_amount(amount)?,
        msg: STANDARD.encode(serde_json::to_vec(hook)?),
    })
}

/// Deposit `amount` of `token` into the pool: a CW20 `send` executed on the token contract
pub fn deposit(sender: &str, contract: &str, token: &str, amount: u128) -> Result<ExecuteContract> {
    let send = cw20_send(contract, amount, &ReceiveHook::Deposit {})?;
    ExecuteContract::new(sender, token, &send)
}

/// Swap `amount` of `token` for `token_out`: a CW20 `send` executed on the token contract
pub fn swap(
    sender: &str,
    contract: &str,
    token: &str,
    amount: u128,
    token_out: &str,
) -> Result<ExecuteContract> {
    require_address("token_out", token_out)?;
    let hook = ReceiveHook::Swap {
        token_out_addr: token_out.to_string(),
    };
    let send = cw20_send(contract, amount, &hook)?;
    ExecuteContract::new(sender, token, &send)
}

pub fn unbond(sender: &str, contract: &str, token_addr: &str, amount: u128) -> Result<ExecuteContract> {
    require_address("token", token_addr)?;
    let msg = ExecuteMsg::Unbond {
        token_addr: token_addr.to_string(),
        amount: require_amount(amount)?,
    };
    ExecuteContract::new(sender, contract, &msg)
}

pub fn withdraw(sender: &str, contract: &str, token_addr: &str, amount: u128) -> Result<ExecuteContract> {
    require_address("token", token_addr)?;
    let msg = ExecuteMsg::Withdraw {
        token_addr: token_addr.to_string(),
        amount: require_amount(amount)?,
    };
    ExecuteContract::new(sender, contract, &msg)
}

pub fn claim(sender: &str, contract: &str) -> Result<ExecuteContract> {
    ExecuteContract::new(sender, contract, &ExecuteMsg::Claim {})
}

pub fn swap_and_claim(sender: &str, contract: &str, token_out_addr: &str) -> Result<ExecuteContract> {
    require_address("token_out", token_out_addr)?;
    let msg = ExecuteMsg::SwapAndClaim {
        token_out_addr: token_out_addr.to_string(),
    };
    ExecuteContract::new(sender, contract, &msg)
}

pub fn update_config(sender: &str, contract: &str, update: UpdateConfig) -> Result<ExecuteContract> {
    if update.is_empty() {
        return Err(Error::InvalidArgument(
            "update_config needs at least one field".to_string(),
        ));
    }
    ExecuteContract::new(sender, contract, &ExecuteMsg::UpdateConfig(update))
}

pub fn update_token(
    sender: &str,
    contract: &str,
    token_addr: &str,
    symbol: &str,
    price_feed_id_str: &str,
) -> Result<ExecuteContract> {
    require_address("token", token_addr)?;
    if symbol.trim().is_empty() || price_feed_id_str.trim().is_empty() {
        return Err(Error::InvalidArgument(
            "symbol and price feed id are required".to_string(),
        ));
    }
    let msg = ExecuteMsg::UpdateToken {
        token_addr: token_addr.to_string(),
        symbol: symbol.to_string(),
        price_feed_id_str: price_feed_id_str.to_string(),
    };
    ExecuteContract::new(sender, contract, &msg)
}

/// CW20 `transfer`, executed on the token contract
pub fn transfer(sender: &str, token: &str, recipient: &str, amount: u128) -> Result<ExecuteContract> {
    require_address("recipient", recipient)?;
    let msg = Cw20ExecuteMsg::Transfer {
        recipient: recipient.to_string(),
        amount: require_amount(amount)?,
    };
    ExecuteContract::new(sender, token, &msg)
}

/// Bank `MsgSend` of native coins
pub fn bank_send(from: &str, to: &str, coins: &[(u128, &str)]) -> Result<Any> {
    require_address("from", from)?;
    require_address("to", to)?;
    if coins.is_empty() {
        return Err(Error::InvalidArgument("no coins to send".to_string()));
    }

    let amount = coins
        .iter()
        .map(|(amount, denom)| {
            if denom.trim().is_empty() {
                return Err(Error::InvalidArgument("coin denom is empty".to_string()));
            }
            Ok(ProtoCoin {
                denom: denom.to_string(),
                amount: require_amount(*amount)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let msg = MsgSend {
        from_address: from.to_string(),
        to_address: to.to_string(),
        amount,
    };
    Ok(Any {
        type_url: MSG_SEND_TYPE_URL.to_string(),
        value: msg.encode_to_vec(),
    })
}

pub fn query_config() -> QueryMsg {
    QueryMsg::QueryConfig {}
}

pub fn query_tokens_weight(address_list: Vec<String>) -> QueryMsg {
    QueryMsg::QueryTokensWeight { address_list }
}

pub fn query_liquidity(address_list: Vec<String>) -> QueryMsg {
    QueryMsg::QueryLiquidity { address_list }
}

pub fn query_providers(address_list: Vec<String>) -> QueryMsg {
    QueryMsg::QueryProviders { address_list }
}

pub fn query_tokens(address_list: Vec<String>) -> QueryMsg {
    QueryMsg::QueryTokens { address_list }
}

pub fn query_balances(address_list: Vec<String>) -> QueryMsg {
    QueryMsg::QueryBalances { address_list }
}

pub fn query_prices(address_list: Vec<String>) -> QueryMsg {
    QueryMsg::QueryPrices { address_list }
}

pub fn cw20_balance(address: &str) -> Cw20QueryMsg {
    Cw20QueryMsg::Balance {
        address: address.to_string(),
    }
}
