//! IonFlux CLI
//!
//! Command-line interface for the IonFlux liquidity contract.

use clap::{Parser, Subcommand};
use ionflux_client::audit::AuditLog;
use ionflux_client::chain::{GrpcTxClient, RestClient};
use ionflux_client::contract::{ContractClient, UpdateConfig};
use ionflux_client::tokens::TokenRegistry;
use ionflux_client::utils::trim_decimal;
use ionflux_client::wallet::{encrypt_seed, CredentialSlot, Credentials};
use ionflux_client::{ChainConfig, Config, Error, Result, TxPipeline};
use secrecy::SecretString;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable names
mod env_vars {
    pub const MNEMONIC: &str = "IONFLUX_MNEMONIC";
    pub const ENCRYPTED_SEED: &str = "IONFLUX_ENCRYPTED_SEED";
    pub const ENCRYPTION_KEY: &str = "IONFLUX_ENCRYPTION_KEY";
    pub const LOG_JSON: &str = "IONFLUX_LOG_JSON";
}

#[derive(Parser)]
#[command(name = "ionflux")]
#[command(about = "Client for the IonFlux CosmWasm liquidity contract")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// File holding the seed encryption key
    #[arg(long, global = true)]
    key_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the signer address derived from the configured seed
    Address,

    /// Deposit tokens into the pool
    Deposit {
        /// Token symbol or CW20 address
        #[arg(long)]
        token: String,
        /// Amount in base units
        #[arg(long)]
        amount: u128,
    },

    /// Swap one pool token for another
    Swap {
        /// Token symbol or CW20 address to sell
        #[arg(long)]
        token: String,
        /// Amount in base units
        #[arg(long)]
        amount: u128,
        /// Token symbol or CW20 address to buy
        #[arg(long)]
        token_out: String,
    },

    /// Start unbonding deposited liquidity
    Unbond {
        #[arg(long)]
        token: String,
        #[arg(long)]
        amount: u128,
    },

    /// Withdraw unbonded liquidity
    Withdraw {
        #[arg(long)]
        token: String,
        #[arg(long)]
        amount: u128,
    },

    /// Claim accumulated rewards
    Claim,

    /// Swap rewards into one token and claim them
    SwapAndClaim {
        #[arg(long)]
        token_out: String,
    },

    /// Update the contract config (admin only)
    UpdateConfig {
        #[arg(long)]
        admin: Option<String>,
        #[arg(long)]
        swap_fee_rate: Option<f64>,
        #[arg(long)]
        window: Option<u64>,
        #[arg(long)]
        unbonding_period: Option<u64>,
        #[arg(long)]
        price_age: Option<u64>,
    },

    /// Register or update a pool token (admin only)
    UpdateToken {
        #[arg(long)]
        token_addr: String,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        price_feed_id: String,
    },

    /// Register every configured token with the contract (admin only)
    InitTokens,

    /// CW20 transfer
    Transfer {
        #[arg(long)]
        token: String,
        #[arg(long)]
        recipient: String,
        #[arg(long)]
        amount: u128,
    },

    /// Faucet: send every configured token to a recipient
    TransferTokens {
        #[arg(long)]
        recipient: String,
    },

    /// Send native coins
    Send {
        #[arg(long)]
        recipient: String,
        /// Amount in base units
        #[arg(long)]
        amount: u128,
        /// Defaults to the chain's fee denom
        #[arg(long)]
        denom: Option<String>,
    },

    /// Query the liquidity contract
    Query {
        #[command(subcommand)]
        query: QueryCommand,
    },

    /// CW20 balances of every configured token
    Cw20Balances {
        #[arg(long)]
        wallet: String,
    },

    /// Native balances of an address
    BankBalances {
        #[arg(long)]
        address: String,
    },

    /// Encrypt the seed in IONFLUX_MNEMONIC with the configured encryption key
    EncryptSeed,

    /// Trim insignificant decimals from a price
    TrimDecimal {
        price: String,
        #[arg(long, default_value = "0.001")]
        err: String,
    },

    /// Show current configuration
    Config,
}

#[derive(Subcommand)]
enum QueryCommand {
    Config,
    TokensWeight {
        /// Filter by address (repeatable)
        #[arg(long = "address")]
        addresses: Vec<String>,
    },
    Liquidity {
        #[arg(long = "address")]
        addresses: Vec<String>,
    },
    Providers {
        #[arg(long = "address")]
        addresses: Vec<String>,
    },
    Tokens {
        #[arg(long = "address")]
        addresses: Vec<String>,
    },
    Balances {
        #[arg(long = "address")]
        addresses: Vec<String>,
    },
    Prices {
        #[arg(long = "address")]
        addresses: Vec<String>,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let json = std::env::var(env_vars::LOG_JSON)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    // stdout is reserved for command output
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let chain = config.chain_config();
    let session = Session {
        config,
        chain,
        key_file: cli.key_file,
        credentials: CredentialSlot::new(),
    };

    match cli.command {
        Commands::Address => {
            let credentials = session.credentials()?;
            println!("{}", credentials.address());
        }
        Commands::Deposit { token, amount } => {
            print_json(&session.signing_client()?.deposit(&token, amount).await?)?;
        }
        Commands::Swap {
            token,
            amount,
            token_out,
        } => {
            let client = session.signing_client()?;
            print_json(&client.swap(&token, amount, &token_out).await?)?;
        }
        Commands::Unbond { token, amount } => {
            print_json(&session.signing_client()?.unbond(&token, amount).await?)?;
        }
        Commands::Withdraw { token, amount } => {
            print_json(&session.signing_client()?.withdraw(&token, amount).await?)?;
        }
        Commands::Claim => {
            print_json(&session.signing_client()?.claim().await?)?;
        }
        Commands::SwapAndClaim { token_out } => {
            print_json(&session.signing_client()?.swap_and_claim(&token_out).await?)?;
        }
        Commands::UpdateConfig {
            admin,
            swap_fee_rate,
            window,
            unbonding_period,
            price_age,
        } => {
            let update = UpdateConfig::new(admin, swap_fee_rate, window, unbonding_period, price_age);
            print_json(&session.signing_client()?.update_config(update).await?)?;
        }
        Commands::UpdateToken {
            token_addr,
            symbol,
            price_feed_id,
        } => {
            let client = session.signing_client()?;
            print_json(&client.update_token(&token_addr, &symbol, &price_feed_id).await?)?;
        }
        Commands::InitTokens => {
            print_json(&session.signing_client()?.init_tokens().await?)?;
        }
        Commands::Transfer {
            token,
            recipient,
            amount,
        } => {
            let client = session.signing_client()?;
            print_json(&client.transfer(&token, &recipient, amount).await?)?;
        }
        Commands::TransferTokens { recipient } => {
            let report = session.signing_client()?.transfer_tokens(&recipient).await;
            print_json(&report)?;
            if !report.is_ok {
                return Err(Error::Network("Faucet transfer did not complete".to_string()));
            }
        }
        Commands::Send {
            recipient,
            amount,
            denom,
        } => {
            let denom = denom.unwrap_or_else(|| session.chain.denom.clone());
            let client = session.signing_client()?;
            print_json(&client.bank_send(&recipient, amount, &denom).await?)?;
        }
        Commands::Query { query } => {
            run_query(&session, query).await?;
        }
        Commands::Cw20Balances { wallet } => {
            print_json(&session.read_client()?.query_cw20_balances(&wallet).await)?;
        }
        Commands::BankBalances { address } => {
            print_json(&session.read_client()?.query_bank_balances(&address).await?)?;
        }
        Commands::EncryptSeed => {
            let seed = std::env::var(env_vars::MNEMONIC)
                .map_err(|_| Error::Config(format!("{} is not set", env_vars::MNEMONIC)))?;
            let key = session.encryption_key()?;
            println!("{}", encrypt_seed(&SecretString::from(seed), &key)?);
        }
        Commands::TrimDecimal { price, err } => {
            println!("{}", trim_decimal(&price, &err)?);
        }
        Commands::Config => {
            print_json(&session.config)?;
            print_json(&session.chain)?;
        }
    }

    Ok(())
}

async fn run_query(session: &Session, query: QueryCommand) -> Result<()> {
    session.config.require_contract_address()?;
    let client = session.read_client()?;

    let result = match query {
        QueryCommand::Config => client.query_config().await?,
        QueryCommand::TokensWeight { addresses } => client.query_tokens_weight(addresses).await?,
        QueryCommand::Liquidity { addresses } => client.query_liquidity(addresses).await?,
        QueryCommand::Providers { addresses } => client.query_providers(addresses).await?,
        QueryCommand::Tokens { addresses } => client.query_tokens(addresses).await?,
        QueryCommand::Balances { addresses } => client.query_balances(addresses).await?,
        QueryCommand::Prices { addresses } => {
            serde_json::to_value(client.query_prices(addresses).await?)?
        }
    };
    print_json(&result)
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Per-invocation state: resolved config and the lazily unlocked signer
struct Session {
    config: Config,
    chain: ChainConfig,
    key_file: Option<PathBuf>,
    credentials: CredentialSlot,
}

impl Session {
    fn encryption_key(&self) -> Result<SecretString> {
        if let Ok(key) = std::env::var(env_vars::ENCRYPTION_KEY) {
            if !key.trim().is_empty() {
                return Ok(SecretString::from(key.trim().to_string()));
            }
        }
        match &self.key_file {
            Some(path) => read_key_file(path),
            None => Err(Error::Config("key is not found".to_string())),
        }
    }

    /// Unlock the signer once
    ///
    /// Seed sources, in order: IONFLUX_MNEMONIC, then IONFLUX_ENCRYPTED_SEED
    /// decrypted with the encryption key.
    fn credentials(&self) -> Result<&Credentials> {
        if self.credentials.is_set() {
            return self.credentials.get();
        }

        let expected = self.config.dapp_address.as_deref();
        let credentials = match std::env::var(env_vars::MNEMONIC) {
            Ok(mnemonic) => {
                tracing::debug!("Using seed from {}", env_vars::MNEMONIC);
                Credentials::from_mnemonic(&SecretString::from(mnemonic), &self.chain, expected)?
            }
            Err(_) => {
                let blob = std::env::var(env_vars::ENCRYPTED_SEED).map_err(|_| {
                    Error::Config(format!(
                        "Set {} or {} to sign transactions",
                        env_vars::MNEMONIC,
                        env_vars::ENCRYPTED_SEED
                    ))
                })?;
                Credentials::unlock(&blob, &self.encryption_key()?, &self.chain, expected)?
            }
        };

        self.credentials.set(credentials)?;
        self.credentials.get()
    }

    fn registry(&self) -> TokenRegistry {
        TokenRegistry::from_config(&self.config.tokens)
    }

    fn read_client(&self) -> Result<ContractClient> {
        let rest = Arc::new(RestClient::from_chain_config(&self.chain)?);
        Ok(ContractClient::new(
            rest,
            &self.config.contract_address,
            self.registry(),
        ))
    }

    fn signing_client(&self) -> Result<ContractClient> {
        let contract = self.config.require_contract_address()?;
        let wallet = self.credentials()?.wallet();

        let rest = Arc::new(RestClient::from_chain_config(&self.chain)?);
        let grpc = Arc::new(GrpcTxClient::from_chain_config(&self.chain)?);

        let mut pipeline = TxPipeline::new(wallet, self.chain.clone(), rest.clone(), grpc)?;
        if let Some(path) = &self.config.audit_log_path {
            pipeline = pipeline.with_audit_log(AuditLog::new(path));
        }

        tracing::info!(
            network = self.config.network.name(),
            chain_id = %self.chain.chain_id,
            signer = %pipeline.address(),
            "Signing client ready"
        );

        Ok(ContractClient::new(rest, contract, self.registry()).with_pipeline(Arc::new(pipeline)))
    }
}

fn read_key_file(path: &Path) -> Result<SecretString> {
    let key = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(Error::Config("key is not found".to_string()));
    }
    Ok(SecretString::from(key.to_string()))
}
