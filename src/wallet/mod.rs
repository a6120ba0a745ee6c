//! Secure wallet management
//!
//! This module handles key derivation, seed encryption, fee simulation and
//! transaction signing. The private key NEVER leaves this module.

mod signer;
mod simulator;
pub mod vault;

pub use signer::SecureWallet;
pub use simulator::{compute_fee, Fee, FeeSimulator, GasPrice};
pub use vault::{decrypt_seed, encrypt_seed, CredentialSlot, Credentials};
