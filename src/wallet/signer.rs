//! Secure wallet implementation
//!
//! SECURITY: This is the ONLY place where private keys exist.
//! - Keys are derived from the mnemonic once and held for the session
//! - Keys are never serialized
//! - Keys are never logged

use crate::config::{ChainConfig, KeyStyle};
use crate::{Error, Result};
use alloy::primitives::keccak256;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use cosmrs::bip32::{DerivationPath, XPrv};
use cosmrs::proto::cosmos::crypto::secp256k1::PubKey;
use cosmrs::proto::prost::Message;
use cosmrs::{AccountId, Any};
use k256::ecdsa::signature::Signer;
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Key material, by chain convention
enum KeyBackend {
    /// secp256k1 over sha256 digests
    Cosmos(SigningKey),
    /// secp256k1 over keccak256 digests
    Ethereum(PrivateKeySigner),
}

/// Secure wallet that protects private keys
///
/// The private key is:
/// - Derived from a BIP-39 mnemonic (or loaded from hex)
/// - Never serialized (no Serialize impl)
/// - Only accessible via signing operations
pub struct SecureWallet {
    backend: KeyBackend,
    style: KeyStyle,
    /// Compressed SEC1 public key
    public_key: Vec<u8>,
    /// Bech32 address (safe to expose)
    address: String,
}

impl SecureWallet {
    /// Derive a wallet from a mnemonic using the chain's key style and derivation path
    pub fn from_chain_config(mnemonic: &str, chain: &ChainConfig) -> Result<Self> {
        Self::from_mnemonic_with_path(
            mnemonic,
            chain.key_style,
            chain.derivation_path(),
            &chain.bech32_prefix,
        )
    }

    /// Derive a wallet from a mnemonic using the key style's default path
    pub fn from_mnemonic(mnemonic: &str, style: KeyStyle, prefix: &str) -> Result<Self> {
        Self::from_mnemonic_with_path(mnemonic, style, style.derivation_path(), prefix)
    }

    /// Derive a wallet from a mnemonic and an explicit BIP-32 path
    pub fn from_mnemonic_with_path(
        mnemonic: &str,
        style: KeyStyle,
        path: &str,
        prefix: &str,
    ) -> Result<Self> {
        let mnemonic = bip39::Mnemonic::parse_normalized(mnemonic.trim())
            .map_err(|e| Error::InvalidSeed(e.to_string()))?;
        let path: DerivationPath = path
            .parse()
            .map_err(|e| Error::InvalidSeed(format!("Invalid derivation path: {}", e)))?;

        let seed = mnemonic.to_seed("");
        let xprv = XPrv::derive_from_path(seed, &path)
            .map_err(|e| Error::InvalidSeed(format!("Key derivation failed: {}", e)))?;

        Self::from_signing_key(xprv.private_key().clone(), style, prefix)
    }

    /// Create a wallet from a hex-encoded private key
    pub fn from_hex(key_hex: &str, style: KeyStyle, prefix: &str) -> Result<Self> {
        // Remove 0x prefix if present
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);
        let bytes =
            hex::decode(key_hex).map_err(|e| Error::InvalidSeed(format!("Invalid hex: {}", e)))?;
        let key = SigningKey::from_slice(&bytes)
            .map_err(|e| Error::InvalidSeed(format!("Invalid private key: {}", e)))?;

        Self::from_signing_key(key, style, prefix)
    }

    fn from_signing_key(key: SigningKey, style: KeyStyle, prefix: &str) -> Result<Self> {
        let public_key = key
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec();

        let (backend, address_bytes) = match style {
            KeyStyle::Cosmos => {
                let hash = Ripemd160::digest(Sha256::digest(&public_key));
                (KeyBackend::Cosmos(key), hash.to_vec())
            }
            KeyStyle::Ethereum => {
                let signer = PrivateKeySigner::from_signing_key(key);
                let eth_address = signer.address();
                (
                    KeyBackend::Ethereum(signer),
                    eth_address.as_slice().to_vec(),
                )
            }
        };

        let address = AccountId::new(prefix, &address_bytes)
            .map_err(|e| Error::InvalidSeed(format!("Invalid bech32 prefix: {}", e)))?
            .to_string();

        Ok(Self {
            backend,
            style,
            public_key,
            address,
        })
    }

    /// Get the bech32 address (safe to share)
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn key_style(&self) -> KeyStyle {
        self.style
    }

    /// Compressed public key bytes
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Public key wrapped for `SignerInfo`
    pub fn public_key_any(&self) -> Any {
        Any {
            type_url: self.style.pubkey_type_url().to_string(),
            value: PubKey {
                key: self.public_key.clone(),
            }
            .encode_to_vec(),
        }
    }

    /// Sign canonical transaction bytes
    ///
    /// Returns the 64-byte `r || s` signature with low S, as the chain expects.
    /// This is the ONLY way to use the private key.
    pub fn sign(&self, sign_bytes: &[u8]) -> Result<[u8; 64]> {
        let mut out = [0u8; 64];
        match &self.backend {
            KeyBackend::Cosmos(key) => {
                let signature: k256::ecdsa::Signature = key
                    .try_sign(sign_bytes)
                    .map_err(|e| Error::Signing(e.to_string()))?;
                out.copy_from_slice(&signature.to_bytes());
            }
            KeyBackend::Ethereum(signer) => {
                let signature = signer
                    .sign_hash_sync(&keccak256(sign_bytes))
                    .map_err(|e| Error::Signing(e.to_string()))?;
                out.copy_from_slice(&signature.as_bytes()[..64]);
            }
        }
        Ok(out)
    }
}

// Implement Debug manually to avoid exposing the key
impl std::fmt::Debug for SecureWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureWallet")
            .field("address", &self.address)
            .field("style", &self.style)
            .field("signer", &"[REDACTED]")
            .finish()
    }
}
