//! Encrypted seed storage and the session credential
//!
//! The dApp seed is kept at rest as `base64(salt || nonce || ciphertext)`:
//! AES-256-GCM with a key derived from the passphrase by Argon2id.
//! A decrypted seed only ever lives inside a `SecretString` and is turned into a
//! `SecureWallet` immediately.

use super::SecureWallet;
use crate::config::ChainConfig;
use crate::{Error, Result};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use secrecy::{ExposeSecret, SecretString};
use std::sync::{Arc, OnceLock};

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;

/// Derive a 256-bit AES key from a passphrase using Argon2id (m=19456 KiB, t=2, p=1)
fn derive_key(passphrase: &SecretString, salt: &[u8]) -> Result<[u8; 32]> {
    let params = Params::new(19_456, 2, 1, Some(32))
        .map_err(|e| Error::Config(format!("Invalid argon2 params: {}", e)))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; 32];
    argon2
        .hash_password_into(passphrase.expose_secret().as_bytes(), salt, &mut key)
        .map_err(|e| Error::Config(format!("Key derivation failed: {}", e)))?;
    Ok(key)
}

/// Encrypt a seed phrase with a passphrase
pub fn encrypt_seed(seed: &SecretString, passphrase: &SecretString) -> Result<String> {
    let salt: [u8; SALT_LEN] = rand::random();
    let nonce_bytes: [u8; NONCE_LEN] = rand::random();

    let key_bytes = derive_key(passphrase, &salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            seed.expose_secret().as_bytes(),
        )
        .map_err(|e| Error::Config(format!("Encryption failed: {}", e)))?;

    let mut blob = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(blob))
}

/// Decrypt a blob produced by [`encrypt_seed`]
///
/// A wrong passphrase and a tampered blob are indistinguishable and both fail.
pub fn decrypt_seed(blob: &str, passphrase: &SecretString) -> Result<SecretString> {
    let blob = STANDARD
        .decode(blob.trim())
        .map_err(|e| Error::Config(format!("Encrypted seed is not valid base64: {}", e)))?;
    if blob.len() <= SALT_LEN + NONCE_LEN {
        return Err(Error::Config("Encrypted seed is too short".to_string()));
    }

    let (salt, rest) = blob.split_at(SALT_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

    let key_bytes = derive_key(passphrase, salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| Error::Config("key is wrong".to_string()))?;

    let seed = String::from_utf8(plaintext)
        .map_err(|_| Error::Config("Decrypted seed is not UTF-8".to_string()))?;
    Ok(SecretString::from(seed))
}

/// An unlocked signer for the session
#[derive(Debug, Clone)]
pub struct Credentials {
    wallet: Arc<SecureWallet>,
}

impl Credentials {
    /// Derive the signer from a plain mnemonic
    ///
    /// When `expected_address` is set, the derived address must match it.
    pub fn from_mnemonic(
        mnemonic: &SecretString,
        chain: &ChainConfig,
        expected_address: Option<&str>,
    ) -> Result<Self> {
        let wallet = SecureWallet::from_chain_config(mnemonic.expose_secret(), chain)?;
        if let Some(expected) = expected_address {
            if wallet.address() != expected {
                return Err(Error::Config(format!(
                    "Seed derives {} but {} was expected",
                    wallet.address(),
                    expected
                )));
            }
        }
        tracing::info!(address = %wallet.address(), "Unlocked signer");
        Ok(Self {
            wallet: Arc::new(wallet),
        })
    }

    /// Decrypt the stored seed and derive the signer
    pub fn unlock(
        encrypted_seed: &str,
        passphrase: &SecretString,
        chain: &ChainConfig,
        expected_address: Option<&str>,
    ) -> Result<Self> {
        let seed = decrypt_seed(encrypted_seed, passphrase)?;
        Self::from_mnemonic(&seed, chain, expected_address)
    }

    pub fn wallet(&self) -> Arc<SecureWallet> {
        self.wallet.clone()
    }

    pub fn address(&self) -> &str {
        self.wallet.address()
    }
}

/// Set-once holder of the session credential
///
/// Set once at startup and passed to whoever needs to sign. Never rotated.
#[derive(Debug, Default)]
pub struct CredentialSlot {
    inner: OnceLock<Credentials>,
}

impl CredentialSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, credentials: Credentials) -> Result<()> {
        self.inner
            .set(credentials)
            .map_err(|_| Error::Config("key is already specified".to_string()))
    }

    pub fn get(&self) -> Result<&Credentials> {
        self.inner
            .get()
            .ok_or_else(|| Error::Config("key is not found".to_string()))
    }

    pub fn is_set(&self) -> bool {
        self.inner.get().is_some()
    }
}
