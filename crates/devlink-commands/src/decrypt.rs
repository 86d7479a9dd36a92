//! Decryption of provisioned device credentials.
//!
//! Credentials arrive encrypted with AES-256-GCM under one of several
//! configured keys, selected by key reference. The ciphertext format is
//! base64 of the 12-byte nonce followed by the sealed data.

use std::collections::HashMap;

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::Engine;
use devlink_core::config::{DECRYPTION_METHOD_AES_GCM, DecryptionConfig, MAX_DECRYPTION_KEY_BYTES};
use devlink_core::error::{Error, Result};
use sha2::Sha256;

const NONCE_LEN: usize = 12;
const KDF_ITERATIONS: u32 = 100_000;
const KDF_SALT: &[u8] = b"devlink-credential-key";

/// Decrypts credential fields by key reference.
#[derive(Clone)]
pub struct PskDecryptionService {
    ciphers: HashMap<String, Aes256Gcm>,
}

impl std::fmt::Debug for PskDecryptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PskDecryptionService")
            .field("key_ids", &self.ciphers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl PskDecryptionService {
    /// Build the service from configured base64 key material.
    pub fn from_config(config: &DecryptionConfig) -> Result<Self> {
        if config.method != DECRYPTION_METHOD_AES_GCM {
            return Err(Error::Config(format!(
                "unsupported decryption method {}",
                config.method
            )));
        }

        let mut ciphers = HashMap::new();
        for (key_ref, encoded) in &config.keys {
            let material = base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|_| Error::Config(format!("decryption key {} is not valid base64", key_ref)))?;
            if material.len() > MAX_DECRYPTION_KEY_BYTES {
                return Err(Error::Config(format!(
                    "decryption key {} is longer than {} bytes",
                    key_ref, MAX_DECRYPTION_KEY_BYTES
                )));
            }
            ciphers.insert(key_ref.clone(), cipher_for(&material));
        }
        Ok(Self { ciphers })
    }

    /// Build the service from raw key material.
    pub fn with_keys<'a>(keys: impl IntoIterator<Item = (&'a str, &'a [u8])>) -> Self {
        Self {
            ciphers: keys
                .into_iter()
                .map(|(key_ref, material)| (key_ref.to_string(), cipher_for(material)))
                .collect(),
        }
    }

    fn cipher(&self, key_ref: &str) -> Result<&Aes256Gcm> {
        self.ciphers
            .get(key_ref)
            .ok_or_else(|| Error::Decryption(format!("unknown key reference {}", key_ref)))
    }

    /// Decrypt one credential field.
    pub fn decrypt_secret(&self, encoded: &str, key_ref: &str) -> Result<String> {
        let cipher = self.cipher(key_ref)?;
        let combined = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| Error::Decryption("ciphertext is not valid base64".to_string()))?;

        if combined.len() < NONCE_LEN {
            return Err(Error::Decryption("ciphertext too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| Error::Decryption(format!("failed to decrypt with key {}", key_ref)))?;

        String::from_utf8(plaintext)
            .map_err(|_| Error::Decryption("decrypted value is not UTF-8".to_string()))
    }

    /// Encrypt a credential field, producing what `decrypt_secret` accepts.
    pub fn encrypt_secret(&self, plaintext: &str, key_ref: &str) -> Result<String> {
        let cipher = self.cipher(key_ref)?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| Error::Decryption(format!("failed to encrypt with key {}", key_ref)))?;

        let mut combined = nonce.to_vec();
        combined.extend_from_slice(&ciphertext);
        Ok(base64::engine::general_purpose::STANDARD.encode(combined))
    }
}

fn cipher_for(material: &[u8]) -> Aes256Gcm {
    let key = derive_key(material);
    Aes256Gcm::new(&key.into())
}

/// 256-bit keys are used as is, anything else is stretched with PBKDF2.
fn derive_key(input: &[u8]) -> [u8; 32] {
    let mut key = [0u8; 32];
    if input.len() == key.len() {
        key.copy_from_slice(input);
        return key;
    }
    pbkdf2::pbkdf2_hmac::<Sha256>(input, KDF_SALT, KDF_ITERATIONS, &mut key);
    key
}
