//! Credential envelope encryption
//!
//! The inbound `X-Shopify-Access-Token` header does not carry a real Shopify
//! token. It carries an encrypted envelope whose plaintext is a small JSON
//! payload with the shop domain and the shop's actual access token. The
//! envelope is produced by whatever issues credentials to callers, using a
//! key pre-shared with this proxy.
//!
//! # Wire format
//!
//! AES-256-CBC with PKCS#7 padding and a fresh random 16-byte IV per
//! encryption. IV and ciphertext are independently hex-encoded and joined
//! with a single `:`:
//!
//! ```text
//! {hex(iv)}:{hex(ciphertext)}
//! ```
//!
//! # Security
//!
//! Key material, decrypted tokens, and shop domains never appear in logs,
//! errors, or `Debug` output.

use crate::error::{Error, Result};
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES block size; the IV must decode to exactly this many bytes
pub const IV_LEN: usize = 16;

/// Key length for AES-256
pub const KEY_LEN: usize = 32;

/// A 256-bit symmetric key shared between the proxy and the credential issuer
#[derive(Clone)]
pub struct EncryptionKey([u8; KEY_LEN]);

impl EncryptionKey {
    /// Create a key from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Create a key from a 64-character hex string
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|_| Error::Other(anyhow::anyhow!("encryption key is not valid hex")))?;
        let bytes: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            Error::Other(anyhow::anyhow!(
                "encryption key must decode to {KEY_LEN} bytes"
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Parse a key from its environment representation
    ///
    /// Accepts either a 64-character hex string or a raw 32-byte string (the
    /// form `ENCRYPTION_KEY` historically held).
    pub fn parse(s: &str) -> Result<Self> {
        if s.len() == KEY_LEN * 2 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Self::from_hex(s);
        }
        let bytes: [u8; KEY_LEN] = s.as_bytes().try_into().map_err(|_| {
            Error::Other(anyhow::anyhow!(
                "encryption key must be {KEY_LEN} raw bytes or {} hex characters",
                KEY_LEN * 2
            ))
        })?;
        Ok(Self(bytes))
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey([redacted])")
    }
}

/// The decrypted credential payload
///
/// Materialized once per inbound request and held in memory only for the
/// duration of that request.
#[derive(Clone, Serialize, Deserialize)]
pub struct ShopCredential {
    /// Shop domain the request is forwarded to, e.g. `test.myshopify.com`
    pub shop_domain: String,
    /// The shop's real Admin API access token
    pub shop_access_token: String,
}

impl std::fmt::Debug for ShopCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopCredential")
            .field("shop_domain", &"[redacted]")
            .field("shop_access_token", &"[redacted]")
            .finish()
    }
}

/// Symmetric encrypt/decrypt of the credential envelope
#[derive(Clone)]
pub struct CredentialCodec {
    key: EncryptionKey,
}

impl CredentialCodec {
    /// Create a codec with the process-wide pre-shared key
    pub fn new(key: EncryptionKey) -> Self {
        Self { key }
    }

    /// Encrypt a plaintext into the `{hex(iv)}:{hex(ciphertext)}` envelope
    ///
    /// A fresh random IV is drawn from the OS RNG per call, so encrypting the
    /// same plaintext twice yields different envelopes.
    pub fn encrypt(&self, plaintext: &str) -> String {
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let ciphertext = Aes256CbcEnc::new(&self.key.0.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        format!("{}:{}", hex::encode(iv), hex::encode(ciphertext))
    }

    /// Decrypt an envelope back to its plaintext
    ///
    /// Validates the envelope shape before touching the cipher: non-empty,
    /// exactly one `:`, both segments valid hex, IV of exactly [`IV_LEN`]
    /// bytes, ciphertext a non-zero multiple of the block size. Any
    /// violation, a padding failure (wrong key or tampering), or non-UTF-8
    /// plaintext fails with [`Error::Decryption`].
    pub fn decrypt(&self, envelope: &str) -> Result<String> {
        if envelope.is_empty() {
            return Err(Error::Decryption("empty envelope".to_string()));
        }

        let (iv_hex, ct_hex) = envelope
            .split_once(':')
            .ok_or_else(|| Error::Decryption("missing ':' separator".to_string()))?;
        if iv_hex.is_empty() || ct_hex.is_empty() || ct_hex.contains(':') {
            return Err(Error::Decryption(
                "envelope must be exactly two non-empty segments".to_string(),
            ));
        }

        let iv = hex::decode(iv_hex)
            .map_err(|_| Error::Decryption("IV segment is not valid hex".to_string()))?;
        if iv.len() != IV_LEN {
            return Err(Error::Decryption(format!(
                "IV must be {IV_LEN} bytes, got {}",
                iv.len()
            )));
        }

        let ciphertext = hex::decode(ct_hex)
            .map_err(|_| Error::Decryption("ciphertext segment is not valid hex".to_string()))?;
        if ciphertext.is_empty() || ciphertext.len() % IV_LEN != 0 {
            return Err(Error::Decryption(
                "ciphertext length is not a multiple of the block size".to_string(),
            ));
        }

        let cipher = Aes256CbcDec::new_from_slices(&self.key.0, &iv)
            .map_err(|_| Error::Decryption("cipher initialization failed".to_string()))?;
        let plaintext = cipher
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| Error::Decryption("padding check failed".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|_| Error::Decryption("plaintext is not valid UTF-8".to_string()))
    }

    /// Decrypt an envelope and parse the plaintext as a [`ShopCredential`]
    ///
    /// The plaintext must be a JSON object with `shop_domain` and
    /// `shop_access_token`; anything else fails with
    /// [`Error::MalformedCredential`].
    pub fn decrypt_credential(&self, envelope: &str) -> Result<ShopCredential> {
        let plaintext = self.decrypt(envelope)?;
        serde_json::from_str(&plaintext)
            .map_err(|e| Error::MalformedCredential(e.to_string()))
    }
}
