//! Encryption of GitLab access tokens at rest.
//!
//! Tokens are sealed with AES-256-GCM. Each ciphertext is laid out as
//! `version (1 byte) || nonce (12 bytes) || ciphertext + tag`, so a fresh
//! random nonce travels with every value.
//!
//! Key resolution (see [`TokenCipher::from_config`]):
//!
//! 1. A configured key that base64-decodes to exactly 32 bytes is used as-is.
//! 2. Any other configured string is a passphrase; the key is derived with
//!    PBKDF2-HMAC-SHA256 over [`PBKDF2_ITERATIONS`] rounds. The salt is the
//!    per-installation salt when one is configured, otherwise
//!    [`DEFAULT_SALT`]. The fixed salt is weaker than a random one and is kept
//!    only as a fallback.
//! 3. With no key at all, a random key is generated for the lifetime of the
//!    process and logged at `WARN`. Operators must persist it: a restart with a
//!    different key makes every stored token unreadable.
//!
//! There is no key rotation. Changing the key invalidates all stored tokens.

use std::fmt;
use std::num::NonZeroU32;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use ring::pbkdf2;
use sha2::{Digest, Sha256};

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes.
const TAG_LEN: usize = 16;

/// Leading byte identifying the ciphertext layout.
const FORMAT_VERSION: u8 = 1;

/// PBKDF2 rounds used when deriving a key from a passphrase.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Application-level salt used when no per-installation salt is configured.
pub const DEFAULT_SALT: &[u8] = b"mergedesk-token-cipher-v1";

/// Number of hex characters of the key digest exposed as a fingerprint.
const FINGERPRINT_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    /// The configured salt is not valid base64 or is empty.
    #[error("Invalid key salt: {0}")]
    InvalidSalt(String),

    #[error("Token encryption failed")]
    Encrypt,

    /// The stored value is not a ciphertext this cipher produced.
    #[error("Malformed ciphertext: {0}")]
    Malformed(&'static str),

    /// Authentication failed: wrong key or tampered ciphertext.
    #[error("Ciphertext could not be decrypted with the active key")]
    Decryption,
}

/// Where the active key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// A configured 32-byte base64 key.
    Raw,
    /// Derived from a configured passphrase via PBKDF2.
    Derived,
    /// Randomly generated for this process only.
    Generated,
}

/// Symmetric cipher for secrets stored in the database.
#[derive(Clone)]
pub struct TokenCipher {
    key: [u8; KEY_LEN],
    source: KeySource,
}

impl fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCipher")
            .field("source", &self.source)
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

impl TokenCipher {
    /// Build a cipher from a raw 32-byte key.
    pub fn from_raw_key(key: [u8; KEY_LEN]) -> Self {
        Self {
            key,
            source: KeySource::Raw,
        }
    }

    /// Derive a key from a passphrase with PBKDF2-HMAC-SHA256.
    pub fn from_passphrase(passphrase: &str, salt: &[u8]) -> Self {
        let iterations = NonZeroU32::new(PBKDF2_ITERATIONS).unwrap_or(NonZeroU32::MIN);
        let mut key = [0u8; KEY_LEN];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            iterations,
            salt,
            passphrase.as_bytes(),
            &mut key,
        );
        Self {
            key,
            source: KeySource::Derived,
        }
    }

    /// Generate a random key. Returns the cipher and the base64 form of the
    /// key so the caller can surface it to the operator.
    pub fn generate() -> (Self, String) {
        let key: [u8; KEY_LEN] = rand::random();
        let encoded = URL_SAFE.encode(key);
        (
            Self {
                key,
                source: KeySource::Generated,
            },
            encoded,
        )
    }

    /// Resolve the cipher from configuration values.
    ///
    /// `key` is the configured key or passphrase (empty counts as absent);
    /// `salt` is an optional base64 per-installation salt for the passphrase
    /// path.
    pub fn from_config(key: Option<&str>, salt: Option<&str>) -> Result<Self, CipherError> {
        let key = key.map(str::trim).filter(|k| !k.is_empty());

        let Some(key) = key else {
            let (cipher, encoded) = Self::generate();
            tracing::warn!(
                generated_key = %encoded,
                "ENCRYPTION_KEY is not set. Generated a key for this process only. \
                 Add it to your environment as ENCRYPTION_KEY or stored GitLab tokens \
                 will be unreadable after a restart",
            );
            return Ok(cipher);
        };

        if let Some(raw) = decode_raw_key(key) {
            return Ok(Self::from_raw_key(raw));
        }

        let salt = match salt.map(str::trim).filter(|s| !s.is_empty()) {
            Some(encoded) => decode_salt(encoded)?,
            None => DEFAULT_SALT.to_vec(),
        };
        Ok(Self::from_passphrase(key, &salt))
    }

    pub fn source(&self) -> KeySource {
        self.source
    }

    /// Short SHA-256 fingerprint of the active key, safe to log.
    pub fn fingerprint(&self) -> String {
        let digest = format!("{:x}", Sha256::digest(self.key));
        digest[..FINGERPRINT_LEN].to_string()
    }

    /// Encrypt a plaintext secret.
    pub fn encrypt(&self, plaintext: &str) -> Result<Vec<u8>, CipherError> {
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let sealed = self
            .aead()
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|_| CipherError::Encrypt)?;

        let mut out = Vec::with_capacity(1 + NONCE_LEN + sealed.len());
        out.push(FORMAT_VERSION);
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Decrypt a value produced by [`TokenCipher::encrypt`].
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<String, CipherError> {
        let (version, rest) = ciphertext
            .split_first()
            .ok_or(CipherError::Malformed("empty ciphertext"))?;
        if *version != FORMAT_VERSION {
            return Err(CipherError::Malformed("unknown format version"));
        }
        if rest.len() < NONCE_LEN + TAG_LEN {
            return Err(CipherError::Malformed("ciphertext too short"));
        }

        let (nonce, sealed) = rest.split_at(NONCE_LEN);
        let plaintext = self
            .aead()
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CipherError::Decryption)?;

        String::from_utf8(plaintext).map_err(|_| CipherError::Malformed("plaintext is not UTF-8"))
    }

    fn aead(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key))
    }
}

/// Accept a configured key when it is base64 (standard or URL-safe) for
/// exactly [`KEY_LEN`] bytes.
fn decode_raw_key(value: &str) -> Option<[u8; KEY_LEN]> {
    let bytes = URL_SAFE
        .decode(value)
        .or_else(|_| STANDARD.decode(value))
        .ok()?;
    bytes.try_into().ok()
}

fn decode_salt(value: &str) -> Result<Vec<u8>, CipherError> {
    let salt = STANDARD
        .decode(value)
        .or_else(|_| URL_SAFE.decode(value))
        .map_err(|e| CipherError::InvalidSalt(e.to_string()))?;
    if salt.is_empty() {
        return Err(CipherError::InvalidSalt("salt must not be empty".into()));
    }
    Ok(salt)
}
