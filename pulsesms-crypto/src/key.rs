//! Account key material.

use crate::cipher::{decrypt_field, encrypt_field};
use crate::error::{CryptoError, CryptoResult};
use aes::Aes256;
use aes::cipher::KeyInit;
use base64::{engine::general_purpose::STANDARD, Engine};
use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;
use std::fmt;
use zeroize::Zeroizing;

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;

/// PBKDF2 iteration count used by the Pulse service for both passes.
pub const PBKDF2_ROUNDS: u32 = 10_000;

/// The derived symmetric key for one account.
///
/// Built once per session and never mutated; share it behind an `Arc`.
/// The raw key only lives inside the cipher, which zeroizes it on drop; it
/// is never exposed and never appears in `Debug` output.
pub struct KeyMaterial {
    /// Primary salt used to derive the AES key.
    salt1: Vec<u8>,
    /// Base64 hash of the key derived from the password and `salt2`.
    pw_key_hash: Zeroizing<String>,
    cipher: Aes256,
}

impl KeyMaterial {
    /// Derives key material from the account password and both login salts.
    ///
    /// Deterministic: the same inputs always produce the same key.
    pub fn derive(
        account_id: &str,
        password: &str,
        salt1: &[u8],
        salt2: &[u8],
    ) -> CryptoResult<Self> {
        require_non_empty("password", password.as_bytes())?;
        require_non_empty("salt2", salt2)?;

        let mut hash = Zeroizing::new([0u8; KEY_SIZE]);
        pbkdf2_hmac::<Sha1>(password.as_bytes(), salt2, PBKDF2_ROUNDS, &mut hash[..]);
        let pw_key_hash = STANDARD.encode(&hash[..]);

        Self::from_password_hash(account_id, &pw_key_hash, salt1)
    }

    /// Rebuilds key material from a saved password hash (no password needed).
    pub fn from_password_hash(
        account_id: &str,
        pw_key_hash: &str,
        salt1: &[u8],
    ) -> CryptoResult<Self> {
        require_non_empty("account_id", account_id.as_bytes())?;
        require_non_empty("pw_key_hash", pw_key_hash.as_bytes())?;
        require_non_empty("salt1", salt1)?;

        let combined = Zeroizing::new(format!("{account_id}:{pw_key_hash}\n"));
        let mut aes_key = Zeroizing::new([0u8; KEY_SIZE]);
        pbkdf2_hmac::<Sha1>(combined.as_bytes(), salt1, PBKDF2_ROUNDS, &mut aes_key[..]);

        let cipher = Aes256::new_from_slice(&aes_key[..])
            .map_err(|e| CryptoError::KeyDerivation(format!("cipher rejected key: {e}")))?;

        Ok(Self {
            salt1: salt1.to_vec(),
            pw_key_hash: Zeroizing::new(pw_key_hash.to_string()),
            cipher,
        })
    }

    /// Encrypts a text field for the wire.
    pub fn encrypt(&self, plaintext: &str) -> String {
        encrypt_field(&self.cipher, plaintext)
    }

    /// Decrypts a text field received from the wire.
    pub fn decrypt(&self, ciphertext: &str) -> CryptoResult<String> {
        decrypt_field(&self.cipher, ciphertext)
    }

    pub fn salt1(&self) -> &[u8] {
        &self.salt1
    }

    /// Returns the password hash to persist for session restore.
    pub fn pw_key_hash(&self) -> &str {
        &self.pw_key_hash
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("salt1_len", &self.salt1.len())
            .field("key", &"[REDACTED]")
            .finish()
    }
}

fn require_non_empty(name: &str, value: &[u8]) -> CryptoResult<()> {
    if value.is_empty() {
        return Err(CryptoError::KeyDerivation(format!("{name} must not be empty")));
    }
    Ok(())
}
