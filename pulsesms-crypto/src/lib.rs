//! Field-level encryption for the Pulse SMS mirror client.
//!
//! Every text field that leaves the device (message bodies, mime types,
//! conversation snippets and titles) is encrypted with a key derived from the
//! account password. The scheme matches the one used by the Pulse phone and
//! web clients so ciphertext produced here is readable there and vice versa.
//!
//! # Key derivation
//!
//! Two PBKDF2-HMAC-SHA1 passes (10 000 rounds, 256-bit output):
//!
//! 1. `pw_key_hash = base64(pbkdf2(password, salt2))`. This hash is what a
//!    client persists to restore a session without the password.
//! 2. `aes_key = pbkdf2(account_id + ":" + pw_key_hash + "\n", salt1)`.
//!
//! # Field encoding
//!
//! AES-256-CBC with PKCS#7 padding and a random IV per field, serialized as
//! `base64(iv) + "-:-" + base64(ciphertext)`.

mod cipher;
mod error;
mod key;

pub use cipher::{decrypt_field, encrypt_field, IV_SIZE, SEPARATOR};
pub use error::{CryptoError, CryptoResult};
pub use key::{KeyMaterial, KEY_SIZE, PBKDF2_ROUNDS};
