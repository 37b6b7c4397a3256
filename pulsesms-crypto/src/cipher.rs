//! AES-256-CBC field encryption with a random IV per field.

use crate::error::{CryptoError, CryptoResult};
use aes::Aes256;
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, InnerIvInit};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Size of the CBC initialization vector in bytes.
pub const IV_SIZE: usize = 16;

/// Separates the encoded IV from the encoded ciphertext.
pub const SEPARATOR: &str = "-:-";

/// Encrypts a text field under `cipher`.
///
/// A fresh IV is drawn for every call, so encrypting the same plaintext twice
/// yields different output.
pub fn encrypt_field(cipher: &Aes256, plaintext: &str) -> String {
    let mut iv = [0u8; IV_SIZE];
    rand::rng().fill_bytes(&mut iv);

    let ciphertext = Aes256CbcEnc::inner_iv_init(cipher.clone(), GenericArray::from_slice(&iv))
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    format!(
        "{}{SEPARATOR}{}",
        STANDARD.encode(iv),
        STANDARD.encode(ciphertext)
    )
}

/// Decrypts a text field produced by [`encrypt_field`].
///
/// Fails on malformed framing, invalid base64, a bad IV length, a padding
/// mismatch (wrong key or tampered data) or non-UTF-8 plaintext.
pub fn decrypt_field(cipher: &Aes256, encoded: &str) -> CryptoResult<String> {
    let (iv_b64, ct_b64) = encoded
        .split_once(SEPARATOR)
        .ok_or_else(|| CryptoError::Decryption("missing IV separator".to_string()))?;

    let iv = STANDARD
        .decode(iv_b64.trim())
        .map_err(|e| CryptoError::Decryption(format!("invalid IV encoding: {e}")))?;
    if iv.len() != IV_SIZE {
        return Err(CryptoError::Decryption(format!(
            "invalid IV length: expected {IV_SIZE}, got {}",
            iv.len()
        )));
    }

    let ciphertext = STANDARD
        .decode(ct_b64.trim())
        .map_err(|e| CryptoError::Decryption(format!("invalid ciphertext encoding: {e}")))?;

    let plaintext = Aes256CbcDec::inner_iv_init(cipher.clone(), GenericArray::from_slice(&iv))
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| {
            CryptoError::Decryption("bad padding (wrong key or tampered data)".to_string())
        })?;

    String::from_utf8(plaintext)
        .map_err(|_| CryptoError::Decryption("plaintext is not valid UTF-8".to_string()))
}
