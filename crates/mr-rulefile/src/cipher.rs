//! Passphrase encryption
//!
//! AES-256-CBC with PKCS#7 padding. Key and IV are derived from the
//! passphrase and an 8-byte salt with OpenSSL's EVP_BytesToKey (MD5, one
//! iteration). The output is base64 of `"Salted__" || salt || ciphertext`,
//! the layout produced by `openssl enc -md md5` and by CryptoJS.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD, Engine as _};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const SALT_MAGIC: &[u8; 8] = b"Salted__";
const SALT_LEN: usize = 8;
const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;

/// Error type for envelope decoding and decryption.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CipherError {
    #[error("Payload is not valid base64: {0}")]
    Base64(String),
    #[error("Payload is not a salted envelope")]
    BadEnvelope,
    #[error("Decryption failed, wrong passphrase or corrupted file")]
    Decrypt,
}

/// EVP_BytesToKey with MD5: D_i = MD5(D_{i-1} || passphrase || salt).
fn derive_key_iv(passphrase: &[u8], salt: &[u8]) -> ([u8; KEY_LEN], [u8; IV_LEN]) {
    let mut derived: Vec<u8> = Vec::with_capacity(KEY_LEN + IV_LEN + 16);
    let mut previous: Vec<u8> = Vec::new();

    while derived.len() < KEY_LEN + IV_LEN {
        let mut input = Vec::with_capacity(previous.len() + passphrase.len() + salt.len());
        input.extend_from_slice(&previous);
        input.extend_from_slice(passphrase);
        input.extend_from_slice(salt);
        let digest = md5::compute(&input);
        previous = digest.0.to_vec();
        derived.extend_from_slice(&digest.0);
    }

    let mut key = [0u8; KEY_LEN];
    let mut iv = [0u8; IV_LEN];
    key.copy_from_slice(&derived[..KEY_LEN]);
    iv.copy_from_slice(&derived[KEY_LEN..KEY_LEN + IV_LEN]);
    (key, iv)
}

/// Encrypt `plaintext` and return the base64 envelope.
pub fn encrypt(plaintext: &[u8], passphrase: &str, salt: [u8; SALT_LEN]) -> String {
    let (key, iv) = derive_key_iv(passphrase.as_bytes(), &salt);
    let ciphertext = Aes256CbcEnc::new(&key.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut envelope = Vec::with_capacity(SALT_MAGIC.len() + SALT_LEN + ciphertext.len());
    envelope.extend_from_slice(SALT_MAGIC);
    envelope.extend_from_slice(&salt);
    envelope.extend_from_slice(&ciphertext);
    STANDARD.encode(envelope)
}

/// Decode and decrypt a base64 envelope.
pub fn decrypt(payload: &str, passphrase: &str) -> Result<Vec<u8>, CipherError> {
    let raw = STANDARD
        .decode(payload.trim())
        .map_err(|e| CipherError::Base64(e.to_string()))?;

    let header_len = SALT_MAGIC.len() + SALT_LEN;
    if raw.len() <= header_len || &raw[..SALT_MAGIC.len()] != SALT_MAGIC {
        return Err(CipherError::BadEnvelope);
    }
    let salt = &raw[SALT_MAGIC.len()..header_len];
    let ciphertext = &raw[header_len..];
    if ciphertext.len() % BLOCK_LEN != 0 {
        return Err(CipherError::BadEnvelope);
    }

    let (key, iv) = derive_key_iv(passphrase.as_bytes(), salt);
    Aes256CbcDec::new(&key.into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CipherError::Decrypt)
}
