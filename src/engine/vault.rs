use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use crate::{Result, Error};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Per-collection AES-256-GCM codec for serialized documents.
///
/// The ciphertext envelope is a hex string holding the 12-byte nonce followed
/// by the ciphertext and tag.
#[derive(Clone)]
pub struct Codec {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Codec(AES-256-GCM)")
    }
}

impl Codec {
    /// Builds a codec from a 32-byte key.
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != KEY_LEN {
            return Err(Error::Validation(format!(
                "encryption key must be {} bytes, got {}",
                KEY_LEN,
                key.len()
            )));
        }
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| Error::Internal(e.to_string()))?;
        Ok(Self { cipher })
    }

    /// Builds a codec from a hex-encoded 32-byte key.
    pub fn from_hex(key_hex: &str) -> Result<Self> {
        let key = hex::decode(key_hex.trim())
            .map_err(|e| Error::Validation(format!("encryption key is not valid hex: {}", e)))?;
        Self::new(&key)
    }

    /// Encrypts a plaintext string under a fresh random nonce.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| Error::Internal(e.to_string()))?;

        let mut combined = nonce.to_vec();
        combined.extend_from_slice(&ciphertext);
        Ok(hex::encode(combined))
    }

    /// Decrypts an envelope produced by [`Codec::encrypt`].
    pub fn decrypt(&self, cipher_hex: &str) -> Result<String> {
        let combined = hex::decode(cipher_hex.trim()).map_err(|e| Error::Decrypt(e.to_string()))?;
        if combined.len() < NONCE_LEN {
            return Err(Error::Decrypt("ciphertext too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext_bytes = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| Error::Decrypt("wrong key or tampered data".to_string()))?;
        String::from_utf8(plaintext_bytes).map_err(|e| Error::Decrypt(e.to_string()))
    }
}
