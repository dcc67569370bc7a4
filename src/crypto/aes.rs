use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use aes_gcm::aead::rand_core::RngCore;
use base64::{Engine as _, engine::general_purpose};
use zeroize::{Zeroize, ZeroizeOnDrop};
use crate::error::{AppError, Result};

/// The size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// The size of the AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// A secure key wrapper that ensures the key is zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureKey([u8; KEY_SIZE]);

impl SecureKey {
    /// Creates a new `SecureKey` from a byte array.
    ///
    /// # Arguments
    ///
    /// * `key` - A 32-byte array representing the AES-256 key.
    pub fn new(key: [u8; KEY_SIZE]) -> Self {
        Self(key)
    }

    /// Rebuilds a key from its exported base64 form.
    pub fn import(encoded: &str) -> Result<Self> {
        let mut raw = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| AppError::Encryption(format!("Invalid key encoding: {}", e)))?;

        let key: [u8; KEY_SIZE] = raw.as_slice().try_into().map_err(|_| {
            AppError::Encryption(format!("Invalid key size: {} bytes", raw.len()))
        })?;
        raw.zeroize();

        Ok(Self(key))
    }

    /// Exports the key as base64 so it can be stored as a key record.
    pub fn export(&self) -> String {
        general_purpose::STANDARD.encode(self.0)
    }

    /// Returns a reference to the key as a byte slice.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for SecureKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecureKey(..)")
    }
}

/// Generates a new random AES-256 key.
///
/// # Returns
///
/// A `SecureKey` containing the generated key.
pub fn generate_key() -> SecureKey {
    let mut key = [0u8; KEY_SIZE];
    OsRng.fill_bytes(&mut key);
    SecureKey::new(key)
}

/// Generates a new random AES-GCM nonce.
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Encrypts a string using AES-256-GCM.
///
/// # Arguments
///
/// * `key` - The AES-256 key.
/// * `plaintext` - The string to encrypt.
///
/// # Returns
///
/// A base64 blob of `nonce || ciphertext`.
pub fn encrypt(key: &SecureKey, plaintext: &str) -> Result<String> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let nonce_bytes = generate_nonce();
    let nonce = Nonce::from(nonce_bytes);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|e| AppError::Encryption(format!("Encryption failed: {}", e)))?;

    let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext);

    Ok(general_purpose::STANDARD.encode(combined))
}

/// Decrypts a blob produced by [`encrypt`].
///
/// Any malformed input, wrong key or tampered ciphertext yields `AppError::Decrypt`.
pub fn decrypt(key: &SecureKey, blob: &str) -> Result<String> {
    let combined = general_purpose::STANDARD.decode(blob.trim()).map_err(|e| {
        tracing::warn!("Ciphertext is not valid base64: {}", e);
        AppError::Decrypt
    })?;

    if combined.len() <= NONCE_SIZE {
        tracing::warn!("Ciphertext too short: {} bytes", combined.len());
        return Err(AppError::Decrypt);
    }

    let (nonce_bytes, ciphertext) = combined.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let mut plaintext = cipher.decrypt(nonce, ciphertext).map_err(|_| {
        tracing::warn!("AES-GCM authentication failed");
        AppError::Decrypt
    })?;

    let text = String::from_utf8(plaintext.clone()).map_err(|_| AppError::Decrypt);
    plaintext.zeroize();
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = generate_key();
        for plaintext in ["", "ASP.NET_SessionId=abc; .ASPXAUTH=def", "pässwörd ✓"] {
            let blob = encrypt(&key, plaintext).unwrap();
            assert_eq!(decrypt(&key, &blob).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_same_plaintext_gets_fresh_nonce() {
        let key = generate_key();
        let a = encrypt(&key, "secret").unwrap();
        let b = encrypt(&key, "secret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_decrypt_with_other_key_fails() {
        let blob = encrypt(&generate_key(), "secret").unwrap();
        let err = decrypt(&generate_key(), &blob).unwrap_err();
        assert!(matches!(err, AppError::Decrypt));
        assert_eq!(err.to_string(), "Failed to decrypt data");
    }

    #[test]
    fn test_decrypt_tampered_blob_fails() {
        let key = generate_key();
        let blob = encrypt(&key, "secret").unwrap();
        let mut raw = general_purpose::STANDARD.decode(&blob).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = general_purpose::STANDARD.encode(raw);

        assert!(matches!(decrypt(&key, &tampered), Err(AppError::Decrypt)));
        assert!(matches!(decrypt(&key, "not base64!"), Err(AppError::Decrypt)));
        assert!(matches!(decrypt(&key, "AAAA"), Err(AppError::Decrypt)));
    }

    #[test]
    fn test_key_export_import() {
        let key = generate_key();
        let restored = SecureKey::import(&key.export()).unwrap();
        assert_eq!(key.as_bytes(), restored.as_bytes());
        assert!(SecureKey::import("c2hvcnQ=").is_err());
    }
}
