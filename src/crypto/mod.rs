//! AES-256-GCM encryption for OAuth tokens.
//!
//! Tokens are encrypted before they reach the database and travel as opaque
//! envelopes of the form `nonce_hex:ciphertext_hex`. Each encryption uses a
//! fresh random nonce, so encrypting the same token twice yields different
//! envelopes. The master key must be 32 bytes (256 bits) and is provided
//! base64-encoded from an environment variable.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::error::CipherError;

/// Size of the encryption key in bytes (256 bits)
const KEY_SIZE: usize = 32;

/// Size of the nonce in bytes (96 bits, standard for GCM)
const NONCE_SIZE: usize = 12;

/// Symmetric cipher for token envelopes.
///
/// # Security
/// - Fresh random nonce per encryption (never reused)
/// - Authenticated encryption (tampering detected on decrypt)
/// - Key lives in memory only, never on disk
pub struct TokenCipher {
    key: Vec<u8>,
}

impl TokenCipher {
    /// Creates a cipher from a base64-encoded 32-byte master key.
    pub fn new(key_base64: &str) -> Result<Self, CipherError> {
        let key = BASE64
            .decode(key_base64)
            .map_err(|e| CipherError::InvalidKey(e.to_string()))?;

        if key.len() != KEY_SIZE {
            return Err(CipherError::InvalidKey(format!(
                "got {} bytes",
                key.len()
            )));
        }

        Ok(Self { key })
    }

    /// Encrypts a token into a `nonce_hex:ciphertext_hex` envelope.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let cipher =
            Aes256Gcm::new_from_slice(&self.key).map_err(|_| CipherError::Encryption)?;

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CipherError::Encryption)?;

        Ok(format!("{}:{}", hex::encode(nonce), hex::encode(ciphertext)))
    }

    /// Decrypts a `nonce_hex:ciphertext_hex` envelope.
    ///
    /// Fails with `CipherError::MalformedEnvelope` when the envelope does not
    /// split into two hex parts, and `CipherError::Decryption` when the key
    /// does not match or the ciphertext was tampered with.
    pub fn decrypt(&self, envelope: &str) -> Result<String, CipherError> {
        let (nonce_hex, ciphertext_hex) = envelope
            .split_once(':')
            .ok_or(CipherError::MalformedEnvelope)?;

        let nonce_bytes =
            hex::decode(nonce_hex).map_err(|_| CipherError::MalformedEnvelope)?;
        let ciphertext =
            hex::decode(ciphertext_hex).map_err(|_| CipherError::MalformedEnvelope)?;

        if nonce_bytes.len() != NONCE_SIZE {
            return Err(CipherError::MalformedEnvelope);
        }

        let cipher =
            Aes256Gcm::new_from_slice(&self.key).map_err(|_| CipherError::Decryption)?;

        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|_| CipherError::Decryption)?;

        Ok(String::from_utf8(plaintext)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cipher() -> TokenCipher {
        let key = BASE64.encode([0u8; 32]);
        TokenCipher::new(&key).expect("valid test key")
    }

    #[test]
    fn test_key_validation() {
        // Valid 32-byte key (base64-encoded)
        assert!(TokenCipher::new(&BASE64.encode([0u8; 32])).is_ok());

        // Too short
        assert!(TokenCipher::new(&BASE64.encode([0u8; 16])).is_err());

        // Too long
        assert!(TokenCipher::new(&BASE64.encode([0u8; 64])).is_err());

        // Invalid base64
        assert!(TokenCipher::new("not-valid-base64!@#$").is_err());
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let cipher = test_cipher();
        let plaintext = "my-secret-access-token-12345";

        let envelope = cipher.encrypt(plaintext).expect("encryption failed");
        assert_ne!(envelope, plaintext);
        assert!(envelope.contains(':'));

        let decrypted = cipher.decrypt(&envelope).expect("decryption failed");
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_fresh_nonce_per_encryption() {
        let cipher = test_cipher();
        let plaintext = "same-plaintext";

        let envelope1 = cipher.encrypt(plaintext).unwrap();
        let envelope2 = cipher.encrypt(plaintext).unwrap();

        // Different nonces mean different envelopes for the same input
        assert_ne!(envelope1, envelope2);

        assert_eq!(cipher.decrypt(&envelope1).unwrap(), plaintext);
        assert_eq!(cipher.decrypt(&envelope2).unwrap(), plaintext);
    }

    #[test]
    fn test_roundtrip_preserves_unicode() {
        let cipher = test_cipher();
        for plaintext in ["", "a", "token with spaces", "émoji 🔐 token"] {
            let envelope = cipher.encrypt(plaintext).unwrap();
            assert_eq!(cipher.decrypt(&envelope).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_wrong_key_fails() {
        let cipher1 = test_cipher();
        let cipher2 = TokenCipher::new(&BASE64.encode([1u8; 32])).unwrap();

        let envelope = cipher1.encrypt("secret").unwrap();
        assert!(matches!(
            cipher2.decrypt(&envelope),
            Err(CipherError::Decryption)
        ));
    }

    #[test]
    fn test_malformed_envelope_rejected() {
        let cipher = test_cipher();

        // No delimiter
        assert!(matches!(
            cipher.decrypt("deadbeef"),
            Err(CipherError::MalformedEnvelope)
        ));

        // Not hex
        assert!(matches!(
            cipher.decrypt("zzzz:zzzz"),
            Err(CipherError::MalformedEnvelope)
        ));

        // Nonce wrong length
        assert!(matches!(
            cipher.decrypt("dead:beef"),
            Err(CipherError::MalformedEnvelope)
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let cipher = test_cipher();
        let mut envelope = cipher.encrypt("secret").unwrap();

        // Flip the last hex digit of the ciphertext
        let last = envelope.pop().unwrap();
        envelope.push(if last == '0' { '1' } else { '0' });

        assert!(matches!(
            cipher.decrypt(&envelope),
            Err(CipherError::Decryption)
        ));
    }
}
