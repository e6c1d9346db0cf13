use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("{0} is not set; generate a key with `openssl rand -base64 32`")]
    KeyNotConfigured(String),
    #[error("credential key must decode to 32 raw bytes, got {0}")]
    BadKeyLength(usize),
    #[error("malformed base64 in encrypted credential blob")]
    BadEncoding(#[from] base64::DecodeError),
    #[error("ciphertext is shorter than the nonce prefix")]
    Truncated,
    #[error("decryption failed: wrong key or corrupted data")]
    DecryptionFailed,
    #[error("decrypted credentials missing the ':' separator")]
    MissingSeparator,
}

/// AES-256-GCM credential cipher, keyed from a 32-byte secret. Mirrors the
/// original service's Fernet-based `encrypt`/`decrypt`/`encrypt_credentials`/
/// `decrypt_credentials` shape: username and password are always combined
/// into a single `"username:password"` plaintext before sealing, and split
/// back apart on the first `:` after opening.
pub struct CredentialCipher {
    cipher: Aes256Gcm,
}

impl CredentialCipher {
    /// `key_b64` is the value of the environment variable named by
    /// `WorkerConfig::credential_key_env`, base64-encoding exactly 32 raw
    /// key bytes.
    pub fn from_base64_key(key_b64: &str) -> Result<Self, CredentialError> {
        let raw = STANDARD.decode(key_b64)?;
        if raw.len() != 32 {
            return Err(CredentialError::BadKeyLength(raw.len()));
        }
        let key = Key::<Aes256Gcm>::from_slice(&raw);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    pub fn from_env(var_name: &str) -> Result<Self, CredentialError> {
        let key_b64 = std::env::var(var_name)
            .map_err(|_| CredentialError::KeyNotConfigured(var_name.to_string()))?;
        Self::from_base64_key(&key_b64)
    }

    fn encrypt(&self, plaintext: &str) -> String {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .expect("AES-256-GCM encryption is infallible for in-memory buffers");
        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        STANDARD.encode(sealed)
    }

    fn decrypt(&self, encoded: &str) -> Result<String, CredentialError> {
        let sealed = STANDARD.decode(encoded)?;
        if sealed.len() < NONCE_LEN {
            return Err(CredentialError::Truncated);
        }
        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CredentialError::DecryptionFailed)?;
        String::from_utf8(plaintext).map_err(|_| CredentialError::DecryptionFailed)
    }

    /// Encrypts an RTSP username/password pair into one opaque blob, the
    /// value stored in `cameras.credentials_encrypted`.
    pub fn encrypt_credentials(&self, username: &str, password: &str) -> String {
        self.encrypt(&format!("{username}:{password}"))
    }

    /// Inverse of [`Self::encrypt_credentials`].
    pub fn decrypt_credentials(&self, encrypted: &str) -> Result<(String, String), CredentialError> {
        let combined = self.decrypt(encrypted)?;
        combined
            .split_once(':')
            .map(|(u, p)| (u.to_string(), p.to_string()))
            .ok_or(CredentialError::MissingSeparator)
    }

    /// Best-effort decrypt: returns `None` instead of propagating an error,
    /// for display paths that would rather show "credentials unavailable"
    /// than fail the whole request.
    pub fn safe_decrypt_credentials(&self, encrypted: &str) -> Option<(String, String)> {
        self.decrypt_credentials(encrypted).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cipher() -> CredentialCipher {
        let key = [7u8; 32];
        CredentialCipher::from_base64_key(&STANDARD.encode(key)).unwrap()
    }

    #[test]
    fn round_trips_credentials() {
        let cipher = test_cipher();
        let blob = cipher.encrypt_credentials("admin", "hunter2");
        let (user, pass) = cipher.decrypt_credentials(&blob).unwrap();
        assert_eq!(user, "admin");
        assert_eq!(pass, "hunter2");
    }

    #[test]
    fn rejects_wrong_key_length() {
        let err = CredentialCipher::from_base64_key(&STANDARD.encode([1u8; 16]));
        assert!(matches!(err, Err(CredentialError::BadKeyLength(16))));
    }

    #[test]
    fn wrong_key_fails_decrypt() {
        let cipher_a = test_cipher();
        let cipher_b = CredentialCipher::from_base64_key(&STANDARD.encode([9u8; 32])).unwrap();
        let blob = cipher_a.encrypt_credentials("admin", "hunter2");
        assert!(cipher_b.decrypt_credentials(&blob).is_err());
        assert_eq!(cipher_b.safe_decrypt_credentials(&blob), None);
    }

    #[test]
    fn each_encryption_uses_a_fresh_nonce() {
        let cipher = test_cipher();
        let a = cipher.encrypt_credentials("admin", "hunter2");
        let b = cipher.encrypt_credentials("admin", "hunter2");
        assert_ne!(a, b);
    }
}
