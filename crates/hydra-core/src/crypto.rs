//! # 암호화 모듈
//!
//! AES-256-GCM으로 저장 중인 거래소 시크릿을 암호화합니다.
//!
//! ## 저장 형식
//! `enc:` + Base64(nonce(12바이트) || ciphertext)
//!
//! ## 보안 고려사항
//! - 마스터 키는 `HYDRA_MASTER_KEY` 환경변수에서 로드 (Base64, 32바이트)
//! - 각 암호화마다 고유한 nonce 사용

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::Engine;
use rand::RngCore;
use thiserror::Error;

/// 암호화 에러
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid master key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Ciphertext too short: {0} bytes")]
    TooShort(usize),

    #[error("Base64 decode error: {0}")]
    Base64DecodeError(#[from] base64::DecodeError),

    #[error("UTF-8 decode error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),
}

/// AES-256-GCM nonce 크기 (바이트)
pub const NONCE_SIZE: usize = 12;

/// AES-256 키 크기 (바이트)
pub const KEY_SIZE: usize = 32;

/// 암호화된 값의 접두사
pub const ENCRYPTED_PREFIX: &str = "enc:";

/// 마스터 키 환경 변수 이름
pub const MASTER_KEY_ENV: &str = "HYDRA_MASTER_KEY";

/// 자격증명 암호화 관리자
pub struct CredentialEncryptor {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for CredentialEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialEncryptor(***)")
    }
}

impl CredentialEncryptor {
    /// Base64 마스터 키로 생성합니다.
    pub fn new(master_key: &str) -> Result<Self, CryptoError> {
        let key_bytes = base64::engine::general_purpose::STANDARD.decode(master_key.trim())?;
        if key_bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength(key_bytes.len()));
        }

        let cipher = Aes256Gcm::new_from_slice(&key_bytes)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        Ok(Self { cipher })
    }

    /// 환경 변수에서 생성합니다. 키가 없으면 `Ok(None)`.
    pub fn from_env() -> Result<Option<Self>, CryptoError> {
        match std::env::var(MASTER_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Self::new(&key).map(Some),
            _ => Ok(None),
        }
    }

    /// 문자열을 암호화해 저장 형식으로 반환합니다.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut payload = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(&ciphertext);

        Ok(format!(
            "{}{}",
            ENCRYPTED_PREFIX,
            base64::engine::general_purpose::STANDARD.encode(payload)
        ))
    }

    /// 저장 형식을 복호화합니다. 접두사가 없으면 평문으로 간주합니다.
    pub fn decrypt(&self, stored: &str) -> Result<String, CryptoError> {
        let Some(encoded) = stored.strip_prefix(ENCRYPTED_PREFIX) else {
            return Ok(stored.to_string());
        };

        let payload = base64::engine::general_purpose::STANDARD.decode(encoded)?;
        if payload.len() <= NONCE_SIZE {
            return Err(CryptoError::TooShort(payload.len()));
        }

        let (nonce_bytes, ciphertext) = payload.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

        String::from_utf8(plaintext).map_err(CryptoError::from)
    }
}

/// 암호화된 저장 형식인지 확인합니다.
pub fn is_encrypted(value: &str) -> bool {
    value.starts_with(ENCRYPTED_PREFIX)
}

/// 새로운 마스터 키 생성 (초기 설정용)
///
/// # Example
/// ```
/// let key = hydra_core::crypto::generate_master_key();
/// println!("HYDRA_MASTER_KEY={}", key);
/// ```
pub fn generate_master_key() -> String {
    let mut key = [0u8; KEY_SIZE];
    OsRng.fill_bytes(&mut key);
    base64::engine::general_purpose::STANDARD.encode(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_encryptor() -> CredentialEncryptor {
        CredentialEncryptor::new(&generate_master_key()).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt() {
        let encryptor = test_encryptor();
        let stored = encryptor.encrypt("my-secret-api-key-12345").unwrap();

        assert!(is_encrypted(&stored));
        assert!(!stored.contains("my-secret"));
        assert_eq!(encryptor.decrypt(&stored).unwrap(), "my-secret-api-key-12345");
    }

    #[test]
    fn test_nonce_differs_per_call() {
        let encryptor = test_encryptor();
        assert_ne!(encryptor.encrypt("same").unwrap(), encryptor.encrypt("same").unwrap());
    }

    #[test]
    fn test_plaintext_passthrough() {
        let encryptor = test_encryptor();
        assert_eq!(encryptor.decrypt("plain-secret").unwrap(), "plain-secret");
    }

    #[test]
    fn test_wrong_key_fails() {
        let stored = test_encryptor().encrypt("test").unwrap();
        let result = test_encryptor().decrypt(&stored);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed(_))));
    }

    #[test]
    fn test_invalid_key_length() {
        let short_key = base64::engine::general_purpose::STANDARD.encode([0u8; 16]);
        let result = CredentialEncryptor::new(&short_key);
        assert!(matches!(result, Err(CryptoError::InvalidKeyLength(16))));
    }

    #[test]
    fn test_truncated_payload() {
        let encryptor = test_encryptor();
        let stored = format!(
            "{}{}",
            ENCRYPTED_PREFIX,
            base64::engine::general_purpose::STANDARD.encode([1u8; 4])
        );
        assert!(matches!(encryptor.decrypt(&stored), Err(CryptoError::TooShort(4))));
    }
}
