//! Session tokens.
//!
//! A token carries a single claim, `{"authenticated": true}`, encrypted with
//! ChaCha20-Poly1305 under one key and authenticated with keyed BLAKE3 under
//! another. Layout before base64 (URL safe, no padding):
//!
//! ```text
//! issued_at (8 bytes, big endian unix secs) || nonce (12) || ciphertext || mac (32)
//! ```
//!
//! The mac covers the cookie name, the timestamp, the nonce and the
//! ciphertext. Keys live in memory only unless a key file is configured, so a
//! restart normally logs everybody out.

use std::fmt::{Debug, Formatter};
use std::fs;
use std::path::Path;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use spdlog::info;

use crate::error::{PublishError, Result};

pub const SESSION_COOKIE: &str = "session";
/// Tokens are good for 24 hours after issue.
pub const SESSION_MAX_AGE_SECS: i64 = 24 * 60 * 60;

const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;
const MAC_SIZE: usize = 32;
const TIMESTAMP_SIZE: usize = 8;
// Tolerated clock drift for tokens stamped slightly in the future.
const MAX_CLOCK_SKEW_SECS: i64 = 60;

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaim {
    authenticated: bool,
}

/// MAC key and encryption key, 32 bytes each.
#[derive(Clone, PartialEq)]
pub struct SessionKeys {
    hash_key: [u8; KEY_SIZE],
    block_key: [u8; KEY_SIZE],
}

impl Debug for SessionKeys {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKeys(..)")
    }
}

impl SessionKeys {
    pub fn generate() -> Result<SessionKeys> {
        let mut hash_key = [0u8; KEY_SIZE];
        let mut block_key = [0u8; KEY_SIZE];
        getrandom::getrandom(&mut hash_key).map_err(PublishError::Entropy)?;
        getrandom::getrandom(&mut block_key).map_err(PublishError::Entropy)?;
        Ok(SessionKeys { hash_key, block_key })
    }

    pub fn from_bytes(data: &[u8]) -> Result<SessionKeys> {
        if data.len() != 2 * KEY_SIZE {
            return Err(PublishError::Session(format!(
                "invalid session key size, expected {}, got {}", 2 * KEY_SIZE, data.len()
            )));
        }
        let mut hash_key = [0u8; KEY_SIZE];
        let mut block_key = [0u8; KEY_SIZE];
        hash_key.copy_from_slice(&data[..KEY_SIZE]);
        block_key.copy_from_slice(&data[KEY_SIZE..]);
        Ok(SessionKeys { hash_key, block_key })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 * KEY_SIZE);
        out.extend_from_slice(&self.hash_key);
        out.extend_from_slice(&self.block_key);
        out
    }

    /// Reads keys from `path`, or generates them and writes them there when
    /// the file doesn't exist yet. Lets sessions survive a restart.
    pub fn load_or_generate(path: &Path) -> Result<SessionKeys> {
        if path.exists() {
            let data = fs::read(path)
                .map_err(|e| PublishError::io("failed to read session key file", path, e))?;
            return Self::from_bytes(&data);
        }

        let keys = Self::generate()?;
        fs::write(path, keys.to_bytes())
            .map_err(|e| PublishError::io("failed to write session key file", path, e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))
                .map_err(|e| PublishError::io("failed to restrict session key file", path, e))?;
        }
        info!("Generated session keys in {}", path.display());
        Ok(keys)
    }
}

/// An issued token and how long the client should keep it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionToken {
    pub value: String,
    pub max_age_secs: i64,
}

pub struct SessionAuthenticator {
    keys: SessionKeys,
    max_age_secs: i64,
}

impl SessionAuthenticator {
    pub fn new(keys: SessionKeys) -> SessionAuthenticator {
        SessionAuthenticator {
            keys,
            max_age_secs: SESSION_MAX_AGE_SECS,
        }
    }

    pub fn issue(&self) -> Result<SessionToken> {
        self.issue_at(Utc::now().timestamp())
    }

    /// False for anything that isn't a valid, unexpired, authenticated token.
    /// Callers can't tell a forged token from a missing one.
    pub fn validate(&self, token: &str) -> bool {
        self.validate_at(token, Utc::now().timestamp())
    }

    fn issue_at(&self, now: i64) -> Result<SessionToken> {
        let value = self.encode(&SessionClaim { authenticated: true }, now)?;
        Ok(SessionToken {
            value,
            max_age_secs: self.max_age_secs,
        })
    }

    fn validate_at(&self, token: &str, now: i64) -> bool {
        matches!(self.decode(token, now), Some(SessionClaim { authenticated: true }))
    }

    fn encode(&self, claim: &SessionClaim, now: i64) -> Result<String> {
        let plaintext = serde_json::to_vec(claim)
            .map_err(|e| PublishError::Session(e.to_string()))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        getrandom::getrandom(&mut nonce_bytes).map_err(PublishError::Entropy)?;
        let ciphertext = self.cipher()
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_slice())
            .map_err(|_| PublishError::Session("encrypt error".to_string()))?;

        let mut out = Vec::with_capacity(TIMESTAMP_SIZE + NONCE_SIZE + ciphertext.len() + MAC_SIZE);
        out.extend_from_slice(&now.to_be_bytes());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        let mac = self.mac(&out);
        out.extend_from_slice(mac.as_bytes());

        Ok(URL_SAFE_NO_PAD.encode(out))
    }

    fn decode(&self, token: &str, now: i64) -> Option<SessionClaim> {
        let data = URL_SAFE_NO_PAD.decode(token).ok()?;
        if data.len() < TIMESTAMP_SIZE + NONCE_SIZE + MAC_SIZE {
            return None;
        }

        let (signed, mac) = data.split_at(data.len() - MAC_SIZE);
        let mac: [u8; MAC_SIZE] = mac.try_into().ok()?;
        // blake3::Hash equality is constant time
        if self.mac(signed) != blake3::Hash::from(mac) {
            return None;
        }

        let (timestamp, sealed) = signed.split_at(TIMESTAMP_SIZE);
        let issued_at = i64::from_be_bytes(timestamp.try_into().ok()?);
        if now - issued_at > self.max_age_secs || issued_at - now > MAX_CLOCK_SKEW_SECS {
            return None;
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
        let plaintext = self.cipher()
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .ok()?;
        serde_json::from_slice(&plaintext).ok()
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.keys.block_key))
    }

    fn mac(&self, signed: &[u8]) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new_keyed(&self.keys.hash_key);
        hasher.update(SESSION_COOKIE.as_bytes());
        hasher.update(b"|");
        hasher.update(signed);
        hasher.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator() -> SessionAuthenticator {
        SessionAuthenticator::new(SessionKeys::generate().unwrap())
    }

    #[test]
    fn test_issue_then_validate() {
        let auth = authenticator();
        let token = auth.issue().unwrap();
        assert_eq!(token.max_age_secs, 86400);
        assert!(auth.validate(&token.value));
    }

    #[test]
    fn test_tokens_are_opaque_and_unique() {
        let auth = authenticator();
        let a = auth.issue().unwrap().value;
        let b = auth.issue().unwrap().value;
        assert_ne!(a, b);
        assert!(!a.contains("authenticated"));
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_rejects_garbage() {
        let auth = authenticator();
        assert!(!auth.validate(""));
        assert!(!auth.validate("not a token"));
        assert!(!auth.validate("dHJ1ZQ"));
    }

    #[test]
    fn test_rejects_any_tampered_byte() {
        let auth = authenticator();
        let token = auth.issue().unwrap().value;
        let data = URL_SAFE_NO_PAD.decode(&token).unwrap();
        for i in 0..data.len() {
            let mut tampered = data.clone();
            tampered[i] ^= 0x01;
            assert!(!auth.validate(&URL_SAFE_NO_PAD.encode(&tampered)), "byte {} accepted", i);
        }
    }

    #[test]
    fn test_rejects_truncated() {
        let auth = authenticator();
        let token = auth.issue().unwrap().value;
        assert!(!auth.validate(&token[..token.len() - 4]));
    }

    #[test]
    fn test_rejects_other_keys() {
        let token = authenticator().issue().unwrap().value;
        assert!(!authenticator().validate(&token));
    }

    #[test]
    fn test_expiry() {
        let auth = authenticator();
        let now = 1_700_000_000;
        let token = auth.issue_at(now).unwrap().value;
        assert!(auth.validate_at(&token, now + SESSION_MAX_AGE_SECS));
        assert!(!auth.validate_at(&token, now + SESSION_MAX_AGE_SECS + 1));
        assert!(!auth.validate_at(&token, now - MAX_CLOCK_SKEW_SECS - 1));
    }

    #[test]
    fn test_requires_authenticated_claim() {
        let auth = authenticator();
        let now = Utc::now().timestamp();
        let token = auth.encode(&SessionClaim { authenticated: false }, now).unwrap();
        assert!(!auth.validate_at(&token, now));
    }

    #[test]
    fn test_key_bytes_round_trip() {
        let keys = SessionKeys::generate().unwrap();
        assert_eq!(SessionKeys::from_bytes(&keys.to_bytes()).unwrap(), keys);
        assert!(matches!(SessionKeys::from_bytes(&[0u8; 10]), Err(PublishError::Session(_))));
    }

    #[test]
    fn test_key_file_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let key_file = dir.path().join("session.key");

        let first = SessionAuthenticator::new(SessionKeys::load_or_generate(&key_file).unwrap());
        let token = first.issue().unwrap().value;
        assert_eq!(fs::read(&key_file).unwrap().len(), 64);

        let second = SessionAuthenticator::new(SessionKeys::load_or_generate(&key_file).unwrap());
        assert!(second.validate(&token));
    }

    #[test]
    fn test_debug_hides_keys() {
        let keys = SessionKeys::generate().unwrap();
        assert_eq!(format!("{:?}", keys), "SessionKeys(..)");
    }
}
