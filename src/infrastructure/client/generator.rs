//! Long-lived credential generation and hashing
//!
//! Credentials are looked up by their digest, so the hash is unsalted SHA-256 over
//! a 256-bit random secret.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

const HASH_SCHEME: &str = "sha256$";

/// A freshly minted credential; `plaintext` is shown to the caller once
#[derive(Debug, Clone)]
pub struct GeneratedCredential {
    pub plaintext: String,
    pub hash: String,
}

#[derive(Debug, Clone)]
pub struct CredentialGenerator {
    prefix: String,
    secret_bytes: usize,
}

impl CredentialGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            secret_bytes: 32,
        }
    }

    /// Generator for live credentials (`ak_live_...`)
    pub fn live() -> Self {
        Self::new("ak_live_")
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn generate(&self) -> GeneratedCredential {
        let mut secret = vec![0u8; self.secret_bytes];
        rand::thread_rng().fill_bytes(&mut secret);

        self.from_secret(&URL_SAFE_NO_PAD.encode(&secret))
    }

    /// Wrap a known secret, used for bootstrap credentials from configuration
    pub fn from_secret(&self, secret: &str) -> GeneratedCredential {
        let plaintext = if secret.starts_with(&self.prefix) {
            secret.to_string()
        } else {
            format!("{}{}", self.prefix, secret)
        };
        let hash = hash_credential(&plaintext);

        GeneratedCredential { plaintext, hash }
    }
}

impl Default for CredentialGenerator {
    fn default() -> Self {
        Self::live()
    }
}

/// Digest stored for a credential
pub fn hash_credential(plaintext: &str) -> String {
    let digest = Sha256::digest(plaintext.trim().as_bytes());
    format!("{}{}", HASH_SCHEME, URL_SAFE_NO_PAD.encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_credential() {
        let generated = CredentialGenerator::live().generate();

        assert!(generated.plaintext.starts_with("ak_live_"));
        // 32 bytes base64url-encoded = 43 chars
        assert_eq!(generated.plaintext.len(), "ak_live_".len() + 43);
        assert!(generated.hash.starts_with("sha256$"));
        assert_eq!(generated.hash, hash_credential(&generated.plaintext));
    }

    #[test]
    fn test_credentials_are_unique() {
        let generator = CredentialGenerator::live();
        let a = generator.generate();
        let b = generator.generate();

        assert_ne!(a.plaintext, b.plaintext);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn test_from_secret_is_deterministic() {
        let generator = CredentialGenerator::live();

        let a = generator.from_secret("bootstrap-admin");
        let b = generator.from_secret("ak_live_bootstrap-admin");

        assert_eq!(a.plaintext, "ak_live_bootstrap-admin");
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn test_hash_ignores_surrounding_whitespace() {
        assert_eq!(hash_credential(" ak_live_x \n"), hash_credential("ak_live_x"));
    }
}
