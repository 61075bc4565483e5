//! RSA signing keys loaded from, and exported to, JWKS documents

use std::fmt::Debug;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::DomainError;

const DEFAULT_KEY_BITS: usize = 2048;

/// JWK with optional private components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
}

/// JWKS document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

/// RS256 key pair used to sign and verify tokens
pub struct RsaSigningKey {
    private_key: RsaPrivateKey,
    key_id: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl Debug for RsaSigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaSigningKey")
            .field("key_id", &self.key_id)
            .field("private_key", &"[hidden]")
            .finish()
    }
}

impl RsaSigningKey {
    /// Wrap a private key; `key_id` defaults to a thumbprint of the modulus
    pub fn new(private_key: RsaPrivateKey, key_id: Option<String>) -> Result<Self, DomainError> {
        let key_id = key_id.unwrap_or_else(|| thumbprint(&private_key));

        let private_pem = private_key.to_pkcs1_pem(LineEnding::LF).map_err(|e| {
            DomainError::configuration(format!("Failed to encode RSA private key: {}", e))
        })?;
        let public_pem = private_key
            .to_public_key()
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| {
                DomainError::configuration(format!("Failed to encode RSA public key: {}", e))
            })?;

        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes()).map_err(|e| {
            DomainError::configuration(format!("Failed to create encoding key: {}", e))
        })?;
        let decoding_key = DecodingKey::from_rsa_pem(public_pem.as_bytes()).map_err(|e| {
            DomainError::configuration(format!("Failed to create decoding key: {}", e))
        })?;

        Ok(Self {
            private_key,
            key_id,
            encoding_key,
            decoding_key,
        })
    }

    /// Generate a fresh 2048-bit key
    pub fn generate(key_id: Option<String>) -> Result<Self, DomainError> {
        let mut rng = rand::rngs::OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, DEFAULT_KEY_BITS)
            .map_err(|e| DomainError::internal(format!("Failed to generate RSA key: {}", e)))?;

        Self::new(private_key, key_id)
    }

    /// Load the signing key from a JWKS document
    ///
    /// With `key_id` set the matching key is required; otherwise the first RSA key
    /// is used.
    pub fn from_jwks_json(jwks_json: &str, key_id: Option<&str>) -> Result<Self, DomainError> {
        let jwks: JwkSet = serde_json::from_str(jwks_json)
            .map_err(|e| DomainError::configuration(format!("Failed to parse JWKS: {}", e)))?;

        if jwks.keys.is_empty() {
            return Err(DomainError::configuration("JWKS contains no keys"));
        }

        let key = match key_id {
            Some(kid) => jwks
                .keys
                .iter()
                .find(|k| k.kid.as_deref() == Some(kid))
                .ok_or_else(|| {
                    DomainError::configuration(format!("Key '{}' not found in JWKS", kid))
                })?,
            None => jwks
                .keys
                .iter()
                .find(|k| k.kty == "RSA")
                .ok_or_else(|| DomainError::configuration("No RSA key found in JWKS"))?,
        };

        if key.kty != "RSA" {
            return Err(DomainError::configuration(format!(
                "Unsupported key type: {}. Tokens are signed with RS256.",
                key.kty
            )));
        }

        if let Some(alg) = key.alg.as_deref().filter(|alg| *alg != "RS256") {
            return Err(DomainError::configuration(format!(
                "Unsupported RSA algorithm: {}",
                alg
            )));
        }

        let private_key = build_rsa_private_key(key)?;
        Self::new(private_key, key.kid.clone())
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// Public half only, as served to verifiers
    pub fn public_jwk(&self) -> Jwk {
        Jwk {
            kty: "RSA".to_string(),
            kid: Some(self.key_id.clone()),
            alg: Some("RS256".to_string()),
            key_use: Some("sig".to_string()),
            n: Some(encode_uint(self.private_key.n())),
            e: Some(encode_uint(self.private_key.e())),
            d: None,
            p: None,
            q: None,
        }
    }

    /// Full key including private components, for writing key files
    pub fn private_jwk(&self) -> Jwk {
        let primes = self.private_key.primes();

        Jwk {
            d: Some(encode_uint(self.private_key.d())),
            p: primes.first().map(encode_uint),
            q: primes.get(1).map(encode_uint),
            ..self.public_jwk()
        }
    }
}

fn build_rsa_private_key(key: &Jwk) -> Result<RsaPrivateKey, DomainError> {
    let n = required_component(&key.n, "n")?;
    let e = required_component(&key.e, "e")?;
    let d = required_component(&key.d, "d")?;

    let primes = match (&key.p, &key.q) {
        (Some(p), Some(q)) => vec![decode_uint(p, "p")?, decode_uint(q, "q")?],
        _ => vec![],
    };

    let private_key = RsaPrivateKey::from_components(n, e, d, primes)
        .map_err(|e| DomainError::configuration(format!("Invalid RSA key components: {}", e)))?;

    private_key
        .validate()
        .map_err(|e| DomainError::configuration(format!("Invalid RSA key: {}", e)))?;

    Ok(private_key)
}

fn required_component(value: &Option<String>, field: &str) -> Result<BigUint, DomainError> {
    let value = value.as_deref().ok_or_else(|| {
        DomainError::configuration(format!("RSA key missing '{}' component", field))
    })?;
    decode_uint(value, field)
}

fn decode_uint(value: &str, field: &str) -> Result<BigUint, DomainError> {
    URL_SAFE_NO_PAD
        .decode(value)
        .map(|bytes| BigUint::from_bytes_be(&bytes))
        .map_err(|e| DomainError::configuration(format!("Invalid base64url in '{}': {}", field, e)))
}

fn encode_uint(value: &BigUint) -> String {
    URL_SAFE_NO_PAD.encode(value.to_bytes_be())
}

fn thumbprint(key: &RsaPrivateKey) -> String {
    let digest = Sha256::digest(key.n().to_bytes_be());
    hex::encode(digest)[..16].to_string()
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_round_trip_through_jwks() {
        let key = test_signing_key();

        assert_eq!(key.key_id(), "test-key");

        let reloaded_json = serde_json::to_string(&JwkSet {
            keys: vec![key.private_jwk()],
        })
        .unwrap();
        let reloaded = RsaSigningKey::from_jwks_json(&reloaded_json, Some("test-key")).unwrap();
        assert_eq!(reloaded.public_jwk().n, key.public_jwk().n);
    }

    #[test]
    fn test_public_jwk_has_no_private_parts() {
        let jwk = test_signing_key().public_jwk();

        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.alg.as_deref(), Some("RS256"));
        assert_eq!(jwk.key_use.as_deref(), Some("sig"));
        assert!(jwk.d.is_none());
        assert!(jwk.p.is_none());

        let json = serde_json::to_value(&jwk).unwrap();
        assert_eq!(json["use"], "sig");
        assert!(json.get("d").is_none());
    }

    #[test]
    fn test_invalid_json() {
        let err = RsaSigningKey::from_jwks_json("not valid json", None).unwrap_err();
        assert!(matches!(err, DomainError::Configuration { .. }));
    }

    #[test]
    fn test_empty_keys() {
        assert!(RsaSigningKey::from_jwks_json(r#"{"keys": []}"#, None).is_err());
    }

    #[test]
    fn test_symmetric_keys_are_rejected() {
        let json = r#"{"keys": [{"kty": "oct", "kid": "hmac", "k": "c2VjcmV0"}]}"#;
        assert!(RsaSigningKey::from_jwks_json(json, Some("hmac")).is_err());
        assert!(RsaSigningKey::from_jwks_json(json, None).is_err());
    }

    #[test]
    fn test_missing_key_id() {
        let err = RsaSigningKey::from_jwks_json(test_jwks_json(), Some("other")).unwrap_err();
        assert!(err.to_string().contains("other"));
    }

    #[test]
    fn test_missing_private_exponent() {
        let public_only = serde_json::to_string(&JwkSet {
            keys: vec![test_signing_key().public_jwk()],
        })
        .unwrap();

        let err = RsaSigningKey::from_jwks_json(&public_only, None).unwrap_err();
        assert!(err.to_string().contains("'d'"));
    }

    #[test]
    fn test_thumbprint_key_id() {
        let key = test_signing_key();
        let unnamed = RsaSigningKey::new(key.private_key.clone(), None).unwrap();

        assert_eq!(unnamed.key_id().len(), 16);
        assert!(unnamed.key_id().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
