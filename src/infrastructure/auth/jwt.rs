//! RS256 access and refresh token issuance and verification

use std::fmt::Debug;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, Header, Validation};
use tracing::debug;

use crate::domain::client::ClientIdentity;
use crate::domain::token::{
    RefreshedAccessToken, TokenClaims, TokenError, TokenPair, TokenType,
};
use crate::domain::DomainError;
use crate::infrastructure::observability::record_token_verification;

use super::keys::{JwkSet, RsaSigningKey};

const BEARER: &str = "Bearer";

/// Lifetimes and issuer for signed tokens
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub issuer: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl TokenConfig {
    pub fn new(issuer: impl Into<String>, access_ttl_secs: u64, refresh_ttl_secs: u64) -> Self {
        Self {
            issuer: issuer.into(),
            access_ttl: Duration::seconds(access_ttl_secs as i64),
            refresh_ttl: Duration::seconds(refresh_ttl_secs as i64),
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self::new("pmp-analytics-gateway", 900, 604_800)
    }
}

/// Trait for token operations
pub trait TokenService: Send + Sync + Debug {
    /// Mint an access/refresh pair for an identity
    fn issue_token_pair(&self, identity: &ClientIdentity) -> Result<TokenPair, TokenError>;

    /// Verify signature, issuer and expiry of either token type
    fn verify(&self, token: &str) -> Result<TokenClaims, TokenError>;

    /// Verify a token and require it to be an access token
    fn verify_access(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let claims = self.verify(token)?;
        expect_type(&claims, TokenType::Access)?;
        Ok(claims)
    }

    /// Exchange a refresh token for a fresh access token
    fn refresh(&self, refresh_token: &str) -> Result<RefreshedAccessToken, TokenError>;

    /// Public verification keys
    fn public_jwks(&self) -> JwkSet;
}

fn expect_type(claims: &TokenClaims, expected: TokenType) -> Result<(), TokenError> {
    if claims.typ != expected {
        return Err(TokenError::WrongTokenType {
            expected,
            actual: claims.typ,
        });
    }
    Ok(())
}

/// Token service signing with an RSA key from a JWKS document
#[derive(Debug)]
pub struct JwksTokenService {
    key: RsaSigningKey,
    config: TokenConfig,
}

impl JwksTokenService {
    pub fn new(key: RsaSigningKey, config: TokenConfig) -> Self {
        Self { key, config }
    }

    pub fn from_jwks_json(
        jwks_json: &str,
        key_id: Option<&str>,
        config: TokenConfig,
    ) -> Result<Self, DomainError> {
        Ok(Self::new(RsaSigningKey::from_jwks_json(jwks_json, key_id)?, config))
    }

    pub fn from_jwks_path(
        path: impl AsRef<Path>,
        key_id: Option<&str>,
        config: TokenConfig,
    ) -> Result<Self, DomainError> {
        let path = path.as_ref();
        let jwks_json = std::fs::read_to_string(path).map_err(|e| {
            DomainError::configuration(format!(
                "Failed to read JWKS file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_jwks_json(&jwks_json, key_id, config)
    }

    /// Sign with a key generated in-process; tokens do not survive a restart
    pub fn generate(config: TokenConfig) -> Result<Self, DomainError> {
        Ok(Self::new(RsaSigningKey::generate(None)?, config))
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    pub(crate) fn sign(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.key.key_id().to_string());

        encode(&header, claims, self.key.encoding_key())
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "sub"]);
        validation
    }

    fn issue_at(
        &self,
        identity: &ClientIdentity,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, TokenError> {
        let access = TokenClaims::for_identity(
            identity,
            TokenType::Access,
            &self.config.issuer,
            self.config.access_ttl,
            now,
        );
        let refresh = TokenClaims::for_identity(
            identity,
            TokenType::Refresh,
            &self.config.issuer,
            self.config.refresh_ttl,
            now,
        );

        Ok(TokenPair {
            access_token: self.sign(&access)?,
            refresh_token: self.sign(&refresh)?,
            token_type: BEARER,
            expires_in: self.config.access_ttl.num_seconds(),
            refresh_expires_in: self.config.refresh_ttl.num_seconds(),
            access_claims: access,
        })
    }
}

impl TokenService for JwksTokenService {
    fn issue_token_pair(&self, identity: &ClientIdentity) -> Result<TokenPair, TokenError> {
        debug!(client_id = %identity.id(), "Issuing token pair");
        self.issue_at(identity, Utc::now())
    }

    fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let result = decode::<TokenClaims>(token, self.key.decoding_key(), &self.validation())
            .map(|data| data.claims)
            .map_err(TokenError::from);

        record_token_verification(match &result {
            Ok(_) => "ok",
            Err(TokenError::Expired) => "expired",
            Err(_) => "invalid",
        });

        result
    }

    fn refresh(&self, refresh_token: &str) -> Result<RefreshedAccessToken, TokenError> {
        let claims = self.verify(refresh_token)?;
        expect_type(&claims, TokenType::Refresh)?;

        let access = claims.renewed_access(self.config.access_ttl, Utc::now());
        debug!(client_id = %access.sub, "Refreshed access token");

        Ok(RefreshedAccessToken {
            access_token: self.sign(&access)?,
            token_type: BEARER,
            expires_in: self.config.access_ttl.num_seconds(),
            claims: access,
        })
    }

    fn public_jwks(&self) -> JwkSet {
        JwkSet {
            keys: vec![self.key.public_jwk()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::client::{ClientId, Role, Tier};
    use crate::infrastructure::auth::keys::test_support::{test_jwks_json, test_signing_key};

    fn identity(tier: Tier) -> ClientIdentity {
        ClientIdentity::new(ClientId::new("acme").unwrap(), "Acme", "sha256$x", tier)
    }

    fn create_service() -> JwksTokenService {
        JwksTokenService::new(test_signing_key(), TokenConfig::default())
    }

    #[test]
    fn test_issue_and_verify() {
        let service = create_service();
        let pair = service.issue_token_pair(&identity(Tier::Enterprise)).unwrap();

        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 900);
        assert_eq!(pair.refresh_expires_in, 604_800);

        let claims = service.verify_access(&pair.access_token).unwrap();
        assert_eq!(claims.sub, "acme");
        assert_eq!(claims.quota, 10000);
        assert_eq!(claims.tier, Tier::Enterprise);
        assert!(claims.has_role(Role::Admin));
        assert!(claims.exp > claims.iat);
        assert_eq!(claims, pair.access_claims);
    }

    #[test]
    fn test_header_carries_key_id() {
        let service = create_service();
        let pair = service.issue_token_pair(&identity(Tier::Free)).unwrap();

        let header = jsonwebtoken::decode_header(&pair.access_token).unwrap();
        assert_eq!(header.kid.as_deref(), Some("test-key"));
        assert_eq!(header.alg, Algorithm::RS256);
    }

    #[test]
    fn test_suspended_identity_gets_zero_quota() {
        let service = create_service();
        let mut suspended = identity(Tier::Enterprise);
        suspended.suspend();

        let pair = service.issue_token_pair(&suspended).unwrap();
        let claims = service.verify_access(&pair.access_token).unwrap();

        assert_eq!(claims.quota, 0);
        assert!(claims.has_role(Role::Read));
        assert!(!claims.has_role(Role::Admin));
    }

    #[test]
    fn test_expired_token() {
        let service = create_service();
        let issued_at = Utc::now() - Duration::hours(2);
        let pair = service.issue_at(&identity(Tier::Free), issued_at).unwrap();

        assert_eq!(service.verify_access(&pair.access_token), Err(TokenError::Expired));
    }

    #[test]
    fn test_expired_forged_token_is_invalid_signature() {
        let service = create_service();
        let other = JwksTokenService::generate(TokenConfig::default()).unwrap();
        let issued_at = Utc::now() - Duration::hours(2);
        let forged = other.issue_at(&identity(Tier::Free), issued_at).unwrap();

        assert_eq!(
            service.verify(&forged.access_token),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_malformed_token() {
        let service = create_service();

        assert!(matches!(
            service.verify("not-a-token"),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_wrong_issuer_is_rejected() {
        let service = create_service();
        let foreign = JwksTokenService::new(
            test_signing_key(),
            TokenConfig::new("someone-else", 900, 3600),
        );
        let pair = foreign.issue_token_pair(&identity(Tier::Free)).unwrap();

        assert!(matches!(
            service.verify(&pair.access_token),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let service = create_service();
        let pair = service.issue_token_pair(&identity(Tier::Free)).unwrap();

        assert_eq!(
            service.verify_access(&pair.refresh_token),
            Err(TokenError::WrongTokenType {
                expected: TokenType::Access,
                actual: TokenType::Refresh,
            })
        );
    }

    #[test]
    fn test_refresh() {
        let service = create_service();
        let pair = service.issue_token_pair(&identity(Tier::Standard)).unwrap();

        let refreshed = service.refresh(&pair.refresh_token).unwrap();
        let claims = service.verify_access(&refreshed.access_token).unwrap();

        assert_eq!(claims.sub, "acme");
        assert_eq!(claims.quota, 1000);
        assert!(claims.exp > Utc::now().timestamp());
        assert_ne!(claims.jti, pair.access_claims.jti);
    }

    #[test]
    fn test_refresh_after_access_expired() {
        let service = create_service();
        let issued_at = Utc::now() - Duration::hours(2);
        let pair = service.issue_at(&identity(Tier::Free), issued_at).unwrap();

        assert_eq!(service.verify_access(&pair.access_token), Err(TokenError::Expired));

        let refreshed = service.refresh(&pair.refresh_token).unwrap();
        let claims = service.verify_access(&refreshed.access_token).unwrap();

        assert_eq!(claims.sub, "acme");
        assert_eq!(claims.quota, 100);
        assert!(claims.exp > Utc::now().timestamp());
        assert_eq!(refreshed.claims.jti, claims.jti);
    }

    #[test]
    fn test_refresh_with_access_token_fails() {
        let service = create_service();
        let pair = service.issue_token_pair(&identity(Tier::Free)).unwrap();

        assert!(matches!(
            service.refresh(&pair.access_token),
            Err(TokenError::WrongTokenType { .. })
        ));
    }

    #[test]
    fn test_public_jwks() {
        let service =
            JwksTokenService::from_jwks_json(test_jwks_json(), None, TokenConfig::default())
                .unwrap();
        let jwks = service.public_jwks();

        assert_eq!(jwks.keys.len(), 1);
        assert_eq!(jwks.keys[0].kid.as_deref(), Some("test-key"));
        assert!(jwks.keys[0].d.is_none());
    }

    #[test]
    fn test_from_missing_jwks_path() {
        let err = JwksTokenService::from_jwks_path(
            "/nonexistent/jwks.json",
            None,
            TokenConfig::default(),
        )
        .unwrap_err();

        assert!(matches!(err, DomainError::Configuration { .. }));
    }
}
