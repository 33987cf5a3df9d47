//! Session token service.
//!
//! Access tokens are short-lived HS256 bearer tokens; refresh tokens live
//! longer and are single-use. Refreshing consumes the old token's nonce;
//! presenting a consumed refresh token again is treated as credential theft
//! and denied. Logout blacklists both tokens until their natural expiry.

use chrono::Utc;
use dashmap::DashMap;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secureyeoman_core::RoleId;
use secureyeoman_crypto::generate_nonce;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Default access-token lifetime: one hour.
pub const DEFAULT_ACCESS_TTL_SECS: i64 = 3_600;
/// Default refresh-token lifetime: 24 hours.
pub const DEFAULT_REFRESH_TTL_SECS: i64 = 86_400;

/// Whether a token grants access or refresh rights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived bearer token for API access.
    Access,
    /// Longer-lived single-use token for obtaining a new pair.
    Refresh,
}

/// Signed claims carried by every token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Principal id (`admin` or an API-key record id).
    pub sub: String,
    /// Role the principal acts as.
    pub role: RoleId,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds.
    pub exp: i64,
    /// Random nonce; consumed on refresh, blacklisted on logout.
    pub jti: String,
    /// Access or refresh.
    pub typ: TokenKind,
}

/// An access/refresh token pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Bearer token for API access.
    pub access_token: String,
    /// Single-use refresh token.
    pub refresh_token: String,
    /// Access-token lifetime in seconds.
    pub expires_in: i64,
}

/// Issues, introspects, and refreshes session tokens.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
    /// jti → expiry (unix seconds). Entries prune at natural expiry.
    blacklist: DashMap<String, i64>,
    /// Consumed refresh nonces → expiry (unix seconds).
    consumed: DashMap<String, i64>,
}

impl TokenService {
    /// Create a service with default lifetimes.
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self::with_ttls(secret, DEFAULT_ACCESS_TTL_SECS, DEFAULT_REFRESH_TTL_SECS)
    }

    /// Create a service with explicit lifetimes (seconds).
    #[must_use]
    pub fn with_ttls(secret: &[u8], access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl_secs,
            refresh_ttl_secs,
            blacklist: DashMap::new(),
            consumed: DashMap::new(),
        }
    }

    /// Issue a fresh access/refresh pair for a principal.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] if signing fails.
    pub fn issue_pair(&self, principal: &str, role: RoleId) -> AuthResult<TokenPair> {
        let now = Utc::now().timestamp();
        let access = self.sign(Claims {
            sub: principal.to_string(),
            role,
            iat: now,
            exp: now.saturating_add(self.access_ttl_secs),
            jti: generate_nonce(),
            typ: TokenKind::Access,
        })?;
        let refresh = self.sign(Claims {
            sub: principal.to_string(),
            role,
            iat: now,
            exp: now.saturating_add(self.refresh_ttl_secs),
            jti: generate_nonce(),
            typ: TokenKind::Refresh,
        })?;
        Ok(TokenPair {
            access_token: access,
            refresh_token: refresh,
            expires_in: self.access_ttl_secs,
        })
    }

    fn sign(&self, claims: Claims) -> AuthResult<String> {
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    fn decode_claims(&self, token: &str) -> AuthResult<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        Ok(data.claims)
    }

    /// Validate an access token, returning its claims.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] if the token is malformed,
    /// expired, blacklisted, or not an access token.
    pub fn introspect(&self, token: &str) -> AuthResult<Claims> {
        let claims = self.decode_claims(token)?;
        if claims.typ != TokenKind::Access {
            return Err(AuthError::InvalidToken("not an access token".into()));
        }
        if self.blacklist.contains_key(&claims.jti) {
            return Err(AuthError::InvalidToken("token revoked".into()));
        }
        Ok(claims)
    }

    /// Exchange a refresh token for a new pair, consuming its nonce.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenReuse`] if the token was already consumed,
    /// or [`AuthError::InvalidToken`] for malformed/expired/revoked input.
    pub fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let claims = self.decode_claims(refresh_token)?;
        if claims.typ != TokenKind::Refresh {
            return Err(AuthError::InvalidToken("not a refresh token".into()));
        }
        if self.blacklist.contains_key(&claims.jti) {
            return Err(AuthError::InvalidToken("token revoked".into()));
        }
        if self.consumed.contains_key(&claims.jti) {
            return Err(AuthError::TokenReuse);
        }
        self.consumed.insert(claims.jti.clone(), claims.exp);
        self.prune();
        self.issue_pair(&claims.sub, claims.role)
    }

    /// Blacklist both tokens of a session until their natural expiry.
    ///
    /// Tokens that fail to decode are ignored; logout is idempotent.
    pub fn logout(&self, access_token: &str, refresh_token: &str) {
        for token in [access_token, refresh_token] {
            if let Ok(claims) = self.decode_claims(token) {
                self.blacklist.insert(claims.jti, claims.exp);
            }
        }
        self.prune();
    }

    /// Drop blacklist and consumed-nonce entries past their expiry.
    pub fn prune(&self) {
        let now = Utc::now().timestamp();
        self.blacklist.retain(|_, exp| *exp > now);
        self.consumed.retain(|_, exp| *exp > now);
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-token-secret-with-32-chars!";

    fn service() -> TokenService {
        TokenService::new(SECRET)
    }

    #[test]
    fn test_issue_and_introspect() {
        let svc = service();
        let role = RoleId::new();
        let pair = svc.issue_pair("admin", role).unwrap();

        let claims = svc.introspect(&pair.access_token).unwrap();
        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.role, role);
        assert_eq!(claims.typ, TokenKind::Access);
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let svc = service();
        let pair = svc.issue_pair("admin", RoleId::new()).unwrap();
        assert!(svc.introspect(&pair.refresh_token).is_err());
    }

    #[test]
    fn test_refresh_rotates_pair() {
        let svc = service();
        let pair = svc.issue_pair("admin", RoleId::new()).unwrap();
        let rotated = svc.refresh(&pair.refresh_token).unwrap();
        assert_ne!(rotated.access_token, pair.access_token);
        assert!(svc.introspect(&rotated.access_token).is_ok());
    }

    #[test]
    fn test_refresh_reuse_detected() {
        let svc = service();
        let pair = svc.issue_pair("admin", RoleId::new()).unwrap();
        svc.refresh(&pair.refresh_token).unwrap();
        assert!(matches!(
            svc.refresh(&pair.refresh_token),
            Err(AuthError::TokenReuse)
        ));
    }

    #[test]
    fn test_logout_blacklists_both() {
        let svc = service();
        let pair = svc.issue_pair("admin", RoleId::new()).unwrap();
        svc.logout(&pair.access_token, &pair.refresh_token);
        assert!(svc.introspect(&pair.access_token).is_err());
        assert!(svc.refresh(&pair.refresh_token).is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        let svc = service();
        assert!(svc.introspect("not.a.token").is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let a = TokenService::new(b"secret-a-secret-a-secret-a-32ch!");
        let b = TokenService::new(b"secret-b-secret-b-secret-b-32ch!");
        let pair = a.issue_pair("admin", RoleId::new()).unwrap();
        assert!(b.introspect(&pair.access_token).is_err());
    }
}
