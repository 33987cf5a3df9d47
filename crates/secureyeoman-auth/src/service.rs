//! The auth service: login flow, request authentication, audited RBAC.
//!
//! Ties the credential verifier, token service, RBAC engine, and rate
//! limiter together and records every security-relevant outcome to the
//! audit chain.

use std::sync::Arc;

use secureyeoman_audit::{AuditChain, AuditEvent, AuditLevel};
use secureyeoman_core::RoleId;
use serde_json::json;
use tracing::{info, warn};

use crate::credentials::{AdminCredential, ApiKeyStore, CreatedApiKey};
use crate::error::{AuthError, AuthResult};
use crate::rate_limit::{RateDecision, RateLimiter};
use crate::rbac::{PermissionCheck, PermissionRequest, RbacEngine};
use crate::tokens::{Claims, TokenPair, TokenService};

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Principal id (`admin` or an API-key record id).
    pub id: String,
    /// Role the principal acts as.
    pub role: RoleId,
}

/// Process-wide authentication and authorization service.
pub struct AuthService {
    admin: AdminCredential,
    tokens: TokenService,
    rbac: Arc<RbacEngine>,
    rate_limiter: Arc<RateLimiter>,
    api_keys: ApiKeyStore,
    audit: Arc<AuditChain>,
}

impl AuthService {
    /// Wire the service together.
    #[must_use]
    pub fn new(
        admin: AdminCredential,
        tokens: TokenService,
        rbac: Arc<RbacEngine>,
        rate_limiter: Arc<RateLimiter>,
        api_keys: ApiKeyStore,
        audit: Arc<AuditChain>,
    ) -> Self {
        Self {
            admin,
            tokens,
            rbac,
            rate_limiter,
            api_keys,
            audit,
        }
    }

    /// The RBAC engine.
    #[must_use]
    pub fn rbac(&self) -> &Arc<RbacEngine> {
        &self.rbac
    }

    /// The rate limiter.
    #[must_use]
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Admin login.
    ///
    /// The `auth_attempts` window is consumed before the password check, so
    /// an exhausted window fails with `rate_limited` without touching the
    /// credential at all.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RateLimited`] or [`AuthError::InvalidCredentials`];
    /// both record exactly one audit entry.
    pub async fn login(&self, password: &str, client_ip: &str) -> AuthResult<TokenPair> {
        match self.rate_limiter.check("auth_attempts", client_ip)? {
            RateDecision::Allowed { .. } => {},
            RateDecision::Rejected { retry_after_ms } | RateDecision::Delayed { retry_after_ms } => {
                self.audit
                    .record(
                        AuditEvent::new("rate_limited", AuditLevel::Warn, "login rate limited")
                            .with_metadata(json!({"clientIp": client_ip, "rule": "auth_attempts"})),
                    )
                    .await?;
                warn!(client_ip, "Login rejected by rate limiter");
                return Err(AuthError::RateLimited { retry_after_ms });
            },
        }

        if let Err(err) = self.admin.verify(password) {
            self.audit
                .record(
                    AuditEvent::new("auth_failure", AuditLevel::Warn, "admin login failed")
                        .with_metadata(json!({"clientIp": client_ip})),
                )
                .await?;
            warn!(client_ip, "Admin login failed");
            return Err(err);
        }

        let admin_role = self.rbac.role_by_name("admin")?;
        let pair = self.tokens.issue_pair("admin", admin_role.id)?;

        self.audit
            .record(
                AuditEvent::new("auth_success", AuditLevel::Info, "admin logged in")
                    .with_user("admin")
                    .with_metadata(json!({"clientIp": client_ip})),
            )
            .await?;
        info!(client_ip, "Admin logged in");
        Ok(pair)
    }

    /// Authenticate a bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] for anything not a live access
    /// token.
    pub fn authenticate_bearer(&self, token: &str) -> AuthResult<Principal> {
        let claims: Claims = self.tokens.introspect(token)?;
        Ok(Principal {
            id: claims.sub,
            role: claims.role,
        })
    }

    /// Authenticate an API key presented in a header.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] if no stored key matches.
    pub async fn authenticate_api_key(&self, key: &str) -> AuthResult<Principal> {
        let record = self.api_keys.lookup(key).await?;
        Ok(Principal {
            id: record.id.to_string(),
            role: record.role,
        })
    }

    /// Create an API key (admin-only; callers enforce that via RBAC).
    ///
    /// # Errors
    ///
    /// Returns an error if the role is unknown or persistence fails.
    pub async fn create_api_key(
        &self,
        name: impl Into<String>,
        role_name: &str,
    ) -> AuthResult<CreatedApiKey> {
        let role = self.rbac.role_by_name(role_name)?;
        let created = self.api_keys.create(name, role.id).await?;
        self.audit
            .record(
                AuditEvent::new("api_key_created", AuditLevel::Info, "API key created")
                    .with_user("admin")
                    .with_metadata(
                        json!({"keyId": created.record.id.to_string(), "role": role.name}),
                    ),
            )
            .await?;
        Ok(created)
    }

    /// The API key store (listing, revocation).
    #[must_use]
    pub fn api_keys(&self) -> &ApiKeyStore {
        &self.api_keys
    }

    /// Exchange a refresh token for a new pair.
    ///
    /// Reuse of a consumed refresh token records `token_reuse` at `error`
    /// and is denied.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenReuse`] or [`AuthError::InvalidToken`].
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        match self.tokens.refresh(refresh_token) {
            Ok(pair) => Ok(pair),
            Err(AuthError::TokenReuse) => {
                self.audit
                    .record(AuditEvent::new(
                        "token_reuse",
                        AuditLevel::Error,
                        "consumed refresh token presented again",
                    ))
                    .await?;
                warn!("Refresh token reuse detected");
                Err(AuthError::TokenReuse)
            },
            Err(err) => Err(err),
        }
    }

    /// Blacklist a session's tokens until natural expiry.
    ///
    /// # Errors
    ///
    /// Returns an error only if the audit record fails.
    pub async fn logout(&self, access_token: &str, refresh_token: &str) -> AuthResult<()> {
        self.tokens.logout(access_token, refresh_token);
        self.audit
            .record(AuditEvent::new(
                "auth_logout",
                AuditLevel::Info,
                "session logged out",
            ))
            .await?;
        Ok(())
    }

    /// Evaluate a permission request, recording every denial.
    ///
    /// # Errors
    ///
    /// Returns an error if the role is unknown or the audit record fails.
    pub async fn check_permission(
        &self,
        role_id: RoleId,
        request: &PermissionRequest,
        user_id: &str,
    ) -> AuthResult<PermissionCheck> {
        let check = self.rbac.check(role_id, request)?;
        if !check.granted {
            self.audit
                .record(
                    AuditEvent::new("permission_denied", AuditLevel::Warn, "permission denied")
                        .with_user(user_id)
                        .with_metadata(json!({
                            "resource": request.resource,
                            "action": request.action,
                            "role": role_id.to_string(),
                        })),
                )
                .await?;
            warn!(
                user = user_id,
                resource = %request.resource,
                action = %request.action,
                "Permission denied"
            );
        }
        Ok(check)
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secureyeoman_audit::AuditQuery;
    use secureyeoman_crypto::SigningKey;
    use secureyeoman_storage::MemoryKvStore;

    const PASSWORD: &str = "test-admin-password-32chars!!";

    async fn make_service() -> AuthService {
        let audit = Arc::new(
            AuditChain::in_memory(SigningKey::new(vec![2u8; 32]).unwrap())
                .await
                .unwrap(),
        );
        AuthService::new(
            AdminCredential::hash_password(PASSWORD).unwrap(),
            TokenService::new(b"test-token-secret-with-32-chars!"),
            Arc::new(RbacEngine::new()),
            Arc::new(RateLimiter::new()),
            ApiKeyStore::new(Arc::new(MemoryKvStore::new())).unwrap(),
            audit,
        )
    }

    async fn count_events(svc: &AuthService, event: &str) -> usize {
        svc.audit
            .query(&AuditQuery {
                event: Some(event.to_string()),
                ..AuditQuery::default()
            })
            .await
            .unwrap()
            .len()
    }

    #[tokio::test]
    async fn test_login_success_records_audit() {
        let svc = make_service().await;
        let pair = svc.login(PASSWORD, "10.0.0.1").await.unwrap();
        assert!(svc.authenticate_bearer(&pair.access_token).is_ok());
        assert_eq!(count_events(&svc, "auth_success").await, 1);
    }

    #[tokio::test]
    async fn test_login_failure_records_exactly_one_entry() {
        let svc = make_service().await;
        assert!(matches!(
            svc.login("wrong-password", "10.0.0.2").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert_eq!(count_events(&svc, "auth_failure").await, 1);
        assert_eq!(count_events(&svc, "rate_limited").await, 0);
    }

    #[tokio::test]
    async fn test_rate_limited_login_skips_password_check() {
        let svc = make_service().await;
        for _ in 0..5 {
            let _ = svc.login("wrong-password", "10.0.0.3").await;
        }
        // Sixth attempt: window exhausted; even the right password fails.
        assert!(matches!(
            svc.login(PASSWORD, "10.0.0.3").await,
            Err(AuthError::RateLimited { .. })
        ));
        assert_eq!(count_events(&svc, "auth_failure").await, 5);
        assert_eq!(count_events(&svc, "rate_limited").await, 1);
    }

    #[tokio::test]
    async fn test_api_key_round_trip() {
        let svc = make_service().await;
        let created = svc.create_api_key("ci", "viewer").await.unwrap();
        let principal = svc.authenticate_api_key(&created.plaintext).await.unwrap();
        assert_eq!(principal.role, svc.rbac.role_by_name("viewer").unwrap().id);
    }

    #[tokio::test]
    async fn test_denied_check_records_permission_denied() {
        let svc = make_service().await;
        let viewer = svc.rbac.role_by_name("viewer").unwrap();
        let check = svc
            .check_permission(
                viewer.id,
                &PermissionRequest::new("soul/personalities", "write"),
                "viewer-key",
            )
            .await
            .unwrap();
        assert!(!check.granted);
        assert_eq!(count_events(&svc, "permission_denied").await, 1);
    }

    #[tokio::test]
    async fn test_token_reuse_records_error_entry() {
        let svc = make_service().await;
        let pair = svc.login(PASSWORD, "10.0.0.4").await.unwrap();
        svc.refresh(&pair.refresh_token).await.unwrap();
        assert!(matches!(
            svc.refresh(&pair.refresh_token).await,
            Err(AuthError::TokenReuse)
        ));
        assert_eq!(count_events(&svc, "token_reuse").await, 1);
    }
}
