//! Prelude module - commonly used types for convenient import.

pub use crate::credentials::{AdminCredential, ApiKeyRecord, ApiKeyStore, CreatedApiKey};
pub use crate::error::{AuthError, AuthResult};
pub use crate::rate_limit::{KeyType, OnExceed, RateDecision, RateLimiter, RateRule};
pub use crate::rbac::{
    Permission, PermissionCheck, PermissionRequest, RbacEngine, Role, builtin_roles,
};
pub use crate::service::{AuthService, Principal};
pub use crate::tokens::{Claims, TokenKind, TokenPair, TokenService};
