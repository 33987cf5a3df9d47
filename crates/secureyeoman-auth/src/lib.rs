//! SecureYeoman Auth - authentication and authorization core.
//!
//! This crate provides:
//! - Admin credential verification (Argon2id) and hashed API keys
//! - Short-lived HS256 access tokens plus refresh tokens with nonce
//!   consumption and reuse detection
//! - Role-based permission evaluation with inheritance and glob resources
//! - IP-scoped windowed rate limiting
//!
//! # Security Model
//!
//! Exactly one admin principal exists (verified against a stored Argon2id
//! hash); zero or more API-key principals carry an assigned role. Every
//! authentication failure, permission denial, rate-limit rejection, and
//! refresh-token reuse is recorded to the audit chain.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod credentials;
mod error;
mod rate_limit;
mod rbac;
mod service;
mod tokens;

pub use credentials::{AdminCredential, ApiKeyRecord, ApiKeyStore, CreatedApiKey};
pub use error::{AuthError, AuthResult};
pub use rate_limit::{KeyType, OnExceed, RateDecision, RateLimiter, RateRule};
pub use rbac::{
    Permission, PermissionCheck, PermissionRequest, RbacEngine, Role, builtin_roles,
};
pub use service::{AuthService, Principal};
pub use tokens::{Claims, TokenKind, TokenPair, TokenService};
