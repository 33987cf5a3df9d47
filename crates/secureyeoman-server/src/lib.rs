//! SecureYeoman Server - the versioned HTTP surface and process wiring.
//!
//! Assembles every subsystem behind `/api/v1/…`: auth endpoints issue and
//! refresh sessions, all other endpoints require a bearer token or API key,
//! and writes pass through RBAC with denials recorded to the audit chain.
//! Error bodies are always `{"error": "..."}` with the taxonomy's status
//! mapping.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod app;
mod config;
mod error;
mod handler;
mod middleware;
mod routes;
mod state;

pub use app::{build_router, serve};
pub use config::{Config, ProviderKeys};
pub use error::ApiError;
pub use handler::AiQueryHandler;
pub use state::{AppState, build_state};
