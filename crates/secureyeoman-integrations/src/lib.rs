//! SecureYeoman Integrations - the unified inbound message pipeline.
//!
//! Platform adapters (Telegram, Line, GitHub, …) share one capability set:
//! lifecycle, outbound send with rate shaping, and webhook ingress with
//! constant-time signature verification. Verified events become
//! [`UnifiedMessage`]s and flow through the [`IntegrationRouter`]:
//! hook fan-out, persistence, personality-scoped access control, task
//! submission, and response relay back to the originating platform.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod adapter;
mod error;
mod router;
mod store;
mod types;
mod verify;

pub use adapter::{AdapterRegistry, IntegrationAdapter, PlatformRateLimit, SpeechSynthesizer};
pub use error::{IntegrationError, IntegrationResult};
pub use router::IntegrationRouter;
pub use store::IntegrationStore;
pub use types::{
    Attachment, IntegrationRecord, IntegrationStatus, MessageDirection, OutboundReply,
    UnifiedMessage, redact_config,
};
pub use verify::{verify_github_signature, verify_gitlab_token, verify_line_signature};
