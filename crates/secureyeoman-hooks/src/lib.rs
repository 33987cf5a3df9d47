//! SecureYeoman Hooks - the extension hook engine.
//!
//! Extensions register handlers at enumerated hook points with one of three
//! authorities:
//!
//! - `observe`: read-only; return values are ignored
//! - `transform`: may replace the payload seen by later handlers
//! - `veto`: may abort the pipeline
//!
//! Handlers run in the caller's task, ascending by priority (lower runs
//! first). A handler error is recorded and does not abort the loop. After
//! the in-process loop (or a veto), the event fans out to enabled outbound
//! webhooks as signed HTTP POSTs.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod engine;
mod error;
mod extension;
mod point;
mod webhook;

pub use engine::{
    EmitResult, FnHookHandler, HandlerVerdict, HookContext, HookEngine, HookHandler, HookId,
    HookRegistration, HookSemantics,
};
pub use error::{HookError, HookResult};
pub use extension::{ExtensionHookSpec, ExtensionRecord, ExtensionStore};
pub use point::HookPoint;
pub use webhook::{WebhookDispatcher, WebhookRecord, WebhookStore};
