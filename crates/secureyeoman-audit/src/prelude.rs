//! Prelude module - commonly used types for convenient import.

pub use crate::chain::{AuditChain, VerificationReport};
pub use crate::entry::{AuditEntry, AuditEvent, AuditLevel};
pub use crate::error::{AuditError, AuditResult};
pub use crate::storage::{AuditQuery, AuditStorage, KvAuditStorage};
