//! Prelude module - commonly used types for convenient import.

pub use crate::compare::constant_time_eq;
pub use crate::error::{CryptoError, CryptoResult};
pub use crate::hash::ContentHash;
pub use crate::keys::{generate_api_key, generate_nonce, ApiKeyMaterial};
pub use crate::signing::{HmacSignature, SigningKey};
