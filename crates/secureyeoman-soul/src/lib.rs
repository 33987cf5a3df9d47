//! SecureYeoman Soul - the agent's persona layer.
//!
//! Personalities shape prompt composition and gate which integrations feed
//! the message router; skills extend the active persona through an approval
//! workflow; knowledge records hold curated reference material.
//!
//! Exactly one personality is active at a time. The contract the rest of
//! the gateway relies on is [`SoulStore::active_personality`]: the active
//! persona's optional voice and its `selected_integrations` allow-list.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod store;
mod types;

pub use error::{SoulError, SoulResult};
pub use store::SoulStore;
pub use types::{
    Knowledge, OnboardingStatus, Personality, Skill, SkillStatus,
};
