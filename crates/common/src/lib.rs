//! Common types for the arbiter transaction coordinator
//!
//! This crate defines:
//! - The participant capability every resource manager must satisfy
//! - Transaction IDs (UUIDv7-based)

mod participant;
mod transaction_id;

pub use participant::Participant;
pub use participant::ParticipantError;
pub use transaction_id::TransactionId;
