//! Participant capability
//!
//! The contract a resource manager must satisfy to be enlisted in a
//! transaction. The coordinator holds a participant reference for the
//! lifetime of one transaction only; it does not own the participant
//! beyond that.

use async_trait::async_trait;
use thiserror::Error;

/// Error returned by a participant call
///
/// The coordinator never propagates these across its own boundary: a
/// failing prepare becomes a negative vote, a failing rollback is logged
/// and skipped, a failing commit is retried.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ParticipantError(pub String);

impl ParticipantError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A resource manager enlisted in a transaction
///
/// `commit` and `rollback` must be idempotent: the coordinator delivers
/// finalize calls at-least-once, and a timed-out call may still complete
/// on the participant's side.
#[async_trait]
pub trait Participant: Send + Sync {
    /// Stable identity, used for enlistment dedup, vote bookkeeping and logs
    fn id(&self) -> &str;

    /// Vote on whether this participant can commit. `Ok(false)` is a
    /// clean "no" vote; an error counts as a negative vote as well.
    async fn prepare(&self) -> Result<bool, ParticipantError>;

    /// Durably apply the tentative change. Idempotent.
    async fn commit(&self) -> Result<(), ParticipantError>;

    /// Undo the tentative change. Idempotent.
    async fn rollback(&self) -> Result<(), ParticipantError>;
}
