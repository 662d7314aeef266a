//! Error types for the coordinator

use arbiter_common::TransactionId;
use thiserror::Error;

/// Coordinator error types
///
/// `NotFound` and `InvalidState` are programmer errors, reported
/// synchronously and never retried. The participant-level variants are
/// recovered or retried according to the phase they occur in; only
/// `CommitExhausted` is fatal.
#[derive(Debug, Clone, Error)]
pub enum CoordinatorError {
    #[error("transaction not found: {0}")]
    NotFound(TransactionId),

    #[error("invalid transaction state: {0}")]
    InvalidState(String),

    #[error("participant call timed out")]
    ParticipantTimeout,

    #[error("participant fault: {0}")]
    ParticipantFault(String),

    #[error("commit retries exhausted at participant {participant} after {attempts} attempts")]
    CommitExhausted { participant: String, attempts: u32 },

    #[error("transaction log error: {0}")]
    LogError(String),
}

/// Result type for coordinator operations
pub type Result<T> = std::result::Result<T, CoordinatorError>;
