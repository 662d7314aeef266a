//! Transaction record and state machine states

use crate::error::CoordinatorError;
use arbiter_common::{Participant, TransactionId};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Transaction state in the coordinator
///
/// Exactly one state holds at any instant; transitions are the only
/// mutator, applied under the record's lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionState {
    /// Accepting enlistments
    Active,
    /// Prepare phase has started
    Preparing,
    /// All participants have voted to prepare
    Prepared,
    /// Commit phase has started
    Committing,
    /// Transaction has been committed (terminal)
    Committed,
    /// Rollback phase has started
    RollingBack,
    /// Transaction has been rolled back (terminal)
    RolledBack,
    /// Commit retries were exhausted; manual intervention required (terminal)
    Failed,
}

impl TransactionState {
    /// Terminal states admit no further transition
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionState::Committed | TransactionState::RolledBack | TransactionState::Failed
        )
    }
}

/// State guarded by the per-transaction lock
pub(crate) struct RecordInner {
    pub state: TransactionState,

    /// Enlisted participants, deduplicated by id. Insertion order is
    /// commit order and reverse order for rollback.
    pub participants: Vec<Arc<dyn Participant>>,

    /// Prepare votes by participant id, populated only during the
    /// prepare phase
    pub votes: HashMap<String, bool>,

    /// Recorded outcome of an exhausted commit, re-reported on repeated
    /// finalize calls
    pub commit_error: Option<CoordinatorError>,
}

/// Mutable state for one transaction
///
/// All mutation happens under the record's own lock; the lock is never
/// held across an await.
pub struct TransactionRecord {
    id: TransactionId,
    created_at: Instant,
    inner: Mutex<RecordInner>,
}

impl TransactionRecord {
    pub(crate) fn new(id: TransactionId) -> Self {
        Self {
            id,
            created_at: Instant::now(),
            inner: Mutex::new(RecordInner {
                state: TransactionState::Active,
                participants: Vec::new(),
                votes: HashMap::new(),
                commit_error: None,
            }),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Current state
    pub fn state(&self) -> TransactionState {
        self.inner.lock().state
    }

    /// Prepare votes by participant id
    pub fn votes(&self) -> HashMap<String, bool> {
        self.inner.lock().votes.clone()
    }

    /// Number of enlisted participants
    pub fn participant_count(&self) -> usize {
        self.inner.lock().participants.len()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, RecordInner> {
        self.inner.lock()
    }
}
