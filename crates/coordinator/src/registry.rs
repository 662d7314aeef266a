//! Concurrent transaction registry
//!
//! Maps transaction id to record and owns id generation. The registry
//! lock is narrow and short-held; it never serializes unrelated
//! transactions beyond create/lookup/remove itself.

use crate::transaction::TransactionRecord;
use arbiter_common::TransactionId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Thread-safe store of in-flight transaction records
#[derive(Default)]
pub struct TransactionRegistry {
    records: Mutex<HashMap<TransactionId, Arc<TransactionRecord>>>,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new record with a fresh id. Never returns a duplicate
    /// id, even under concurrent callers.
    pub fn create(&self) -> Arc<TransactionRecord> {
        let record = Arc::new(TransactionRecord::new(TransactionId::new()));
        self.records.lock().insert(record.id(), record.clone());
        record
    }

    /// Look up a record; `None` for an unknown id
    pub fn get(&self, id: TransactionId) -> Option<Arc<TransactionRecord>> {
        self.records.lock().get(&id).cloned()
    }

    /// Drop a record from the registry
    pub fn remove(&self, id: TransactionId) -> Option<Arc<TransactionRecord>> {
        self.records.lock().remove(&id)
    }

    /// Number of records currently held
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}
