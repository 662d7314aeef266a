//! Shared call journal for ordering assertions

use parking_lot::Mutex;
use std::sync::Arc;

/// Records `(participant, phase)` pairs in invocation order
///
/// Shared between the mock participants of one test so the test can
/// assert cross-participant call ordering (e.g. rollback in reverse
/// enlistment order).
#[derive(Default)]
pub struct CallJournal {
    calls: Mutex<Vec<(String, String)>>,
}

impl CallJournal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, participant: &str, phase: &str) {
        self.calls
            .lock()
            .push((participant.to_string(), phase.to_string()));
    }

    /// All recorded calls, oldest first
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }

    /// Participants that received the given phase, in invocation order
    pub fn participants_for(&self, phase: &str) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|(_, p)| p == phase)
            .map(|(participant, _)| participant.clone())
            .collect()
    }
}
