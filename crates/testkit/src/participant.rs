//! Mock participant with injectable behavior

use crate::journal::CallJournal;
use arbiter_common::{Participant, ParticipantError};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// A participant double with configurable per-phase behavior
///
/// Defaults to the cooperative case: votes yes, commits and rolls back
/// cleanly, no delays. Builder methods inject the failure modes.
pub struct MockParticipant {
    id: String,
    vote: bool,
    prepare_delay: Option<Duration>,
    panic_on_prepare: bool,
    fail_rollback: bool,

    /// Number of leading commit attempts that fail before one succeeds
    remaining_commit_failures: AtomicU32,

    prepare_calls: AtomicU32,
    commit_calls: AtomicU32,
    rollback_calls: AtomicU32,

    journal: Option<Arc<CallJournal>>,
}

impl MockParticipant {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            vote: true,
            prepare_delay: None,
            panic_on_prepare: false,
            fail_rollback: false,
            remaining_commit_failures: AtomicU32::new(0),
            prepare_calls: AtomicU32::new(0),
            commit_calls: AtomicU32::new(0),
            rollback_calls: AtomicU32::new(0),
            journal: None,
        }
    }

    /// Set the prepare vote (`false` = clean "no")
    pub fn with_vote(mut self, vote: bool) -> Self {
        self.vote = vote;
        self
    }

    /// Sleep this long before answering prepare
    pub fn with_prepare_delay(mut self, delay: Duration) -> Self {
        self.prepare_delay = Some(delay);
        self
    }

    /// Panic inside prepare instead of answering
    pub fn with_panic_on_prepare(mut self) -> Self {
        self.panic_on_prepare = true;
        self
    }

    /// Fail the first `n` commit attempts, then succeed
    pub fn with_commit_failures(self, n: u32) -> Self {
        self.remaining_commit_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Make every rollback call fail
    pub fn with_failing_rollback(mut self) -> Self {
        self.fail_rollback = true;
        self
    }

    /// Record every call into a shared journal
    pub fn with_journal(mut self, journal: Arc<CallJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn prepare_calls(&self) -> u32 {
        self.prepare_calls.load(Ordering::SeqCst)
    }

    pub fn commit_calls(&self) -> u32 {
        self.commit_calls.load(Ordering::SeqCst)
    }

    pub fn rollback_calls(&self) -> u32 {
        self.rollback_calls.load(Ordering::SeqCst)
    }

    fn journal(&self, phase: &str) {
        if let Some(journal) = &self.journal {
            journal.record(&self.id, phase);
        }
    }
}

#[async_trait]
impl Participant for MockParticipant {
    fn id(&self) -> &str {
        &self.id
    }

    async fn prepare(&self) -> Result<bool, ParticipantError> {
        self.prepare_calls.fetch_add(1, Ordering::SeqCst);
        self.journal("prepare");

        if let Some(delay) = self.prepare_delay {
            tokio::time::sleep(delay).await;
        }

        if self.panic_on_prepare {
            panic!("injected prepare panic in participant {}", self.id);
        }

        Ok(self.vote)
    }

    async fn commit(&self) -> Result<(), ParticipantError> {
        self.commit_calls.fetch_add(1, Ordering::SeqCst);
        self.journal("commit");

        let failed = self
            .remaining_commit_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        if failed {
            return Err(ParticipantError::new(format!(
                "injected commit failure in participant {}",
                self.id
            )));
        }

        Ok(())
    }

    async fn rollback(&self) -> Result<(), ParticipantError> {
        self.rollback_calls.fetch_add(1, Ordering::SeqCst);
        self.journal("rollback");

        if self.fail_rollback {
            return Err(ParticipantError::new(format!(
                "injected rollback failure in participant {}",
                self.id
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_commit_failures_then_success() {
        let p = MockParticipant::new("p1").with_commit_failures(2);

        assert!(p.commit().await.is_err());
        assert!(p.commit().await.is_err());
        assert!(p.commit().await.is_ok());
        assert!(p.commit().await.is_ok());
        assert_eq!(p.commit_calls(), 4);
    }

    #[tokio::test]
    async fn test_journal_records_order() {
        let journal = CallJournal::new();
        let p1 = MockParticipant::new("p1").with_journal(journal.clone());
        let p2 = MockParticipant::new("p2").with_journal(journal.clone());

        p1.prepare().await.unwrap();
        p2.prepare().await.unwrap();
        p2.rollback().await.unwrap();
        p1.rollback().await.unwrap();

        assert_eq!(journal.participants_for("prepare"), vec!["p1", "p2"]);
        assert_eq!(journal.participants_for("rollback"), vec!["p2", "p1"]);
    }

    #[tokio::test]
    async fn test_negative_vote() {
        let p = MockParticipant::new("p1").with_vote(false);
        assert_eq!(p.prepare().await.unwrap(), false);
        assert_eq!(p.prepare_calls(), 1);
    }
}
