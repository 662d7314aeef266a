//! Coordinator state machine
//!
//! Orchestrates the full lifecycle (begin → enlist → prepare →
//! commit/rollback) atop the registry and the phase executor, enforcing
//! the state machine and the failure policy: prepare failures are
//! recovered locally by rolling back, rollback is best-effort, commit
//! exhaustion is fatal and surfaced.

use crate::config::CoordinatorConfig;
use crate::error::{CoordinatorError, Result};
use crate::executor::{ExitPolicy, Phase, PhaseExecutor};
use crate::registry::TransactionRegistry;
use crate::retry::RetryPolicy;
use crate::transaction::{TransactionRecord, TransactionState};
use crate::txn_log::{LogRecord, TxnLog};
use arbiter_common::{Participant, TransactionId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;

/// Outcome of the prepare phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareOutcome {
    /// Every participant voted yes; the transaction may commit
    Prepared,
    /// A negative vote, timeout or fault aborted the transaction and the
    /// prepared participants were compensated
    RolledBack,
}

/// Distributed transaction coordinator
///
/// Single logical authority per transaction. Multiple independent
/// transactions run concurrently; each record carries its own lock and
/// unrelated transactions never serialize against each other.
pub struct Coordinator {
    registry: TransactionRegistry,
    executor: PhaseExecutor,
    config: CoordinatorConfig,
    log: Option<Arc<dyn TxnLog>>,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        let executor = PhaseExecutor::new(config.per_call_timeout);
        Self {
            registry: TransactionRegistry::new(),
            executor,
            config,
            log: None,
        }
    }

    /// Coordinator that appends a status record on every transition
    pub fn with_log(config: CoordinatorConfig, log: Arc<dyn TxnLog>) -> Self {
        let mut coordinator = Self::new(config);
        coordinator.log = Some(log);
        coordinator
    }

    /// Begin a new transaction. No failure mode.
    pub fn begin(&self) -> TransactionId {
        let record = self.registry.create();
        let id = record.id();
        self.log_transition(id, TransactionState::Active);
        tracing::debug!(txn_id = %id, "transaction started");
        id
    }

    /// Enlist a participant into an active transaction
    ///
    /// Enlisting a participant id that is already enlisted is a no-op,
    /// so at-least-once enrollment messages are safe.
    pub fn enlist(&self, id: TransactionId, participant: Arc<dyn Participant>) -> Result<()> {
        let record = self.lookup(id)?;
        let mut inner = record.lock();

        if inner.state != TransactionState::Active {
            return Err(CoordinatorError::InvalidState(format!(
                "cannot enlist in state {:?}",
                inner.state
            )));
        }

        if inner
            .participants
            .iter()
            .any(|p| p.id() == participant.id())
        {
            return Ok(());
        }

        inner.participants.push(participant);
        Ok(())
    }

    /// Run the prepare phase
    ///
    /// Fans prepare out to every enlisted participant concurrently under
    /// the phase deadline. All yes votes make the transaction
    /// `Prepared`; anything else rolls back the participants whose yes
    /// vote was recorded, in reverse enlistment order, best-effort.
    pub async fn prepare(&self, id: TransactionId) -> Result<PrepareOutcome> {
        let record = self.lookup(id)?;

        let participants = {
            let mut inner = record.lock();
            if inner.state != TransactionState::Active {
                return Err(CoordinatorError::InvalidState(format!(
                    "cannot prepare in state {:?}",
                    inner.state
                )));
            }
            inner.state = TransactionState::Preparing;
            inner.participants.clone()
        };
        self.log_transition(id, TransactionState::Preparing);

        // An empty transaction always commits
        if participants.is_empty() {
            record.lock().state = TransactionState::Prepared;
            self.log_transition(id, TransactionState::Prepared);
            return Ok(PrepareOutcome::Prepared);
        }

        let deadline = Instant::now() + self.config.prepare_timeout;
        let outcomes = self
            .executor
            .run_concurrent(
                &participants,
                Phase::Prepare,
                Some(deadline),
                ExitPolicy::FirstFailure,
            )
            .await;

        let all_ready = {
            let mut inner = record.lock();
            for (participant, outcome) in participants.iter().zip(&outcomes) {
                inner.votes.insert(participant.id().to_string(), outcome.ok);
            }
            outcomes.iter().all(|o| o.ok)
        };

        if all_ready {
            record.lock().state = TransactionState::Prepared;
            self.log_transition(id, TransactionState::Prepared);
            tracing::debug!(txn_id = %id, participants = participants.len(), "all participants prepared");
            return Ok(PrepareOutcome::Prepared);
        }

        tracing::debug!(txn_id = %id, "prepare phase failed; rolling back prepared participants");

        // Compensate only the participants whose yes vote was recorded,
        // last enlisted first
        let prepared: Vec<Arc<dyn Participant>> = participants
            .iter()
            .zip(&outcomes)
            .filter(|(_, outcome)| outcome.ok)
            .map(|(participant, _)| participant.clone())
            .rev()
            .collect();

        record.lock().state = TransactionState::RollingBack;
        self.log_transition(id, TransactionState::RollingBack);

        self.executor
            .run_ordered(&prepared, Phase::Rollback, None, false)
            .await;

        record.lock().state = TransactionState::RolledBack;
        self.log_transition(id, TransactionState::RolledBack);
        Ok(PrepareOutcome::RolledBack)
    }

    /// Run the commit phase
    ///
    /// Requires `Prepared`. Participants are committed one at a time in
    /// enlistment order, each with bounded retry; an exhausted
    /// participant leaves the transaction `Failed` with the remaining
    /// participants untouched. There is no automatic rollback: earlier
    /// participants may already be durably committed.
    pub async fn commit(&self, id: TransactionId) -> Result<()> {
        let record = self.lookup(id)?;

        let participants = {
            let mut inner = record.lock();
            match inner.state {
                TransactionState::Prepared => {
                    inner.state = TransactionState::Committing;
                    inner.participants.clone()
                }
                // Idempotent finalize: report the recorded outcome
                TransactionState::Committed => return Ok(()),
                TransactionState::Failed => {
                    return Err(inner.commit_error.clone().unwrap_or_else(|| {
                        CoordinatorError::InvalidState("commit already failed".to_string())
                    }));
                }
                other => {
                    return Err(CoordinatorError::InvalidState(format!(
                        "cannot commit in state {:?}",
                        other
                    )));
                }
            }
        };
        self.log_transition(id, TransactionState::Committing);

        let retry = RetryPolicy {
            max_retries: self.config.commit_max_retries,
            base: self.config.backoff_base,
            jitter: self.config.backoff_jitter,
        };

        let outcomes = self
            .executor
            .run_ordered(&participants, Phase::Commit, Some(&retry), true)
            .await;

        let exhausted = participants
            .iter()
            .zip(&outcomes)
            .find(|(_, outcome)| !outcome.ok && outcome.attempts > 0);

        if let Some((participant, outcome)) = exhausted {
            let error = CoordinatorError::CommitExhausted {
                participant: participant.id().to_string(),
                attempts: outcome.attempts,
            };

            {
                let mut inner = record.lock();
                inner.state = TransactionState::Failed;
                inner.commit_error = Some(error.clone());
            }
            self.log_transition(id, TransactionState::Failed);

            tracing::error!(
                txn_id = %id,
                participant = participant.id(),
                attempts = outcome.attempts,
                "commit retries exhausted; manual intervention required"
            );
            return Err(error);
        }

        record.lock().state = TransactionState::Committed;
        self.log_transition(id, TransactionState::Committed);
        tracing::debug!(txn_id = %id, "transaction committed");
        Ok(())
    }

    /// Explicit caller-driven abort
    ///
    /// Legal from `Active` or `Prepared`. Every enlisted participant is
    /// rolled back in reverse enlistment order, best-effort: individual
    /// compensation failures are logged, never retried, and never change
    /// the `RolledBack` outcome.
    pub async fn rollback(&self, id: TransactionId) -> Result<()> {
        let record = self.lookup(id)?;

        let participants = {
            let mut inner = record.lock();
            match inner.state {
                TransactionState::Active | TransactionState::Prepared => {
                    inner.state = TransactionState::RollingBack;
                    inner.participants.clone()
                }
                // Idempotent finalize
                TransactionState::RolledBack => return Ok(()),
                other => {
                    return Err(CoordinatorError::InvalidState(format!(
                        "cannot roll back in state {:?}",
                        other
                    )));
                }
            }
        };
        self.log_transition(id, TransactionState::RollingBack);

        let reversed: Vec<Arc<dyn Participant>> =
            participants.iter().rev().cloned().collect();

        self.executor
            .run_ordered(&reversed, Phase::Rollback, None, false)
            .await;

        record.lock().state = TransactionState::RolledBack;
        self.log_transition(id, TransactionState::RolledBack);
        tracing::debug!(txn_id = %id, "transaction rolled back");
        Ok(())
    }

    /// Current state of a transaction
    pub fn status(&self, id: TransactionId) -> Result<TransactionState> {
        Ok(self.lookup(id)?.state())
    }

    /// Evict a finished transaction from the registry
    ///
    /// Terminal records are retained until removed so repeated finalize
    /// calls stay idempotent; eviction of a live transaction is refused.
    pub fn remove(&self, id: TransactionId) -> Result<()> {
        let record = self.lookup(id)?;

        // Terminal states never mutate again, so this check cannot race
        if !record.state().is_terminal() {
            return Err(CoordinatorError::InvalidState(format!(
                "cannot remove transaction in state {:?}",
                record.state()
            )));
        }

        self.registry.remove(id);
        Ok(())
    }

    /// Record inspection, mainly for tests and operational tooling
    pub fn record(&self, id: TransactionId) -> Option<Arc<TransactionRecord>> {
        self.registry.get(id)
    }

    /// Number of transactions currently registered
    pub fn transaction_count(&self) -> usize {
        self.registry.len()
    }

    /// Replay a transaction log after a restart
    ///
    /// Every transaction whose last logged status is non-terminal is
    /// force-finalized to `RolledBack`, since a crash during `Preparing`
    /// cannot be assumed to have committed. The forced records are
    /// appended to the log; the forced ids are returned.
    pub fn recover(log: &dyn TxnLog) -> Result<Vec<TransactionId>> {
        let mut order: Vec<TransactionId> = Vec::new();
        let mut last: HashMap<TransactionId, TransactionState> = HashMap::new();

        for record in log.records()? {
            if !last.contains_key(&record.txn_id) {
                order.push(record.txn_id);
            }
            last.insert(record.txn_id, record.status);
        }

        let mut forced = Vec::new();
        for txn_id in order {
            let status = last[&txn_id];
            if !status.is_terminal() {
                log.append(LogRecord {
                    txn_id,
                    status: TransactionState::RolledBack,
                })?;
                tracing::warn!(
                    txn_id = %txn_id,
                    last_status = ?status,
                    "non-terminal transaction found at recovery; forcing rollback"
                );
                forced.push(txn_id);
            }
        }

        Ok(forced)
    }

    fn lookup(&self, id: TransactionId) -> Result<Arc<TransactionRecord>> {
        self.registry.get(id).ok_or(CoordinatorError::NotFound(id))
    }

    fn log_transition(&self, txn_id: TransactionId, status: TransactionState) {
        if let Some(log) = &self.log
            && let Err(e) = log.append(LogRecord { txn_id, status })
        {
            tracing::error!(txn_id = %txn_id, error = %e, "failed to append transaction log record");
        }
    }
}
