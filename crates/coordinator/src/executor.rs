//! Phase execution across participants
//!
//! Runs one 2PC phase against a participant set and aggregates
//! per-participant outcomes, positionally aligned to the input list. A
//! participant fault or panic never crashes the coordinator or sibling
//! calls; a call that outlives its budget is abandoned, not aborted.

use crate::error::CoordinatorError;
use crate::retry::{RetryPolicy, retry_with_policy};
use arbiter_common::Participant;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// The 2PC phase an executor run drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Prepare,
    Commit,
    Rollback,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Prepare => "prepare",
            Phase::Commit => "commit",
            Phase::Rollback => "rollback",
        }
    }
}

/// When a concurrent run may stop waiting for stragglers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitPolicy {
    /// Wait for every participant to resolve or time out
    WaitAll,
    /// Return as soon as any outcome is negative; in-flight calls finish
    /// in the background and their results are discarded
    FirstFailure,
}

/// Outcome of one participant call within a phase
#[derive(Debug, Clone)]
pub struct PhaseOutcome {
    pub ok: bool,
    pub error: Option<CoordinatorError>,
    /// Attempts actually made; zero means the call was never issued
    pub attempts: u32,
}

impl PhaseOutcome {
    fn success(attempts: u32) -> Self {
        Self {
            ok: true,
            error: None,
            attempts,
        }
    }

    /// A clean "no" vote: negative, but not a fault
    fn declined(attempts: u32) -> Self {
        Self {
            ok: false,
            error: None,
            attempts,
        }
    }

    fn failure(error: CoordinatorError, attempts: u32) -> Self {
        Self {
            ok: false,
            error: Some(error),
            attempts,
        }
    }

    fn unattempted() -> Self {
        Self {
            ok: false,
            error: None,
            attempts: 0,
        }
    }
}

/// Invoke one phase call on a spawned task so a panicking participant is
/// isolated, bounded by the per-call budget. On timeout the task is
/// dropped, not aborted: the participant may still complete server-side.
async fn call_with_timeout(
    participant: Arc<dyn Participant>,
    phase: Phase,
    per_call: Duration,
) -> Result<bool, CoordinatorError> {
    let task = tokio::spawn(async move {
        match phase {
            Phase::Prepare => participant.prepare().await,
            Phase::Commit => participant.commit().await.map(|()| true),
            Phase::Rollback => participant.rollback().await.map(|()| true),
        }
    });

    match tokio::time::timeout(per_call, task).await {
        Err(_) => Err(CoordinatorError::ParticipantTimeout),
        Ok(Err(join_err)) => Err(CoordinatorError::ParticipantFault(join_err.to_string())),
        Ok(Ok(Ok(ready))) => Ok(ready),
        Ok(Ok(Err(e))) => Err(CoordinatorError::ParticipantFault(e.to_string())),
    }
}

/// Executes one phase operation across a participant set
pub struct PhaseExecutor {
    per_call_timeout: Duration,
}

impl PhaseExecutor {
    pub fn new(per_call_timeout: Duration) -> Self {
        Self { per_call_timeout }
    }

    /// Fan the phase out concurrently, one task per participant, and fan
    /// results back in.
    ///
    /// Outcomes are positionally aligned to `participants`. A call still
    /// unresolved when `deadline` elapses (or when `FirstFailure`
    /// short-circuits) is recorded as a timeout.
    pub async fn run_concurrent(
        &self,
        participants: &[Arc<dyn Participant>],
        phase: Phase,
        deadline: Option<Instant>,
        exit: ExitPolicy,
    ) -> Vec<PhaseOutcome> {
        if participants.is_empty() {
            return Vec::new();
        }

        let (tx, mut rx) = mpsc::channel(participants.len());

        for (idx, participant) in participants.iter().enumerate() {
            let participant = participant.clone();
            let tx = tx.clone();
            let per_call = self.per_call_timeout;

            tokio::spawn(async move {
                let outcome = match call_with_timeout(participant, phase, per_call).await {
                    Ok(true) => PhaseOutcome::success(1),
                    Ok(false) => PhaseOutcome::declined(1),
                    Err(e) => PhaseOutcome::failure(e, 1),
                };
                // Receiver may be gone after an early exit
                let _ = tx.send((idx, outcome)).await;
            });
        }
        drop(tx);

        let mut outcomes: Vec<Option<PhaseOutcome>> = vec![None; participants.len()];
        let mut resolved = 0;

        while resolved < participants.len() {
            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, rx.recv()).await {
                    Ok(received) => received,
                    Err(_) => break,
                },
                None => rx.recv().await,
            };

            let Some((idx, outcome)) = next else { break };
            let negative = !outcome.ok;
            outcomes[idx] = Some(outcome);
            resolved += 1;

            if negative && exit == ExitPolicy::FirstFailure {
                break;
            }
        }

        // Anything unresolved counts as a timeout: the coordinator is no
        // longer waiting for it
        outcomes
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    PhaseOutcome::failure(CoordinatorError::ParticipantTimeout, 1)
                })
            })
            .collect()
    }

    /// Run the phase strictly one participant at a time, in the order
    /// given.
    ///
    /// With a retry policy each call is retried until the policy is
    /// exhausted; with `stop_on_failure` the first exhausted participant
    /// halts the run and the remaining slots are reported unattempted.
    /// Without `stop_on_failure` the run is best-effort: failures are
    /// logged and iteration continues.
    pub async fn run_ordered(
        &self,
        participants: &[Arc<dyn Participant>],
        phase: Phase,
        retry: Option<&RetryPolicy>,
        stop_on_failure: bool,
    ) -> Vec<PhaseOutcome> {
        let mut outcomes = Vec::with_capacity(participants.len());
        let mut halted = false;

        for participant in participants {
            if halted {
                outcomes.push(PhaseOutcome::unattempted());
                continue;
            }

            let per_call = self.per_call_timeout;
            let outcome = match retry {
                Some(policy) => {
                    let target = participant.clone();
                    let (result, attempts) = retry_with_policy(policy, move || {
                        call_with_timeout(target.clone(), phase, per_call)
                    })
                    .await;

                    match result {
                        Ok(true) => PhaseOutcome::success(attempts),
                        Ok(false) => PhaseOutcome::declined(attempts),
                        Err(e) => PhaseOutcome::failure(e, attempts),
                    }
                }
                None => match call_with_timeout(participant.clone(), phase, per_call).await {
                    Ok(true) => PhaseOutcome::success(1),
                    Ok(false) => PhaseOutcome::declined(1),
                    Err(e) => PhaseOutcome::failure(e, 1),
                },
            };

            if !outcome.ok {
                if stop_on_failure {
                    halted = true;
                } else {
                    tracing::warn!(
                        participant = participant.id(),
                        phase = phase.as_str(),
                        error = ?outcome.error,
                        "best-effort phase call failed; continuing"
                    );
                }
            }

            outcomes.push(outcome);
        }

        outcomes
    }
}
