//! Two-phase commit transaction coordinator
//!
//! The coordinator enlists a set of independently-failing participants
//! into a transaction, drives them through a prepare vote and a
//! commit/rollback decision, and stays correct under concurrent
//! transactions, partial failures, timeouts and retries.
//!
//! Failure policy, in one line: prepare failures become negative votes
//! and roll the transaction back; rollback is best-effort and never
//! fails the outcome; commit failures are retried with backoff and
//! exhaustion is fatal (`Failed`, no auto-rollback).

mod config;
mod coordinator;
mod error;
mod executor;
mod registry;
mod retry;
mod transaction;
mod txn_log;

pub use config::CoordinatorConfig;
pub use coordinator::{Coordinator, PrepareOutcome};
pub use error::{CoordinatorError, Result};
pub use executor::{ExitPolicy, Phase, PhaseExecutor, PhaseOutcome};
pub use registry::TransactionRegistry;
pub use retry::{RetryPolicy, retry_with_policy};
pub use transaction::{TransactionRecord, TransactionState};
pub use txn_log::{FileTxnLog, LogRecord, MemoryTxnLog, TxnLog};
