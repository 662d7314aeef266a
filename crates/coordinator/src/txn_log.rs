//! Append-only transaction status log
//!
//! Durable-log collaborator: the coordinator appends a `{txn_id, status}`
//! record on every state transition, and `Coordinator::recover` replays a
//! log after a restart to force-finalize anything left non-terminal.

use crate::error::{CoordinatorError, Result};
use crate::transaction::TransactionState;
use arbiter_common::TransactionId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// One append-only log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub txn_id: TransactionId,
    pub status: TransactionState,
}

/// Append-only store for transaction status records
pub trait TxnLog: Send + Sync {
    fn append(&self, record: LogRecord) -> Result<()>;

    /// All records, oldest first
    fn records(&self) -> Result<Vec<LogRecord>>;
}

/// In-memory log, for tests and single-process use
#[derive(Default)]
pub struct MemoryTxnLog {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryTxnLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TxnLog for MemoryTxnLog {
    fn append(&self, record: LogRecord) -> Result<()> {
        self.records.lock().push(record);
        Ok(())
    }

    fn records(&self) -> Result<Vec<LogRecord>> {
        Ok(self.records.lock().clone())
    }
}

/// File-backed log, one JSON record per line
pub struct FileTxnLog {
    path: PathBuf,
    file: Mutex<fs::File>,
}

impl FileTxnLog {
    /// Open (or create) the log file for appending
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| CoordinatorError::LogError(e.to_string()))?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TxnLog for FileTxnLog {
    fn append(&self, record: LogRecord) -> Result<()> {
        let line =
            serde_json::to_string(&record).map_err(|e| CoordinatorError::LogError(e.to_string()))?;

        let mut file = self.file.lock();
        writeln!(file, "{}", line).map_err(|e| CoordinatorError::LogError(e.to_string()))?;
        file.flush()
            .map_err(|e| CoordinatorError::LogError(e.to_string()))
    }

    fn records(&self) -> Result<Vec<LogRecord>> {
        let contents = fs::read_to_string(&self.path)
            .map_err(|e| CoordinatorError::LogError(e.to_string()))?;

        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| CoordinatorError::LogError(e.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn record(status: TransactionState) -> LogRecord {
        LogRecord {
            txn_id: TransactionId::new(),
            status,
        }
    }

    #[test]
    fn test_memory_log_append_order() {
        let log = MemoryTxnLog::new();
        let first = record(TransactionState::Active);
        let second = record(TransactionState::Committed);

        log.append(first).unwrap();
        log.append(second).unwrap();

        assert_eq!(log.records().unwrap(), vec![first, second]);
    }

    #[test]
    fn test_file_log_survives_reopen() {
        let path = env::temp_dir().join(format!("txn_log_test_{}.jsonl", uuid::Uuid::new_v4()));

        let first = record(TransactionState::Active);
        let second = record(TransactionState::RolledBack);

        {
            let log = FileTxnLog::open(&path).unwrap();
            log.append(first).unwrap();
            log.append(second).unwrap();
        }

        let reopened = FileTxnLog::open(&path).unwrap();
        assert_eq!(reopened.records().unwrap(), vec![first, second]);

        let _ = fs::remove_file(&path);
    }
}
