use std::time::Duration;

use tally_core::LedgerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ledger exited with status {code:?}: {stderr}")]
    ExternalToolFailure { code: Option<i32>, stderr: String },
    #[error("ledger did not finish within {0:?}")]
    Timeout(Duration),
}
