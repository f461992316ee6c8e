pub mod error;
pub mod graphs;
pub mod ledger;
pub mod rows;
pub mod shell;

pub use error::ReportError;
pub use graphs::{Differences, PeriodIncomeAndExpenses, PeriodNetWorth};
pub use ledger::{LedgerCli, LedgerConfig, LEDGER_DATE_FORMAT};
pub use shell::{LocalShell, MockShell, ProcessExit, RunningProcess, Shell, DEFAULT_TIMEOUT};
