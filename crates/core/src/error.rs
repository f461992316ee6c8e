use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("Malformed amount: '{0}'")]
    MalformedAmount(String),
    #[error("Malformed date: '{0}'")]
    MalformedDate(String),
    #[error("Root account not found")]
    RootNotFound,
}
